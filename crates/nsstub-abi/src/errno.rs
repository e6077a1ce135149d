//! errno plumbing for the entry points.

use std::ffi::c_int;

#[inline]
pub(crate) fn set_errno(val: c_int) {
    // SAFETY: `__errno_location` returns a valid TLS errno pointer for this thread.
    unsafe { *libc::__errno_location() = val };
}

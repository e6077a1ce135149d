//! A target that cannot be loaded fails every request with ENOENT.

use std::ffi::{CStr, c_int};

use nsstub::dlfcn_abi::{NsstubLoaderSnapshot, nsstub_dlopen, nsstub_loader_snapshot};

const MISSING: &CStr = c"libnsstub-missing-target.so.0";

fn errno() -> c_int {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[test]
fn missing_target_fails_with_enoent_on_every_call() {
    for _ in 0..3 {
        // SAFETY: `__errno_location` returns this thread's errno slot.
        unsafe { *libc::__errno_location() = 0 };
        // SAFETY: `MISSING` is a valid C string.
        let handle = unsafe { nsstub_dlopen(MISSING.as_ptr()) };
        assert!(handle.is_null());
        assert_eq!(errno(), libc::ENOENT);
    }

    // Failure wins over a name mismatch: nothing was ever loaded.
    // SAFETY: `__errno_location` returns this thread's errno slot.
    unsafe { *libc::__errno_location() = 0 };
    // SAFETY: valid C string.
    let other = unsafe { nsstub_dlopen(c"libm.so.6".as_ptr()) };
    assert!(other.is_null());
    assert_eq!(errno(), libc::ENOENT);

    let mut state = NsstubLoaderSnapshot::default();
    // SAFETY: `state` is writable.
    assert_eq!(unsafe { nsstub_loader_snapshot(&mut state) }, 0);
    assert_eq!(state.initialized, 1);
    assert_eq!(state.probe_loaded, 0);
    assert_eq!(state.isolation_active, 0);
}

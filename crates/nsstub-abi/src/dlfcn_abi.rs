//! ABI layer for the delayed-load entry points.
//!
//! `nsstub_dlopen` / `nsstub_dlclose` mirror `dlopen` / `dlclose` for the one
//! target library a stub forwards to. Failures follow the errno convention:
//! `ENOENT` when the target cannot be loaded, `EINVAL` for caller misuse.

use std::ffi::{CStr, c_char, c_int, c_long, c_void};

use nsstub_core::{DelayedNamespaceLoader, NamespaceId};

use crate::errno::set_errno;
use crate::host_linker::{DlHandle, HostLinker};

static LOADER: DelayedNamespaceLoader<HostLinker> = DelayedNamespaceLoader::new(HostLinker);

/// C view of the loader state.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NsstubLoaderSnapshot {
    /// 1 once the first `nsstub_dlopen` call has completed initialization.
    pub initialized: c_int,
    /// 1 if the target lives in an isolated namespace.
    pub isolation_active: c_int,
    /// 1 if the first load of the target succeeded.
    pub probe_loaded: c_int,
    /// Namespace id when isolation is active, else 0.
    pub namespace_id: c_long,
}

/// Open the target library.
///
/// The first call loads `lib_name` (inside an isolated namespace when
/// `NSSTUB_ISOLATE_NAMESPACE=1`) and fixes it for the process. Every
/// successful call returns a fresh handle that the caller releases with
/// [`nsstub_dlclose`]. Returns null with `errno` set on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nsstub_dlopen(lib_name: *const c_char) -> *mut c_void {
    if lib_name.is_null() {
        set_errno(libc::EINVAL);
        return std::ptr::null_mut();
    }
    // SAFETY: caller passes a NUL-terminated string.
    let name = unsafe { CStr::from_ptr(lib_name) };

    match LOADER.open(name) {
        Ok(handle) => handle.into_raw(),
        Err(err) => {
            set_errno(err.errno());
            std::ptr::null_mut()
        }
    }
}

/// Release a handle returned by [`nsstub_dlopen`].
///
/// Returns 0 on success, -1 on error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nsstub_dlclose(handle: *mut c_void) -> c_int {
    // SAFETY: caller passes null or a handle obtained from nsstub_dlopen.
    let Some(handle) = (unsafe { DlHandle::from_raw(handle) }) else {
        set_errno(libc::EINVAL);
        return -1;
    };

    match LOADER.close(handle) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Copy the loader state into `out` without triggering initialization.
///
/// Returns 0 on success, -1 with `errno = EINVAL` if `out` is null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nsstub_loader_snapshot(out: *mut NsstubLoaderSnapshot) -> c_int {
    if out.is_null() {
        set_errno(libc::EINVAL);
        return -1;
    }

    let snapshot = LOADER
        .snapshot()
        .map_or_else(NsstubLoaderSnapshot::default, |s| NsstubLoaderSnapshot {
            initialized: 1,
            isolation_active: c_int::from(s.isolation_active),
            probe_loaded: c_int::from(s.probe_loaded),
            namespace_id: s.namespace_id.map_or(0, NamespaceId::raw),
        });
    // SAFETY: `out` is non-null and the caller guarantees it is writable.
    unsafe { out.write(snapshot) };
    0
}

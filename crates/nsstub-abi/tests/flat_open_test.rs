//! Integration tests for the entry points in flat (non-isolated) mode.
//!
//! Every test in this binary shares one process-wide loader, so they all name
//! the same target first.

use std::ffi::{CStr, c_int, c_void};

use nsstub::dlfcn_abi::{NsstubLoaderSnapshot, nsstub_dlclose, nsstub_dlopen, nsstub_loader_snapshot};

const TARGET: &CStr = c"libm.so.6";
const OTHER: &CStr = c"libc.so.6";

fn reset_errno() {
    // SAFETY: `__errno_location` returns this thread's errno slot.
    unsafe { *libc::__errno_location() = 0 };
}

fn errno() -> c_int {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

fn open(name: &CStr) -> *mut c_void {
    reset_errno();
    // SAFETY: `name` is a valid C string.
    unsafe { nsstub_dlopen(name.as_ptr()) }
}

fn close(handle: *mut c_void) -> c_int {
    // SAFETY: test handles come from nsstub_dlopen or are null.
    unsafe { nsstub_dlclose(handle) }
}

fn resolves_cos(handle: *mut c_void) -> bool {
    // SAFETY: `handle` is live and the symbol name is NUL-terminated.
    !unsafe { libc::dlsym(handle, c"cos".as_ptr()) }.is_null()
}

fn snapshot() -> NsstubLoaderSnapshot {
    let mut out = NsstubLoaderSnapshot::default();
    // SAFETY: `out` is a valid, writable snapshot.
    assert_eq!(unsafe { nsstub_loader_snapshot(&mut out) }, 0);
    out
}

#[test]
fn two_opens_return_independently_closable_handles() {
    let first = open(TARGET);
    let second = open(TARGET);
    assert!(!first.is_null());
    assert!(!second.is_null());

    assert_eq!(close(first), 0);
    assert!(resolves_cos(second), "second handle must survive closing the first");
    assert_eq!(close(second), 0);
}

#[test]
fn different_library_is_rejected_with_einval() {
    let pinned = open(TARGET);
    assert!(!pinned.is_null());

    let other = open(OTHER);
    assert!(other.is_null());
    assert_eq!(errno(), libc::EINVAL);

    assert!(resolves_cos(pinned), "first handle stays valid after the rejection");
    assert_eq!(close(pinned), 0);
}

#[test]
fn null_name_is_rejected_with_einval() {
    reset_errno();
    // SAFETY: null is an accepted input.
    let handle = unsafe { nsstub_dlopen(std::ptr::null()) };
    assert!(handle.is_null());
    assert_eq!(errno(), libc::EINVAL);
}

#[test]
fn snapshot_reports_flat_loading() {
    let handle = open(TARGET);
    assert!(!handle.is_null());

    let state = snapshot();
    assert_eq!(state.initialized, 1);
    assert_eq!(state.isolation_active, 0);
    assert_eq!(state.probe_loaded, 1);
    assert_eq!(state.namespace_id, 0);

    assert_eq!(close(handle), 0);
}

#[test]
fn snapshot_rejects_null_out_pointer() {
    reset_errno();
    // SAFETY: null is an accepted input.
    assert_eq!(unsafe { nsstub_loader_snapshot(std::ptr::null_mut()) }, -1);
    assert_eq!(errno(), libc::EINVAL);
}

#[test]
fn close_rejects_null_handle() {
    reset_errno();
    assert_eq!(close(std::ptr::null_mut()), -1);
    assert_eq!(errno(), libc::EINVAL);
}

#[test]
fn concurrent_opens_all_succeed() {
    const THREADS: usize = 8;
    let handles: Vec<usize> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| scope.spawn(|| open(TARGET) as usize))
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().expect("worker panicked"))
            .collect()
    });

    for handle in handles {
        assert_ne!(handle, 0);
        assert_eq!(close(handle as *mut c_void), 0);
    }
}

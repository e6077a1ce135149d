//! Host `dlfcn` implementation of [`DynamicLinker`], including the GNU
//! `dlmopen`/`dlinfo` namespace extensions.

use std::ffi::{CStr, CString, c_void};
use std::ptr::NonNull;

use nsstub_core::{DynamicLinker, LinkerError, NamespaceId, Retention};

/// Non-null handle returned by `dlopen`/`dlmopen`.
#[derive(Debug, PartialEq, Eq)]
pub struct DlHandle(NonNull<c_void>);

// SAFETY: dlfcn handles are process-global tokens; glibc serializes access to
// the link maps behind them.
unsafe impl Send for DlHandle {}
// SAFETY: see above. The handle is never dereferenced on the Rust side.
unsafe impl Sync for DlHandle {}

impl DlHandle {
    /// Wrap a raw handle, rejecting null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live handle from `dlopen`/`dlmopen` that the
    /// caller owns.
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    #[must_use]
    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Hand ownership to a C caller.
    #[must_use]
    pub fn into_raw(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Pending `dlerror` text, or `fallback` if the loader recorded none.
fn take_dlerror(fallback: &str) -> LinkerError {
    // SAFETY: dlerror returns null or a thread-local NUL-terminated string.
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        return LinkerError::new(fallback);
    }
    // SAFETY: non-null dlerror result is a valid C string until the next dl call.
    let text = unsafe { CStr::from_ptr(msg) };
    LinkerError::new(text.to_string_lossy().into_owned())
}

fn clear_dlerror() {
    // SAFETY: dlerror has no preconditions; calling it resets the pending error.
    unsafe { libc::dlerror() };
}

fn wrap(raw: *mut c_void, what: &str) -> Result<DlHandle, LinkerError> {
    // SAFETY: `raw` comes straight from dlopen/dlmopen.
    unsafe { DlHandle::from_raw(raw) }.ok_or_else(|| take_dlerror(what))
}

/// [`DynamicLinker`] backed by the process's real dynamic linker.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostLinker;

impl DynamicLinker for HostLinker {
    type Handle = DlHandle;

    fn self_image_path(&self) -> Result<CString, LinkerError> {
        let anchor = crate::dlfcn_abi::nsstub_dlopen as *const c_void;
        // SAFETY: Dl_info is a plain C struct; all-zero is a valid value.
        let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
        // SAFETY: `anchor` is the address of a function in this image and
        // `info` is valid for writes.
        let found = unsafe { libc::dladdr(anchor, &mut info) };
        if found == 0 || info.dli_fname.is_null() {
            return Err(LinkerError::new(
                "dladdr found no image containing the loader entry point",
            ));
        }
        // SAFETY: dli_fname is a NUL-terminated path owned by the loader.
        let path = unsafe { CStr::from_ptr(info.dli_fname) };
        if path.is_empty() {
            return Err(LinkerError::new("dladdr returned an empty image path"));
        }
        Ok(path.to_owned())
    }

    fn open_flat(&self, name: &CStr) -> Result<DlHandle, LinkerError> {
        clear_dlerror();
        // SAFETY: `name` is a valid C string.
        let raw = unsafe { libc::dlopen(name.as_ptr(), Retention::Local.flags()) };
        wrap(raw, "dlopen failed")
    }

    fn open_in_new_namespace(
        &self,
        path: &CStr,
        retention: Retention,
    ) -> Result<DlHandle, LinkerError> {
        clear_dlerror();
        // SAFETY: `path` is a valid C string; LM_ID_NEWLM asks for a fresh namespace.
        let raw = unsafe { libc::dlmopen(libc::LM_ID_NEWLM, path.as_ptr(), retention.flags()) };
        wrap(raw, "dlmopen into a new namespace failed")
    }

    fn open_in_namespace(
        &self,
        namespace: NamespaceId,
        name: &CStr,
        retention: Retention,
    ) -> Result<DlHandle, LinkerError> {
        clear_dlerror();
        // SAFETY: `name` is a valid C string and `namespace` came from dlinfo.
        let raw = unsafe { libc::dlmopen(namespace.raw(), name.as_ptr(), retention.flags()) };
        wrap(raw, "dlmopen into the established namespace failed")
    }

    fn namespace_of(&self, handle: &DlHandle) -> Result<NamespaceId, LinkerError> {
        let mut lmid: libc::Lmid_t = 0;
        clear_dlerror();
        // SAFETY: `handle` is live and `lmid` has the Lmid_t layout dlinfo writes.
        let rc = unsafe {
            libc::dlinfo(
                handle.as_ptr(),
                libc::RTLD_DI_LMID,
                (&raw mut lmid).cast::<c_void>(),
            )
        };
        if rc != 0 {
            return Err(take_dlerror("dlinfo(RTLD_DI_LMID) failed"));
        }
        Ok(NamespaceId(lmid))
    }

    fn invoke_entry(&self, handle: &DlHandle, symbol: &CStr) -> Result<(), LinkerError> {
        clear_dlerror();
        // SAFETY: `handle` is live and `symbol` is a valid C string.
        let sym = unsafe { libc::dlsym(handle.as_ptr(), symbol.as_ptr()) };
        if sym.is_null() {
            return Err(take_dlerror("undefined symbol"));
        }
        // SAFETY: the entry point contract is `extern "C" fn()`.
        let entry: unsafe extern "C" fn() = unsafe { std::mem::transmute(sym) };
        // SAFETY: the entry point takes no arguments and returns nothing.
        unsafe { entry() };
        Ok(())
    }

    fn close(&self, handle: DlHandle) -> Result<(), LinkerError> {
        clear_dlerror();
        // SAFETY: `handle` is live and ownership is consumed here.
        let rc = unsafe { libc::dlclose(handle.into_raw()) };
        if rc != 0 {
            return Err(take_dlerror("dlclose failed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_image_resolves_to_an_existing_file() {
        let path = HostLinker.self_image_path().expect("dladdr on own entry point");
        let path = std::path::PathBuf::from(path.to_string_lossy().into_owned());
        assert!(path.exists(), "{} should exist", path.display());
    }

    #[test]
    fn missing_library_reports_host_error_text() {
        let err = HostLinker
            .open_flat(c"libnsstub-host-linker-missing.so.0")
            .expect_err("library does not exist");
        assert!(err.message().contains("libnsstub-host-linker-missing.so.0"));
    }

    #[test]
    fn flat_handles_live_in_the_base_namespace() {
        let handle = HostLinker.open_flat(c"libm.so.6").expect("libm is present");
        assert_eq!(
            HostLinker.namespace_of(&handle).expect("dlinfo"),
            NamespaceId::BASE
        );
        HostLinker.close(handle).expect("dlclose");
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        let handle = HostLinker.open_flat(c"libm.so.6").expect("libm is present");
        let err = HostLinker
            .invoke_entry(&handle, c"nsstub_no_such_entry_point")
            .expect_err("libm has no such symbol");
        assert!(!err.message().is_empty());
        HostLinker.close(handle).expect("dlclose");
    }

    #[test]
    fn null_is_not_a_handle() {
        // SAFETY: null is explicitly allowed.
        assert!(unsafe { DlHandle::from_raw(std::ptr::null_mut()) }.is_none());
    }
}

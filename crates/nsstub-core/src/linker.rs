//! The seam between the loader state machine and the host dynamic linker.

use std::ffi::{CStr, CString};

use crate::error::LinkerError;

/// Identifier of a dynamic-linker namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(pub libc::Lmid_t);

impl NamespaceId {
    /// The main program's namespace (`LM_ID_BASE`).
    pub const BASE: Self = Self(libc::LM_ID_BASE);

    #[must_use]
    pub const fn raw(self) -> libc::Lmid_t {
        self.0
    }
}

/// Handle retention requested from the host loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retention {
    /// `RTLD_LOCAL | RTLD_NOW`; unloaded once the last reference is closed.
    Local,
    /// `RTLD_LOCAL | RTLD_NOW | RTLD_NODELETE`; never unloaded.
    Pinned,
}

impl Retention {
    /// `dlopen`/`dlmopen` mode flags for this retention.
    #[must_use]
    pub const fn flags(self) -> i32 {
        let base = libc::RTLD_LOCAL | libc::RTLD_NOW;
        match self {
            Self::Local => base,
            Self::Pinned => base | libc::RTLD_NODELETE,
        }
    }
}

/// Host dynamic-linker operations used by the loader.
///
/// Handles are opaque ownership tokens: they are not `Clone`, have no `Drop`
/// side effects, and are released only through [`DynamicLinker::close`].
pub trait DynamicLinker {
    type Handle: Send + Sync;

    /// Filesystem path of the image containing the stub's own code.
    fn self_image_path(&self) -> Result<CString, LinkerError>;

    /// Ordinary load into the main namespace with [`Retention::Local`].
    fn open_flat(&self, name: &CStr) -> Result<Self::Handle, LinkerError>;

    /// Load `path` into a namespace created for this load.
    fn open_in_new_namespace(
        &self,
        path: &CStr,
        retention: Retention,
    ) -> Result<Self::Handle, LinkerError>;

    /// Load `name` into an existing namespace.
    fn open_in_namespace(
        &self,
        namespace: NamespaceId,
        name: &CStr,
        retention: Retention,
    ) -> Result<Self::Handle, LinkerError>;

    /// Namespace a handle was loaded into.
    fn namespace_of(&self, handle: &Self::Handle) -> Result<NamespaceId, LinkerError>;

    /// Look up `symbol` in `handle` and call it as `extern "C" fn()`.
    fn invoke_entry(&self, handle: &Self::Handle, symbol: &CStr) -> Result<(), LinkerError>;

    /// Drop one reference to a loaded object.
    fn close(&self, handle: Self::Handle) -> Result<(), LinkerError>;
}

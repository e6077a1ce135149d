//! Error taxonomy for the delayed loader.
//!
//! Only [`LoadError`] reaches callers. [`SetupError`] is absorbed by the loader
//! when namespace setup degrades to flat loading, and a failed namespace-id
//! query never becomes a `Result` at all: it aborts the process.

use thiserror::Error;

/// Failure reported by the host dynamic linker, carrying its `dlerror` text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LinkerError {
    message: String,
}

impl LinkerError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Host error text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Caller-facing load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The target library could not be loaded, either on the first request
    /// (sticky for the process) or on this call's fresh open.
    #[error("shared object not found")]
    NotFound,
    /// The caller named a different library than the first request did.
    #[error("only the first requested library can be opened")]
    InvalidArgument,
}

impl LoadError {
    /// The `errno` value an ABI entry point reports for this error.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::NotFound => libc::ENOENT,
            Self::InvalidArgument => libc::EINVAL,
        }
    }
}

/// A namespace setup step that failed. Each one abandons isolation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("cannot resolve the stub's own image path: {0}")]
    SelfImage(#[source] LinkerError),
    #[error("cannot open the stub image into a new namespace: {0}")]
    AnchorLoad(#[source] LinkerError),
    #[error("priming entry point unavailable in the new namespace: {0}")]
    PrimingSymbol(#[source] LinkerError),
    #[error("cannot open the target library into the new namespace: {0}")]
    TargetLoad(#[source] LinkerError),
}

impl SetupError {
    /// Stable diagnostic tag for the failing step.
    #[must_use]
    pub const fn event(&self) -> &'static str {
        match self {
            Self::SelfImage(_) => "isolation.self_image",
            Self::AnchorLoad(_) => "isolation.anchor_load",
            Self::PrimingSymbol(_) => "isolation.priming",
            Self::TargetLoad(_) => "isolation.target_load",
        }
    }
}

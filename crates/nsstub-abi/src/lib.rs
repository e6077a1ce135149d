// Entry points take raw pointers from C callers and validate them at runtime,
// so per-function safety docs would be redundant boilerplate.
#![allow(clippy::missing_safety_doc)]
//! # nsstub-abi
//!
//! `extern "C"` boundary of the nsstub delayed loader.
//!
//! This crate produces a `cdylib` (`libnsstub.so`) that a stub library links
//! against. The stub calls [`dlfcn_abi::nsstub_dlopen`] on first real use; the
//! call is routed into the process-wide [`nsstub_core::DelayedNamespaceLoader`]
//! backed by the host `dlfcn` implementation in [`host_linker`].
//!
//! ```text
//! stub caller -> nsstub_dlopen -> DelayedNamespaceLoader -> HostLinker -> dlopen/dlmopen
//! ```
//!
//! Namespace isolation is opt-in via `NSSTUB_ISOLATE_NAMESPACE=1`.

pub mod dlfcn_abi;
pub mod host_linker;
pub mod namespace_abi;

mod errno;

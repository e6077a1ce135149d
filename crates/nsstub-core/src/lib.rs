//! # nsstub-core
//!
//! Safe logic behind the nsstub delayed loader.
//!
//! A stub shared library forwards its API into a target library that is only
//! loaded on first use. This crate owns the one-time initialization state,
//! the choice between namespace-isolated (`dlmopen`) and flat (`dlopen`)
//! loading, and the per-call re-open of the target. Every interaction with
//! the host dynamic linker goes through the [`linker::DynamicLinker`] seam,
//! which the ABI crate implements with raw `dlfcn` calls.
//!
//! No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod config;
pub mod diag;
pub mod error;
pub mod linker;
pub mod loader;

pub use config::{ISOLATION_ENV, IsolationMode, IsolationPolicy};
pub use diag::{Diagnostic, DiagnosticSink, MemorySink, Severity, StderrSink};
pub use error::{LinkerError, LoadError, SetupError};
pub use linker::{DynamicLinker, NamespaceId, Retention};
pub use loader::{DelayedNamespaceLoader, FatalHook, LoaderSnapshot, PRIMING_SYMBOL};

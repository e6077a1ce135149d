//! Delayed, optionally namespace-isolated loading of a single target library.
//!
//! The first [`DelayedNamespaceLoader::open`] call initializes the process
//! state exactly once:
//!
//! ```text
//! open(name) ──► OnceLock init ──► toggle == "1"? ──no──► dlopen(name)  = probe
//!                                       │
//!                                      yes
//!                                       ▼
//!                  dladdr(self) ─► dlmopen(NEWLM, self, NODELETE) = anchor
//!                  dlinfo(anchor, LMID)            (failure aborts)
//!                  dlsym(anchor, "namespace_init")()
//!                  dlmopen(lmid, name, NODELETE)   = probe
//! ```
//!
//! Any isolation step that fails degrades to the flat path with a warning.
//! Every call, the first included, then returns a fresh handle opened into
//! whichever namespace was established.

use std::ffi::{CStr, CString};
use std::sync::OnceLock;

use crate::config::IsolationPolicy;
use crate::diag::{Diagnostic, DiagnosticSink, StderrSink};
use crate::error::{LinkerError, LoadError, SetupError};
use crate::linker::{DynamicLinker, NamespaceId, Retention};

/// Entry point called once inside the freshly namespaced stub image.
pub const PRIMING_SYMBOL: &CStr = c"namespace_init";

/// Called when the host loader contradicts itself. Must not return.
pub type FatalHook = fn(&Diagnostic) -> !;

fn abort_process(_: &Diagnostic) -> ! {
    std::process::abort()
}

struct Isolation<H> {
    namespace_id: NamespaceId,
    // Keeps the namespace alive; never closed.
    #[allow(dead_code)]
    anchor: H,
}

struct LoaderState<H> {
    requested_name: CString,
    isolation: Option<Isolation<H>>,
    // Only its presence is consulted after initialization.
    probe: Option<H>,
}

/// Read-only view of the established loader state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSnapshot {
    pub requested_name: CString,
    pub isolation_active: bool,
    pub namespace_id: Option<NamespaceId>,
    pub probe_loaded: bool,
}

/// Loads one target library on first use and hands out fresh handles to it.
pub struct DelayedNamespaceLoader<L: DynamicLinker> {
    linker: L,
    policy: IsolationPolicy,
    sink: &'static dyn DiagnosticSink,
    fatal: FatalHook,
    state: OnceLock<LoaderState<L::Handle>>,
}

impl<L: DynamicLinker> DelayedNamespaceLoader<L> {
    /// Loader reading the isolation toggle from the environment, reporting to
    /// stderr and aborting on broken host invariants.
    #[must_use]
    pub const fn new(linker: L) -> Self {
        Self {
            linker,
            policy: IsolationPolicy::FromEnv,
            sink: &StderrSink,
            fatal: abort_process,
            state: OnceLock::new(),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: IsolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn with_sink(mut self, sink: &'static dyn DiagnosticSink) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub const fn with_fatal_hook(mut self, fatal: FatalHook) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn linker(&self) -> &L {
        &self.linker
    }

    /// Open the target library, initializing the loader on the first call.
    ///
    /// The first caller fixes the library name for the process. The returned
    /// handle is independent of the loader's own handles and belongs to the
    /// caller.
    ///
    /// An empty name is rejected before initialization and does not claim
    /// the first-caller slot.
    pub fn open(&self, lib_name: &CStr) -> Result<L::Handle, LoadError> {
        if lib_name.is_empty() {
            return Err(LoadError::InvalidArgument);
        }
        let state = self.state.get_or_init(|| self.initialize(lib_name));

        if state.probe.is_none() {
            return Err(LoadError::NotFound);
        }
        if state.requested_name.as_c_str() != lib_name {
            return Err(LoadError::InvalidArgument);
        }

        let fresh = match &state.isolation {
            Some(isolation) => self.linker.open_in_namespace(
                isolation.namespace_id,
                &state.requested_name,
                Retention::Local,
            ),
            None => self.linker.open_flat(&state.requested_name),
        };
        fresh.map_err(|err| {
            self.emit(Diagnostic::error(
                "load.fresh",
                format!("reopening {} failed: {err}", state.requested_name.to_string_lossy()),
            ));
            LoadError::NotFound
        })
    }

    /// Release a handle returned by [`open`](Self::open).
    ///
    /// A host failure is reported through the loader's sink as well as
    /// returned.
    pub fn close(&self, handle: L::Handle) -> Result<(), LinkerError> {
        self.linker.close(handle).inspect_err(|err| {
            self.emit(Diagnostic::error("load.close", format!("closing a handle failed: {err}")));
        })
    }

    /// State after initialization, or `None` before the first call.
    #[must_use]
    pub fn snapshot(&self) -> Option<LoaderSnapshot> {
        self.state.get().map(|state| LoaderSnapshot {
            requested_name: state.requested_name.clone(),
            isolation_active: state.isolation.is_some(),
            namespace_id: state.isolation.as_ref().map(|i| i.namespace_id),
            probe_loaded: state.probe.is_some(),
        })
    }

    fn initialize(&self, lib_name: &CStr) -> LoaderState<L::Handle> {
        let mut isolation = None;
        let mut probe = None;

        if self.policy.resolve().wants_isolation() {
            match self.initialize_namespace(lib_name) {
                Ok((established, target)) => {
                    isolation = Some(established);
                    probe = Some(target);
                }
                Err(err) => self.emit(Diagnostic::warning(
                    err.event(),
                    format!("{err}; falling back to non-isolated loading"),
                )),
            }
        }

        if probe.is_none() {
            match self.linker.open_flat(lib_name) {
                Ok(handle) => probe = Some(handle),
                Err(err) => self.emit(Diagnostic::error(
                    "load.primordial",
                    format!(
                        "loading {} failed: {err}; later requests will fail",
                        lib_name.to_string_lossy()
                    ),
                )),
            }
        }

        LoaderState {
            requested_name: lib_name.to_owned(),
            isolation,
            probe,
        }
    }

    fn initialize_namespace(
        &self,
        lib_name: &CStr,
    ) -> Result<(Isolation<L::Handle>, L::Handle), SetupError> {
        let image = self.linker.self_image_path().map_err(SetupError::SelfImage)?;
        let anchor = self
            .linker
            .open_in_new_namespace(&image, Retention::Pinned)
            .map_err(SetupError::AnchorLoad)?;

        let namespace_id = match self.linker.namespace_of(&anchor) {
            Ok(id) => id,
            Err(err) => {
                let diagnostic = Diagnostic::fatal(
                    "isolation.namespace_query",
                    format!("namespace id query failed on a valid handle: {err}"),
                );
                self.emit(diagnostic.clone());
                (self.fatal)(&diagnostic)
            }
        };

        let target = self
            .linker
            .invoke_entry(&anchor, PRIMING_SYMBOL)
            .map_err(SetupError::PrimingSymbol)
            .and_then(|()| {
                self.linker
                    .open_in_namespace(namespace_id, lib_name, Retention::Pinned)
                    .map_err(SetupError::TargetLoad)
            });

        match target {
            Ok(target) => Ok((
                Isolation {
                    namespace_id,
                    anchor,
                },
                target,
            )),
            Err(err) => {
                // Abandoned, but the anchor's namespace stays pinned until exit.
                std::mem::forget(anchor);
                Err(err)
            }
        }
    }

    fn emit(&self, diagnostic: Diagnostic) {
        self.sink.emit(&diagnostic);
    }
}

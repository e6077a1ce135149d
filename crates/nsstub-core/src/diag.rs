//! Human-readable diagnostics for fallback and failure paths.
//!
//! Lines go to stderr by default. They are for operators, not a parsed
//! contract; the `event` tag is stable so tests can match on it.

use std::fmt;
use std::io::Write;

use parking_lot::Mutex;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Degraded but working, e.g. isolation abandoned.
    Warning,
    /// A load request failed.
    Error,
    /// The process is about to abort.
    Fatal,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable tag for the failure site, e.g. `isolation.priming`.
    pub event: &'static str,
    pub detail: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(severity: Severity, event: &'static str, detail: impl Into<String>) -> Self {
        Self {
            severity,
            event,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn warning(event: &'static str, detail: impl Into<String>) -> Self {
        Self::new(Severity::Warning, event, detail)
    }

    #[must_use]
    pub fn error(event: &'static str, detail: impl Into<String>) -> Self {
        Self::new(Severity::Error, event, detail)
    }

    #[must_use]
    pub fn fatal(event: &'static str, detail: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, event, detail)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nsstub: {}: {}: {}",
            self.severity.as_str(),
            self.event,
            self.detail
        )
    }
}

/// Destination for diagnostics.
pub trait DiagnosticSink: Sync {
    fn emit(&self, diagnostic: &Diagnostic);
}

/// Writes one line per diagnostic to the process's stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, diagnostic: &Diagnostic) {
        // Nowhere left to report a failed stderr write.
        let _ = writeln!(std::io::stderr().lock(), "{diagnostic}");
    }
}

/// Keeps diagnostics in memory, for embedders that route them elsewhere and
/// for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Copy of everything emitted so far.
    #[must_use]
    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.lock().clone()
    }

    /// Events emitted so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<&'static str> {
        self.records.lock().iter().map(|d| d.event).collect()
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: &Diagnostic) {
        self.records.lock().push(diagnostic.clone());
    }
}

//! Diagnostic reporting.
//!
//! Parsing and ingestion run into recoverable conditions (missing identity,
//! duplicate title, dangling link) that must never abort a batch. Instead of
//! a global logger, every component reports through an injected
//! [`DiagnosticSink`]. [`LogSink`] forwards to the `log` facade and is the
//! default; [`MemorySink`] collects entries for inspection in tests.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single reported condition.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Path of the document the condition was observed in, if any.
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: None,
            message: message.into(),
        }
    }

    pub fn with_path(severity: Severity, path: &Path, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: Some(path.to_path_buf()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Receiver for recoverable conditions.
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// Default sink: forwards to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => log::info!("{}", diagnostic),
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::error!("{}", diagnostic),
        }
    }
}

/// Collects diagnostics in memory. Single-threaded, like the engine itself.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: RefCell<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries reported so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    /// Count of entries at the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Whether any entry's message contains the given fragment.
    pub fn contains(&self, fragment: &str) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|d| d.message.contains(fragment))
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        self.entries.borrow_mut().push(diagnostic);
    }
}

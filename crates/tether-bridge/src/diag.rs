//! User-surfaced diagnostics
//!
//! Degraded-mode conditions (dropped interface, unhashable map key, reload
//! dependency cycle, failed unload) are logged through `tracing` and also
//! collected here so embedders can present them. A blocking diagnostic means
//! the session cannot repair itself without a restart.

/// How severe a collected diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Degraded mode; the operation continued.
    Warning,
    /// The operation failed but the process is in a known-good state.
    Error,
    /// The session cannot repair itself; must be shown to the user.
    Blocking,
}

/// A single collected diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity of the condition.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

/// Collected diagnostics for one bridge context.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn warning(&mut self, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    /// Record an error.
    pub fn error(&mut self, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
        });
    }

    /// Record a blocking condition.
    pub fn blocking(&mut self, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity: Severity::Blocking,
            message: message.into(),
        });
    }

    /// Iterate collected diagnostics in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Whether any blocking diagnostic has been recorded.
    pub fn has_blocking(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.severity == Severity::Blocking)
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sink is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take all collected diagnostics, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}

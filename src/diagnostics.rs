//! Non-fatal findings collected while converting or validating a map.
//!
//! Anything that does not abort the current file ends up here, e.g. an
//! optional attribute that failed to parse and fell back to its default.
//! Every entry is also sent to the logger when it is recorded.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Where the finding was made, e.g. `layer 'Ground'` or `tileset 'terrain'`.
    pub context: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}: {}", self.severity, self.context, self.message)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, context.into(), message.into());
    }

    pub fn info(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Info, context.into(), message.into());
    }

    fn push(&mut self, severity: Severity, context: String, message: String) {
        let entry = Diagnostic { severity, context, message };
        match severity {
            Severity::Warning => log::warn!("{}", entry),
            Severity::Info => log::info!("{}", entry),
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

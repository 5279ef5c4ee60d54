// src/pipeline/diagnostics.rs

use std::fmt::Debug;

use tracing::warn;

/// A lint violation. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file: String,
    /// 1-based.
    pub line: usize,
    pub rule: &'static str,
    pub message: String,
}

/// Where lint stages send their findings.
pub trait DiagnosticSink: Send + Sync + Debug {
    fn report(&self, diagnostic: Diagnostic);
}

/// Default sink: one `warn!` per violation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, d: Diagnostic) {
        warn!(file = %d.file, line = d.line, rule = d.rule, "{}", d.message);
    }
}

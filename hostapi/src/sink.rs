//! Diagnostic sink — the host's observability channel.
//!
//! The bridge decodes guest diagnostics (aborts, assertion failures, log
//! calls) and forwards them to a `DiagnosticSink`. Sinks never fail and
//! never block guest execution.

use std::sync::Mutex;

use crate::fault::FaultRecord;

/// Receiver for guest-originated diagnostics.
///
/// Implementations must be cheap: log calls are on the guest's hot path and
/// the bridge invokes the sink synchronously.
pub trait DiagnosticSink: Send + Sync {
    /// A fatal guest fault (abort or assertion failure). The session is
    /// already `Faulted` when this is called.
    fn fatal(&self, fault: &FaultRecord);

    /// Labeled integer diagnostic from `logNumber`.
    fn log_number(&self, label: &str, value: i32);

    /// Labeled float diagnostic from `logFloat`.
    fn log_float(&self, label: &str, value: f64);

    /// Free-form text diagnostic from `logString`.
    fn log_text(&self, text: &str);

    /// `debugBreak` hook. No effect on program correctness; the default
    /// is a no-op for non-interactive hosts.
    fn debug_break(&self) {}
}

/// Default sink: forwards everything through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn fatal(&self, fault: &FaultRecord) {
        tracing::error!(target: "pigwasm::guest", "{}", fault);
    }

    fn log_number(&self, label: &str, value: i32) {
        tracing::info!(target: "pigwasm::guest", "{}: {} (0x{:x})", label, value, value);
    }

    fn log_float(&self, label: &str, value: f64) {
        tracing::info!(target: "pigwasm::guest", "{}: {}", label, value);
    }

    fn log_text(&self, text: &str) {
        tracing::info!(target: "pigwasm::guest", "{}", text);
    }

    fn debug_break(&self) {
        tracing::debug!(target: "pigwasm::guest", "debug breakpoint hit");
    }
}

/// One non-fatal diagnostic captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// From `logNumber`.
    Number { label: String, value: i32 },
    /// From `logFloat`.
    Float { label: String, value: f64 },
    /// From `logString`.
    Text(String),
    /// From `debugBreak`.
    Break,
}

/// In-memory sink that records everything it receives.
///
/// Useful for unit and integration tests where asserting on the exact
/// diagnostic stream matters more than observability.
#[derive(Debug, Default)]
pub struct RecordingSink {
    inner: Mutex<Recorded>,
}

#[derive(Debug, Default)]
struct Recorded {
    fatal: Option<FaultRecord>,
    entries: Vec<Diagnostic>,
}

impl RecordingSink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The fatal fault, if one was reported.
    pub fn fatal(&self) -> Option<FaultRecord> {
        self.inner.lock().unwrap().fatal.clone()
    }

    /// All non-fatal diagnostics in arrival order.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.inner.lock().unwrap().entries.clone()
    }

    /// Just the `logString` payloads, in arrival order.
    pub fn texts(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter_map(|d| match d {
                Diagnostic::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.fatal.is_none() && inner.entries.is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn fatal(&self, fault: &FaultRecord) {
        self.inner.lock().unwrap().fatal = Some(fault.clone());
    }

    fn log_number(&self, label: &str, value: i32) {
        self.inner.lock().unwrap().entries.push(Diagnostic::Number {
            label: label.to_string(),
            value,
        });
    }

    fn log_float(&self, label: &str, value: f64) {
        self.inner.lock().unwrap().entries.push(Diagnostic::Float {
            label: label.to_string(),
            value,
        });
    }

    fn log_text(&self, text: &str) {
        self.inner
            .lock()
            .unwrap()
            .entries
            .push(Diagnostic::Text(text.to_string()));
    }

    fn debug_break(&self) {
        self.inner.lock().unwrap().entries.push(Diagnostic::Break);
    }
}

//! Progress reporting seam.
//!
//! A sink receives `(message, completed, total)` after every finished request
//! and at phase boundaries. It is a best-effort signal: a sink that panics is
//! logged and otherwise ignored.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::obs::emit_progress_sink_panicked;

/// Observer for enrichment progress. Must be callable from any task.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str, completed: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, usize, usize) + Send + Sync,
{
    fn report(&self, message: &str, completed: usize, total: usize) {
        self(message, completed, total)
    }
}

/// Sink that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _message: &str, _completed: usize, _total: usize) {}
}

/// Prefixes every message with a phase label before forwarding.
pub struct PhaseProgress {
    phase: &'static str,
    inner: Arc<dyn ProgressSink>,
}

impl PhaseProgress {
    pub fn new(phase: &'static str, inner: Arc<dyn ProgressSink>) -> Self {
        Self { phase, inner }
    }
}

impl ProgressSink for PhaseProgress {
    fn report(&self, message: &str, completed: usize, total: usize) {
        self.inner
            .report(&format!("[{}] {message}", self.phase), completed, total);
    }
}

/// Invoke `sink`, swallowing any panic it raises.
pub fn report_safely(sink: &dyn ProgressSink, message: &str, completed: usize, total: usize) {
    if catch_unwind(AssertUnwindSafe(|| sink.report(message, completed, total))).is_err() {
        emit_progress_sink_panicked(message);
    }
}

//! Global atomic counters for enrichment runs.
//!
//! Counters accumulate across runs in the process. The CLI calls
//! [`Metrics::flush`] once before exiting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    requests_dispatched: AtomicU64,
    generation_failures: AtomicU64,
    enrichments_completed: AtomicU64,
    slides_noncompliant: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            requests_dispatched: AtomicU64::new(0),
            generation_failures: AtomicU64::new(0),
            enrichments_completed: AtomicU64::new(0),
            slides_noncompliant: AtomicU64::new(0),
        }
    }

    pub fn inc_requests_dispatched(&self) {
        self.requests_dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "requests_dispatched", "counter incremented");
    }

    pub fn inc_generation_failures(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "generation_failures", "counter incremented");
    }

    pub fn inc_enrichments_completed(&self) {
        self.enrichments_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "enrichments_completed", "counter incremented");
    }

    pub fn inc_slides_noncompliant(&self) {
        self.slides_noncompliant.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            requests_dispatched = self.requests_dispatched(),
            generation_failures = self.generation_failures(),
            enrichments_completed = self.enrichments_completed(),
            slides_noncompliant = self.slides_noncompliant(),
            "enrichment counters"
        );
    }

    pub fn requests_dispatched(&self) -> u64 {
        self.requests_dispatched.load(Ordering::Relaxed)
    }

    pub fn generation_failures(&self) -> u64 {
        self.generation_failures.load(Ordering::Relaxed)
    }

    pub fn enrichments_completed(&self) -> u64 {
        self.enrichments_completed.load(Ordering::Relaxed)
    }

    pub fn slides_noncompliant(&self) -> u64 {
        self.slides_noncompliant.load(Ordering::Relaxed)
    }

    /// Share of dispatched requests that failed, or `None` before any dispatch.
    pub fn failure_rate(&self) -> Option<f64> {
        match self.requests_dispatched() {
            0 => None,
            n => Some(self.generation_failures() as f64 / n as f64),
        }
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.requests_dispatched.store(0, Ordering::Relaxed);
        self.generation_failures.store(0, Ordering::Relaxed);
        self.enrichments_completed.store(0, Ordering::Relaxed);
        self.slides_noncompliant.store(0, Ordering::Relaxed);
    }
}

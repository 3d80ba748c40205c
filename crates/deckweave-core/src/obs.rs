//! Structured observability hooks for enrichment lifecycle events.
//!
//! This module provides:
//! - A run-scoped tracing span (`enrich_span`)
//! - Emission functions for start, per-item completion, slide validation and finish
//!
//! Events are emitted at `info!` level. Filter with `RUST_LOG`; the CLI's
//! `--json` flag switches to newline-delimited JSON.

use tracing::{debug, info, warn};

use crate::domain::{ContentType, GenerationOutcome};

/// Span tagged with the run id. Instrument the run future with it so every
/// event below carries `run_id`.
pub fn enrich_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("deckweave.enrich", run_id = %run_id)
}

/// Emit event: enrichment started.
pub fn emit_enrich_started(run_id: &str, title: &str, slides: usize) {
    info!(event = "enrich.started", run_id = %run_id, title = %title, slides = slides);
}

/// Emit event: one dispatched request settled.
pub fn emit_item_completed(slide_id: &str, content_type: ContentType, outcome: &GenerationOutcome) {
    match outcome {
        GenerationOutcome::Success(result) => debug!(
            event = "dispatch.item_completed",
            slide_id = %slide_id,
            content_type = %content_type,
            success = true,
            elapsed_ms = result.metadata.elapsed_ms,
        ),
        GenerationOutcome::Failure(failure) => warn!(
            event = "dispatch.item_completed",
            slide_id = %slide_id,
            content_type = %content_type,
            success = false,
            kind = %failure.kind,
            error = %failure.message,
        ),
    }
}

/// Emit event: a slide was checked against its layout.
pub fn emit_slide_validated(slide_id: &str, layout_id: &str, compliant: bool, violations: usize) {
    debug!(
        event = "slide.validated",
        slide_id = %slide_id,
        layout_id = %layout_id,
        compliant = compliant,
        violations = violations,
    );
}

/// Emit event: enrichment finished.
pub fn emit_enrich_finished(
    run_id: &str,
    duration_ms: u64,
    successful_items: usize,
    failed_items: usize,
    compliant: bool,
    cancelled: bool,
) {
    info!(
        event = "enrich.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        successful_items = successful_items,
        failed_items = failed_items,
        compliant = compliant,
        cancelled = cancelled,
    );
}

/// Emit event: a progress sink panicked and was ignored (warning level).
pub fn emit_progress_sink_panicked(message: &str) {
    warn!(event = "progress.sink_panicked", message = %message);
}

//! Presentation-level roll-up of validation verdicts and dispatch outcomes.
//!
//! Pure: counts are derived from the slices passed in and nothing is
//! dispatched, awaited or logged.

use chrono::{DateTime, Utc};

use crate::domain::{
    DispatchedOutcome, EnrichedSlide, FailureRecord, GenerationMetadata, GenerationOutcome,
    ValidationReport, ARCHITECTURE, ORCHESTRATOR_VERSION,
};

/// Run-level facts the aggregator records but does not compute.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub run_id: String,
    pub generation_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub cancelled: bool,
}

pub fn aggregate(
    slides: &[EnrichedSlide],
    outcomes: &[DispatchedOutcome],
    run: RunInfo,
) -> (ValidationReport, GenerationMetadata) {
    let compliant_slides = slides
        .iter()
        .filter(|s| s.validation_status.compliant)
        .count();
    let total_violations = slides
        .iter()
        .map(|s| s.validation_status.violations.len())
        .sum();
    let critical_violations = slides
        .iter()
        .map(|s| s.validation_status.critical_count())
        .sum();

    let report = ValidationReport {
        overall_compliant: critical_violations == 0,
        total_slides: slides.len(),
        compliant_slides,
        total_violations,
        critical_violations,
    };

    let failures: Vec<FailureRecord> = outcomes
        .iter()
        .filter_map(|item| match &item.outcome {
            GenerationOutcome::Failure(f) => Some(FailureRecord {
                slide_id: item.slide_id.clone(),
                content_type: item.content_type,
                kind: f.kind,
                message: f.message.clone(),
            }),
            GenerationOutcome::Success(_) => None,
        })
        .collect();
    let failed_items = failures.len();
    let successful_items = outcomes.len() - failed_items;

    let metadata = GenerationMetadata {
        run_id: run.run_id,
        successful_items,
        failed_items,
        total_api_requests: outcomes.len(),
        total_items_generated: successful_items + failed_items,
        failures,
        generation_time_ms: run.generation_time_ms,
        timestamp: run.timestamp,
        orchestrator_version: ORCHESTRATOR_VERSION.to_string(),
        architecture: ARCHITECTURE.to_string(),
        cancelled: run.cancelled,
    };

    (report, metadata)
}

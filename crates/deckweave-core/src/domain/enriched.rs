//! Output of an enrichment run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentType, GenerationResult};
use super::error::FailureKind;
use super::outline::{PresentationOutline, SlideSpec};
use super::validation::{ValidationReport, ValidationStatus};

pub const ORCHESTRATOR_VERSION: &str = "2.0";
pub const ARCHITECTURE: &str = "lightweight";

/// A slide with whatever content its generators managed to produce.
///
/// Content types that were not requested, or whose request failed, are absent
/// from `generated_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedSlide {
    pub original_slide: SlideSpec,
    pub slide_id: String,
    pub layout_id: String,
    pub generated_content: BTreeMap<ContentType, GenerationResult>,
    pub validation_status: ValidationStatus,
}

impl EnrichedSlide {
    pub fn content(&self, content_type: ContentType) -> Option<&GenerationResult> {
        self.generated_content.get(&content_type)
    }

    pub fn has(&self, content_type: ContentType) -> bool {
        self.generated_content.contains_key(&content_type)
    }
}

/// A failed request, as listed in the generation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub slide_id: String,
    pub content_type: ContentType,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub run_id: String,
    pub successful_items: usize,
    pub failed_items: usize,
    pub total_api_requests: usize,
    pub total_items_generated: usize,
    pub failures: Vec<FailureRecord>,
    pub generation_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub orchestrator_version: String,
    pub architecture: String,
    pub cancelled: bool,
}

/// Everything one `enrich` call produces. Not retained by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub original_outline: PresentationOutline,
    pub enriched_slides: Vec<EnrichedSlide>,
    pub validation_report: ValidationReport,
    pub generation_metadata: GenerationMetadata,
}

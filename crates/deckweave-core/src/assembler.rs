//! Groups dispatch outcomes back into per-slide records.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::domain::{
    DispatchedOutcome, EnrichedSlide, GenerationOutcome, SlideSpec, ValidationStatus,
};

/// Build the enriched record for one slide.
///
/// Only successful outcomes reach the content map; failed content types are
/// simply absent. Outcomes tagged with another slide id are ignored, so the
/// caller may pass the whole batch. Validation status starts out compliant
/// and is filled in by the validator.
pub fn assemble<'a, I>(slide: &SlideSpec, layout_id: &str, outcomes: I) -> EnrichedSlide
where
    I: IntoIterator<Item = &'a DispatchedOutcome>,
{
    let mut generated_content = BTreeMap::new();
    let mut failed = 0usize;
    for item in outcomes
        .into_iter()
        .filter(|item| item.slide_id == slide.slide_id)
    {
        match &item.outcome {
            GenerationOutcome::Success(result) => {
                generated_content
                    .entry(item.content_type)
                    .or_insert_with(|| result.clone());
            }
            GenerationOutcome::Failure(_) => failed += 1,
        }
    }

    debug!(
        slide_id = %slide.slide_id,
        layout_id = %layout_id,
        generated = generated_content.len(),
        failed = failed,
        "assembled slide"
    );

    EnrichedSlide {
        original_slide: slide.clone(),
        slide_id: slide.slide_id.clone(),
        layout_id: layout_id.to_string(),
        generated_content,
        validation_status: ValidationStatus::compliant(),
    }
}

/// Index a batch of outcomes by owning slide id, preserving batch order.
pub fn group_by_slide(outcomes: &[DispatchedOutcome]) -> HashMap<&str, Vec<&DispatchedOutcome>> {
    let mut grouped: HashMap<&str, Vec<&DispatchedOutcome>> = HashMap::new();
    for item in outcomes {
        grouped.entry(item.slide_id.as_str()).or_default().push(item);
    }
    grouped
}

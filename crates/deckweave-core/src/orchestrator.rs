//! End-to-end enrichment: build, dispatch, assemble, validate, aggregate.
//!
//! Only structurally invalid input is rejected. Everything that goes wrong
//! after validation (backend failures, timeouts, cancellation) is reported
//! inside the returned [`EnrichmentResult`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::assembler::{assemble, group_by_slide};
use crate::config::EnrichConfig;
use crate::dispatcher::ConcurrentDispatcher;
use crate::domain::{
    DispatchedOutcome, EnrichError, EnrichedSlide, EnrichmentResult, GenerationRequest, LayoutAssignment,
    LayoutSpecification, PresentationContext, PresentationOutline, Result,
};
use crate::metrics::METRICS;
use crate::obs::{emit_enrich_finished, emit_enrich_started, emit_slide_validated, enrich_span};
use crate::port::GeneratorRegistry;
use crate::progress::{report_safely, NoopProgress, PhaseProgress, ProgressSink};
use crate::report::{aggregate, RunInfo};
use crate::request_builder::RequestBuilder;
use crate::validator::ComplianceValidator;

/// Layout specifications keyed by layout id.
pub type LayoutSpecs = BTreeMap<String, LayoutSpecification>;

#[derive(Debug, Clone)]
pub struct Orchestrator {
    dispatcher: ConcurrentDispatcher,
    builder: RequestBuilder,
    validator: ComplianceValidator,
    default_layout_id: String,
}

impl Orchestrator {
    pub fn new(registry: GeneratorRegistry, config: EnrichConfig) -> Self {
        let missing = registry.missing();
        if !missing.is_empty() {
            warn!(missing = ?missing, "no generator registered for some content types");
        }
        Self {
            dispatcher: ConcurrentDispatcher::new(registry, config.dispatch),
            builder: RequestBuilder::new(config.text),
            validator: ComplianceValidator::new(config.severity),
            default_layout_id: config.default_layout_id,
        }
    }

    /// Enrich every slide of `outline`. Never fails once the input is valid.
    pub async fn enrich(
        &self,
        outline: &PresentationOutline,
        assignments: Option<&[LayoutAssignment]>,
        specs: Option<&LayoutSpecs>,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<EnrichmentResult> {
        let (_never_cancel, cancel) = watch::channel(false);
        self.enrich_until(outline, assignments, specs, progress, cancel)
            .await
    }

    /// Like [`enrich`](Self::enrich), but stops dispatching when `cancel`
    /// flips to `true`. The result is still complete: unfinished requests are
    /// recorded as cancelled failures and `generation_metadata.cancelled` is set.
    pub async fn enrich_until(
        &self,
        outline: &PresentationOutline,
        assignments: Option<&[LayoutAssignment]>,
        specs: Option<&LayoutSpecs>,
        progress: Option<Arc<dyn ProgressSink>>,
        cancel: watch::Receiver<bool>,
    ) -> Result<EnrichmentResult> {
        let layout_ids = self.resolve_layouts(outline, assignments, specs)?;
        let run_id = Uuid::new_v4().to_string();
        let span = enrich_span(&run_id);
        self.run(outline, layout_ids, specs, progress, cancel, run_id)
            .instrument(span)
            .await
    }

    /// The requests an enrichment would dispatch, without dispatching them.
    pub fn plan(
        &self,
        outline: &PresentationOutline,
        assignments: Option<&[LayoutAssignment]>,
        specs: Option<&LayoutSpecs>,
    ) -> Result<Vec<GenerationRequest>> {
        let layout_ids = self.resolve_layouts(outline, assignments, specs)?;
        Ok(self.build_requests(outline, &layout_ids, specs))
    }

    async fn run(
        &self,
        outline: &PresentationOutline,
        layout_ids: Vec<String>,
        specs: Option<&LayoutSpecs>,
        progress: Option<Arc<dyn ProgressSink>>,
        cancel: watch::Receiver<bool>,
        run_id: String,
    ) -> Result<EnrichmentResult> {
        let started = Instant::now();
        let sink: Arc<dyn ProgressSink> = progress.unwrap_or_else(|| Arc::new(NoopProgress));

        let requests = self.build_requests(outline, &layout_ids, specs);
        let total = requests.len();
        emit_enrich_started(&run_id, &outline.title, outline.slides.len());
        report_safely(
            sink.as_ref(),
            &format!(
                "[plan] {total} requests for {} slides",
                outline.slides.len()
            ),
            0,
            total,
        );

        let phased: Arc<dyn ProgressSink> = Arc::new(PhaseProgress::new("dispatch", sink.clone()));
        let dispatch = self
            .dispatcher
            .dispatch_until(requests, phased, cancel)
            .await;

        let enriched = self.assemble_and_validate(outline, &layout_ids, specs, &dispatch.outcomes);
        report_safely(
            sink.as_ref(),
            &format!("[validate] {} slides checked", enriched.len()),
            total,
            total,
        );

        let (validation_report, generation_metadata) = aggregate(
            &enriched,
            &dispatch.outcomes,
            RunInfo {
                run_id: run_id.clone(),
                generation_time_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
                cancelled: dispatch.cancelled,
            },
        );

        METRICS.inc_enrichments_completed();
        emit_enrich_finished(
            &run_id,
            generation_metadata.generation_time_ms,
            generation_metadata.successful_items,
            generation_metadata.failed_items,
            validation_report.overall_compliant,
            generation_metadata.cancelled,
        );

        Ok(EnrichmentResult {
            original_outline: outline.clone(),
            enriched_slides: enriched,
            validation_report,
            generation_metadata,
        })
    }

    fn build_requests(
        &self,
        outline: &PresentationOutline,
        layout_ids: &[String],
        specs: Option<&LayoutSpecs>,
    ) -> Vec<GenerationRequest> {
        let ctx = PresentationContext::from(outline);
        outline
            .slides
            .iter()
            .zip(layout_ids)
            .flat_map(|(slide, layout_id)| {
                let spec = specs.and_then(|m| m.get(layout_id));
                self.builder.build_for_layout(slide, &ctx, spec)
            })
            .collect()
    }

    fn assemble_and_validate(
        &self,
        outline: &PresentationOutline,
        layout_ids: &[String],
        specs: Option<&LayoutSpecs>,
        outcomes: &[DispatchedOutcome],
    ) -> Vec<EnrichedSlide> {
        let grouped = group_by_slide(outcomes);

        outline
            .slides
            .iter()
            .zip(layout_ids)
            .map(|(slide, layout_id)| {
                let slide_outcomes = grouped
                    .get(slide.slide_id.as_str())
                    .into_iter()
                    .flatten()
                    .copied();
                let mut enriched = assemble(slide, layout_id, slide_outcomes);
                let status = self
                    .validator
                    .validate(&enriched, specs.and_then(|m| m.get(layout_id)));
                emit_slide_validated(
                    &enriched.slide_id,
                    layout_id,
                    status.compliant,
                    status.violations.len(),
                );
                if !status.compliant {
                    METRICS.inc_slides_noncompliant();
                }
                enriched.validation_status = status;
                enriched
            })
            .collect()
    }

    /// Check the input and return the layout id for every slide, in slide order.
    fn resolve_layouts(
        &self,
        outline: &PresentationOutline,
        assignments: Option<&[LayoutAssignment]>,
        specs: Option<&LayoutSpecs>,
    ) -> Result<Vec<String>> {
        if outline.slides.is_empty() {
            return Err(EnrichError::EmptyOutline);
        }

        let mut slide_ids = HashSet::new();
        for slide in &outline.slides {
            if !slide_ids.insert(slide.slide_id.as_str()) {
                return Err(EnrichError::DuplicateSlideId {
                    slide_id: slide.slide_id.clone(),
                });
            }
        }

        let mut by_slide: HashMap<&str, &str> = HashMap::new();
        for assignment in assignments.unwrap_or_default() {
            if !slide_ids.contains(assignment.slide_id.as_str()) {
                return Err(EnrichError::UnknownAssignmentSlide {
                    slide_id: assignment.slide_id.clone(),
                });
            }
            if by_slide
                .insert(&assignment.slide_id, &assignment.layout_id)
                .is_some()
            {
                return Err(EnrichError::DuplicateAssignment {
                    slide_id: assignment.slide_id.clone(),
                });
            }
        }

        for (key, spec) in specs.into_iter().flatten() {
            if key != &spec.layout_id {
                return Err(EnrichError::MalformedLayoutSpecification {
                    layout_id: key.clone(),
                    reason: format!("registered under a different id ({})", spec.layout_id),
                });
            }
            spec.check_well_formed()?;
        }

        let layout_ids: Vec<String> = outline
            .slides
            .iter()
            .map(|slide| {
                by_slide
                    .get(slide.slide_id.as_str())
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| self.default_layout_id.clone())
            })
            .collect();

        if let Some(specs) = specs {
            let unspecified = layout_ids.iter().filter(|id| !specs.contains_key(*id)).count();
            if unspecified > 0 {
                info!(
                    slides = unspecified,
                    "slides without a layout specification are compliant by default"
                );
            }
        }

        Ok(layout_ids)
    }
}

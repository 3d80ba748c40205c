//! Domain models for Deckweave.
//!
//! Canonical definitions for the core entities:
//! - `PresentationOutline` / `SlideSpec`: immutable enrichment input
//! - `GenerationRequest` / `GenerationOutcome`: one unit of backend work and its result
//! - `LayoutSpecification`: what a slide's layout requires
//! - `EnrichedSlide` / `EnrichmentResult`: enrichment output

pub mod content;
pub mod enriched;
pub mod error;
pub mod layout;
pub mod outline;
pub mod validation;

pub use content::{
    ChartRequest, ChartType, ContentType, DiagramRequest, DiagramType, DispatchedOutcome,
    GeneratedChart, GeneratedContent, GeneratedDiagram, GeneratedImage, GeneratedText,
    GenerationFailure, GenerationOutcome, GenerationRequest, GenerationResult, Guidance,
    ImageRequest, RequestPayload, ResultMetadata, TextConstraints, TextFormat, TextRequest,
};
pub use enriched::{
    EnrichedSlide, EnrichmentResult, FailureRecord, GenerationMetadata, ARCHITECTURE,
    ORCHESTRATOR_VERSION,
};
pub use error::{EnrichError, FailureKind, GenerationError, Result};
pub use layout::{
    parse_aspect_ratio, ContentRegion, LayoutAssignment, LayoutSpecification, WordRange,
};
pub use outline::{PresentationContext, PresentationOutline, SlideSpec};
pub use validation::{ConstraintKind, Severity, ValidationReport, ValidationStatus, Violation};

//! Deckweave Core Library
//!
//! Enriches a presentation outline with generated text, charts, images and
//! diagrams, then checks every slide against its layout.
//!
//! The pipeline is: [`RequestBuilder`] expands slides into requests,
//! [`ConcurrentDispatcher`] runs them against [`GeneratorPort`]s,
//! [`assemble`] groups outcomes per slide, [`ComplianceValidator`] checks
//! them and [`aggregate`] rolls everything up. [`Orchestrator`] wires the
//! steps together.

pub mod assembler;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod fakes;
pub mod guidance;
pub mod layouts;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod port;
pub mod progress;
pub mod report;
pub mod request_builder;
pub mod telemetry;
pub mod validator;

pub use assembler::{assemble, group_by_slide};

pub use config::{
    ConfigError, DispatchConfig, EnrichConfig, RetryPolicy, SeverityPolicy, TextDefaults,
};

pub use dispatcher::{ConcurrentDispatcher, DispatchReport};

pub use domain::{
    ChartType, ConstraintKind, ContentRegion, ContentType, DiagramType, DispatchedOutcome,
    EnrichError, EnrichedSlide, EnrichmentResult, FailureKind, FailureRecord, GeneratedContent,
    GenerationError, GenerationFailure, GenerationMetadata, GenerationOutcome, GenerationRequest,
    GenerationResult, Guidance, LayoutAssignment, LayoutSpecification, PresentationContext,
    PresentationOutline, RequestPayload, Result, Severity, SlideSpec, ValidationReport,
    ValidationStatus, Violation,
};

pub use fakes::{FailingGenerator, ScriptedGenerator, StubGenerator};

pub use guidance::{has_valid_guidance, parse_guidance};

pub use layouts::{builtin_catalog, infer_assignments};

pub use metrics::METRICS;

pub use orchestrator::{LayoutSpecs, Orchestrator};

pub use port::{GeneratorPort, GeneratorRegistry, PortResult};

pub use progress::{NoopProgress, PhaseProgress, ProgressSink};

pub use report::{aggregate, RunInfo};

pub use request_builder::RequestBuilder;

pub use telemetry::init_tracing;

pub use validator::ComplianceValidator;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

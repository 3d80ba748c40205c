//! Error taxonomy for Deckweave.
//!
//! Only [`EnrichError`] ever leaves [`crate::Orchestrator::enrich`]. Backend
//! failures are [`GenerationError`]s, which the dispatcher turns into data.

use serde::{Deserialize, Serialize};

use super::content::ContentType;

/// Input problems that make a whole enrichment run meaningless.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("presentation outline has no slides")]
    EmptyOutline,

    #[error("duplicate slide id: {slide_id}")]
    DuplicateSlideId { slide_id: String },

    #[error("layout assignment references unknown slide: {slide_id}")]
    UnknownAssignmentSlide { slide_id: String },

    #[error("slide {slide_id} has more than one layout assignment")]
    DuplicateAssignment { slide_id: String },

    #[error("malformed layout specification {layout_id}: {reason}")]
    MalformedLayoutSpecification { layout_id: String, reason: String },
}

/// Result type for enrichment runs.
pub type Result<T> = std::result::Result<T, EnrichError>;

/// Why a single generation request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection, DNS or IO failure talking to the backend.
    Transport,
    /// The request did not finish within its time budget.
    Timeout,
    /// The backend answered with a non-success status.
    UpstreamRejected,
    /// The backend answered, but the body could not be interpreted.
    MalformedResponse,
    /// No generator is registered for the content type.
    NoGenerator,
    /// The run was cancelled before the request finished.
    Cancelled,
    /// The generator panicked or the task was lost.
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::UpstreamRejected => "upstream_rejected",
            FailureKind::MalformedResponse => "malformed_response",
            FailureKind::NoGenerator => "no_generator",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A failed call to a [`crate::GeneratorPort`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct GenerationError {
    pub kind: FailureKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(
            FailureKind::UpstreamRejected,
            format!("status {status}: {}", message.into()),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, message)
    }

    pub fn no_generator(content_type: ContentType) -> Self {
        Self::new(
            FailureKind::NoGenerator,
            format!("no generator registered for {content_type}"),
        )
    }

    /// Transient failures worth another attempt when a retry policy allows it.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, FailureKind::Transport | FailureKind::Timeout)
    }
}

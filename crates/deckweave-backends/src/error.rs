//! Error types for deckweave-backends

use deckweave_core::{FailureKind, GenerationError};
use thiserror::Error;

/// Errors setting up an HTTP backend. Per-request failures are
/// [`GenerationError`]s instead.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The HTTP client could not be built
    #[error("cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The service URL is unusable
    #[error("invalid service URL for {content_type}: {url}")]
    InvalidUrl { content_type: String, url: String },
}

/// Result type for backend construction
pub type Result<T> = std::result::Result<T, BackendError>;

/// Map a reqwest failure onto the generation failure taxonomy.
pub fn classify(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::timeout(err.to_string())
    } else if let Some(status) = err.status() {
        GenerationError::rejected(status.as_u16(), err.to_string())
    } else if err.is_decode() {
        GenerationError::malformed(err.to_string())
    } else {
        GenerationError::new(FailureKind::Transport, err.to_string())
    }
}

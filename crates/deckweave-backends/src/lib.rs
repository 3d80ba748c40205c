//! HTTP generation backends for Deckweave.
//!
//! Each of the four content services is reached through the same
//! [`HttpGenerator`], configured per content type from the environment.

pub mod config;
pub mod error;
pub mod http;

pub use config::HttpGeneratorConfig;
pub use error::{BackendError, Result};
pub use http::{parse_generation_result, service_body, HttpGenerator};

use std::sync::Arc;

use deckweave_core::{ContentType, GeneratorRegistry};

/// A registry with an [`HttpGenerator`] for every content type, each
/// configured by [`HttpGeneratorConfig::from_env`].
pub fn http_registry_from_env() -> Result<GeneratorRegistry> {
    let mut registry = GeneratorRegistry::new();
    for content_type in ContentType::ALL {
        registry.register(Arc::new(HttpGenerator::from_env(content_type)?));
    }
    Ok(registry)
}

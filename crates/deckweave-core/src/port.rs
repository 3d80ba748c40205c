//! Generator capability and the per-content-type lookup table.
//!
//! Implement [`GeneratorPort`] to plug in a real backend, or use the stubs in
//! [`crate::fakes`] for tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ContentType, GenerationError, GenerationRequest, GenerationResult};

/// Result of a single generator call.
pub type PortResult = std::result::Result<GenerationResult, GenerationError>;

/// One content-generation backend.
///
/// `generate` may wait however it likes (streaming, job polling, ...), but it
/// must eventually resolve to a result or a [`GenerationError`].
#[async_trait]
pub trait GeneratorPort: Send + Sync {
    /// The content type this generator produces.
    fn content_type(&self) -> ContentType;

    async fn generate(&self, request: &GenerationRequest) -> PortResult;
}

/// Maps each content type to the generator that handles it.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    ports: BTreeMap<ContentType, Arc<dyn GeneratorPort>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `port` under the content type it reports. Replaces any
    /// previous registration for that type.
    pub fn register(&mut self, port: Arc<dyn GeneratorPort>) -> &mut Self {
        self.ports.insert(port.content_type(), port);
        self
    }

    pub fn with(mut self, port: Arc<dyn GeneratorPort>) -> Self {
        self.register(port);
        self
    }

    pub fn get(&self, content_type: ContentType) -> Option<Arc<dyn GeneratorPort>> {
        self.ports.get(&content_type).cloned()
    }

    /// Content types with no registered generator.
    pub fn missing(&self) -> Vec<ContentType> {
        ContentType::ALL
            .into_iter()
            .filter(|t| !self.ports.contains_key(t))
            .collect()
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("content_types", &self.ports.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FailingGenerator, StubGenerator};
    use crate::domain::FailureKind;

    #[test]
    fn test_register_uses_reported_content_type() {
        let registry = GeneratorRegistry::new()
            .with(Arc::new(StubGenerator::new(ContentType::Chart)))
            .with(Arc::new(FailingGenerator::new(
                ContentType::Image,
                FailureKind::Timeout,
            )));

        assert_eq!(
            registry.get(ContentType::Chart).map(|p| p.content_type()),
            Some(ContentType::Chart)
        );
        assert!(registry.get(ContentType::Text).is_none());
        assert_eq!(registry.missing(), vec![ContentType::Text, ContentType::Diagram]);
    }

    #[test]
    fn test_later_registration_replaces_earlier() {
        let mut registry = GeneratorRegistry::new();
        registry.register(Arc::new(StubGenerator::new(ContentType::Text)));
        registry.register(Arc::new(FailingGenerator::new(
            ContentType::Text,
            FailureKind::Transport,
        )));
        assert_eq!(registry.missing().len(), 3);
    }
}

//! In-process generators for tests and offline runs.
//!
//! Provides `StubGenerator`, `FailingGenerator` and `ScriptedGenerator`, all
//! of which satisfy [`GeneratorPort`] without any network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::{
    ContentType, FailureKind, GeneratedChart, GeneratedContent, GeneratedDiagram, GeneratedImage,
    GeneratedText, GenerationError, GenerationRequest, GenerationResult, RequestPayload,
    ResultMetadata, TextFormat,
};
use crate::port::{GeneratorPort, GeneratorRegistry, PortResult};

impl GeneratorRegistry {
    /// Registry with a [`StubGenerator`] for every content type.
    pub fn stubbed() -> Self {
        ContentType::ALL
            .into_iter()
            .fold(GeneratorRegistry::new(), |registry, content_type| {
                registry.with(Arc::new(StubGenerator::new(content_type)))
            })
    }
}

// ---------------------------------------------------------------------------
// StubGenerator
// ---------------------------------------------------------------------------

/// Deterministic generator that echoes the request back as plausible content.
///
/// Text honours the requested word count and character limit, so stub output
/// passes validation against well-formed layouts.
#[derive(Debug)]
pub struct StubGenerator {
    content_type: ContentType,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl StubGenerator {
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeneratorPort for StubGenerator {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    async fn generate(&self, request: &GenerationRequest) -> PortResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut result = stub_result(request);
        result.metadata.elapsed_ms = self.latency.map(|l| l.as_millis() as u64).unwrap_or(0);
        Ok(result)
    }
}

fn stub_result(request: &GenerationRequest) -> GenerationResult {
    let slide_id = &request.slide_id;
    let content = match &request.payload {
        RequestPayload::Text(text) => {
            let seed = if text.topics.is_empty() {
                vec![text.slide_title.clone()]
            } else {
                text.topics.clone()
            };
            let words: Vec<&str> = seed
                .iter()
                .flat_map(|t| t.split_whitespace())
                .cycle()
                .take(text.constraints.word_count as usize)
                .collect();
            let body = match text.constraints.max_characters {
                Some(limit) => truncate_words(&words, limit),
                None => words.join(" "),
            };
            let mut generated = GeneratedText::new(body);
            if text.constraints.format == TextFormat::Table || text.table.is_some() {
                let mut rows = vec![vec!["Topic".to_string(), "Detail".to_string()]];
                rows.extend(seed.iter().map(|t| vec![t.clone(), text.slide_title.clone()]));
                generated.table = Some(rows);
            }
            GeneratedContent::Text(generated)
        }
        RequestPayload::Chart(chart) => GeneratedContent::Chart(GeneratedChart {
            chart_type: chart.chart_type,
            url: format!("stub://chart/{slide_id}.png"),
            data: chart.data.clone().unwrap_or_else(|| json!({"labels": [], "values": []})),
            aspect_ratio: Some(ratio_label(chart.width, chart.height)),
        }),
        RequestPayload::Image(image) => GeneratedContent::Image(GeneratedImage {
            url: format!("stub://image/{slide_id}.png"),
            caption: (!image.guidance.content.is_empty()).then(|| image.guidance.content.clone()),
            aspect_ratio: image.aspect_ratio.clone(),
        }),
        RequestPayload::Diagram(diagram) => GeneratedContent::Diagram(GeneratedDiagram {
            diagram_type: diagram.diagram_type,
            url: format!("stub://diagram/{slide_id}.svg"),
            data: None,
        }),
    };
    GenerationResult {
        content,
        metadata: ResultMetadata {
            model: "stub".to_string(),
            source: "stub".to_string(),
            ..ResultMetadata::default()
        },
    }
}

/// Join whole words while the result stays within `limit` characters.
fn truncate_words(words: &[&str], limit: usize) -> String {
    let mut out = String::new();
    for word in words {
        let extra = if out.is_empty() { word.len() } else { word.len() + 1 };
        if out.len() + extra > limit {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Reduce `width x height` to a `w:h` label, e.g. 1600x900 -> "16:9".
fn ratio_label(width: u32, height: u32) -> String {
    fn gcd(a: u32, b: u32) -> u32 {
        if b == 0 {
            a
        } else {
            gcd(b, a % b)
        }
    }
    let d = gcd(width, height).max(1);
    format!("{}:{}", width / d, height / d)
}

// ---------------------------------------------------------------------------
// FailingGenerator
// ---------------------------------------------------------------------------

/// Generator whose every call fails with the configured kind.
#[derive(Debug)]
pub struct FailingGenerator {
    content_type: ContentType,
    kind: FailureKind,
    calls: AtomicUsize,
}

impl FailingGenerator {
    pub fn new(content_type: ContentType, kind: FailureKind) -> Self {
        Self {
            content_type,
            kind,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeneratorPort for FailingGenerator {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    async fn generate(&self, _request: &GenerationRequest) -> PortResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GenerationError::new(
            self.kind,
            format!("{} backend unavailable", self.content_type),
        ))
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Script {
    Fail(FailureKind),
    Respond(GeneratedContent),
    Delay(Duration),
}

/// Stub generator with per-slide overrides. Records every request it sees.
#[derive(Debug)]
pub struct ScriptedGenerator {
    content_type: ContentType,
    scripts: HashMap<String, Script>,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            scripts: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Fail requests for `slide_id` with `kind`.
    pub fn fail_for(mut self, slide_id: impl Into<String>, kind: FailureKind) -> Self {
        self.scripts.insert(slide_id.into(), Script::Fail(kind));
        self
    }

    /// Answer requests for `slide_id` with a fixed payload.
    pub fn respond_for(mut self, slide_id: impl Into<String>, content: GeneratedContent) -> Self {
        self.scripts.insert(slide_id.into(), Script::Respond(content));
        self
    }

    /// Delay requests for `slide_id`, then answer like the stub.
    pub fn delay_for(mut self, slide_id: impl Into<String>, delay: Duration) -> Self {
        self.scripts.insert(slide_id.into(), Script::Delay(delay));
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeneratorPort for ScriptedGenerator {
    fn content_type(&self) -> ContentType {
        self.content_type
    }

    async fn generate(&self, request: &GenerationRequest) -> PortResult {
        self.seen.lock().unwrap().push(request.clone());
        match self.scripts.get(&request.slide_id).cloned() {
            Some(Script::Fail(kind)) => Err(GenerationError::new(
                kind,
                format!("scripted failure for {}", request.slide_id),
            )),
            Some(Script::Respond(content)) => Ok(GenerationResult {
                content,
                metadata: ResultMetadata {
                    model: "scripted".to_string(),
                    source: "scripted".to_string(),
                    ..ResultMetadata::default()
                },
            }),
            Some(Script::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(stub_result(request))
            }
            None => Ok(stub_result(request)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PresentationContext, TextConstraints, TextRequest};

    fn text_request(words: u32, max_characters: Option<usize>, format: TextFormat) -> GenerationRequest {
        GenerationRequest {
            slide_id: "slide_001".to_string(),
            slide_number: 1,
            payload: RequestPayload::Text(TextRequest {
                topics: vec!["Quarterly revenue".to_string(), "Market share".to_string()],
                narrative: String::new(),
                slide_title: "Results".to_string(),
                context: PresentationContext::default(),
                table: None,
                constraints: TextConstraints {
                    word_count: words,
                    tone: "professional".to_string(),
                    format,
                    max_characters,
                },
            }),
        }
    }

    #[tokio::test]
    async fn test_stub_text_honours_word_count() {
        let stub = StubGenerator::new(ContentType::Text);
        let result = stub.generate(&text_request(40, None, TextFormat::Paragraph)).await.unwrap();
        let text = result.content.as_text().unwrap();
        assert_eq!(text.word_count, 40);
        assert!(!text.has_table());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_stub_text_honours_character_limit() {
        let stub = StubGenerator::new(ContentType::Text);
        let result = stub.generate(&text_request(150, Some(120), TextFormat::Bullets)).await.unwrap();
        let text = result.content.as_text().unwrap();
        assert!(text.content.chars().count() <= 120);
        assert!(text.word_count > 0);
    }

    #[tokio::test]
    async fn test_stub_table_format_produces_rows() {
        let stub = StubGenerator::new(ContentType::Text);
        let result = stub.generate(&text_request(20, None, TextFormat::Table)).await.unwrap();
        assert!(result.content.as_text().unwrap().has_table());
    }

    #[test]
    fn test_ratio_label_reduces() {
        assert_eq!(ratio_label(1600, 900), "16:9");
        assert_eq!(ratio_label(800, 400), "2:1");
        assert_eq!(ratio_label(1000, 1000), "1:1");
    }

    #[tokio::test]
    async fn test_failing_generator_reports_kind() {
        let failing = FailingGenerator::new(ContentType::Text, FailureKind::Transport);
        let err = failing
            .generate(&text_request(10, None, TextFormat::Paragraph))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Transport);
        assert_eq!(failing.calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_generator_overrides_per_slide() {
        let scripted = ScriptedGenerator::new(ContentType::Text)
            .fail_for("slide_001", FailureKind::UpstreamRejected);
        let err = scripted
            .generate(&text_request(10, None, TextFormat::Paragraph))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::UpstreamRejected);
        assert_eq!(scripted.requests().len(), 1);
    }

    #[test]
    fn test_stubbed_registry_covers_every_type() {
        assert!(GeneratorRegistry::stubbed().missing().is_empty());
    }
}

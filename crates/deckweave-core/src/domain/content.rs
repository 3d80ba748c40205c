//! Generation requests, backend payloads and per-request outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{FailureKind, GenerationError};
use super::outline::PresentationContext;

/// The closed set of content kinds a slide can be enriched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Chart,
    Image,
    Diagram,
}

impl ContentType {
    pub const ALL: [ContentType; 4] = [
        ContentType::Text,
        ContentType::Chart,
        ContentType::Image,
        ContentType::Diagram,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Chart => "chart",
            ContentType::Image => "image",
            ContentType::Diagram => "diagram",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed `Goal: .., Content: .., Style: ..` guidance. Missing parts are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guidance {
    pub goal: String,
    pub content: String,
    pub style: String,
}

impl Guidance {
    pub fn is_empty(&self) -> bool {
        self.goal.is_empty() && self.content.is_empty() && self.style.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Paragraph,
    Bullets,
    Table,
}

/// Length, tone and shape requested from the text backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextConstraints {
    pub word_count: u32,
    pub tone: String,
    pub format: TextFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_characters: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRequest {
    pub topics: Vec<String>,
    pub narrative: String,
    pub slide_title: String,
    pub context: PresentationContext,
    /// Parsed `tables_needed` guidance, when the slide asks for a table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Guidance>,
    pub constraints: TextConstraints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartRequest {
    pub guidance: Guidance,
    pub title: String,
    pub chart_type: ChartType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub theme: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub guidance: Guidance,
    pub aspect_ratio: String,
    pub width: u32,
    pub height: u32,
    pub context: PresentationContext,
    pub slide_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramType {
    Flowchart,
    Hierarchy,
    Process,
    Network,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramRequest {
    pub guidance: Guidance,
    pub diagram_type: DiagramType,
    pub theme: String,
    pub slide_title: String,
}

/// Type-specific request payload. The variant is the content-type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestPayload {
    Text(TextRequest),
    Chart(ChartRequest),
    Image(ImageRequest),
    Diagram(DiagramRequest),
}

/// One unit of work for a generator. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub slide_id: String,
    pub slide_number: u32,
    pub payload: RequestPayload,
}

impl GenerationRequest {
    pub fn content_type(&self) -> ContentType {
        match self.payload {
            RequestPayload::Text(_) => ContentType::Text,
            RequestPayload::Chart(_) => ContentType::Chart,
            RequestPayload::Image(_) => ContentType::Image,
            RequestPayload::Diagram(_) => ContentType::Diagram,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub content: String,
    pub word_count: u32,
    /// Rows of a generated table, header first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<Vec<String>>>,
}

impl GeneratedText {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let word_count = u32::try_from(content.split_whitespace().count()).unwrap_or(u32::MAX);
        Self {
            content,
            word_count,
            table: None,
        }
    }

    pub fn has_table(&self) -> bool {
        self.table.as_ref().is_some_and(|rows| !rows.is_empty())
    }

    /// Table body rows when a table is present, otherwise bullet items
    /// (`- `, `* `, `• ` lines or `<li>` elements) in the body.
    pub fn item_count(&self) -> usize {
        if let Some(rows) = self.table.as_ref().filter(|rows| !rows.is_empty()) {
            return rows.len() - 1;
        }
        let html_items = self.content.matches("<li").count();
        if html_items > 0 {
            return html_items;
        }
        self.content
            .lines()
            .map(str::trim_start)
            .filter(|line| {
                line.starts_with("- ") || line.starts_with("* ") || line.starts_with("• ")
            })
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedChart {
    pub chart_type: ChartType,
    pub url: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDiagram {
    pub diagram_type: DiagramType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Backend payload, tagged by content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneratedContent {
    Text(GeneratedText),
    Chart(GeneratedChart),
    Image(GeneratedImage),
    Diagram(GeneratedDiagram),
}

impl GeneratedContent {
    pub fn content_type(&self) -> ContentType {
        match self {
            GeneratedContent::Text(_) => ContentType::Text,
            GeneratedContent::Chart(_) => ContentType::Chart,
            GeneratedContent::Image(_) => ContentType::Image,
            GeneratedContent::Diagram(_) => ContentType::Diagram,
        }
    }

    pub fn as_text(&self) -> Option<&GeneratedText> {
        match self {
            GeneratedContent::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Aspect ratio of visual payloads, if the backend reported one.
    pub fn aspect_ratio(&self) -> Option<&str> {
        match self {
            GeneratedContent::Chart(c) => c.aspect_ratio.as_deref(),
            GeneratedContent::Image(i) => Some(i.aspect_ratio.as_str()),
            _ => None,
        }
    }
}

/// Provenance attached to every successful generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub elapsed_ms: u64,
    /// Model or method the backend used.
    pub model: String,
    /// Which backend produced the payload.
    pub source: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: GeneratedContent,
    pub metadata: ResultMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<GenerationError> for GenerationFailure {
    fn from(err: GenerationError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Success or failure of one dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success(GenerationResult),
    Failure(GenerationFailure),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        GenerationOutcome::Failure(GenerationFailure {
            kind,
            message: message.into(),
        })
    }
}

/// An outcome tagged with the request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchedOutcome {
    pub slide_id: String,
    pub content_type: ContentType,
    pub outcome: GenerationOutcome,
}

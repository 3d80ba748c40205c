//! Presentation outline: the immutable input to enrichment.

use serde::{Deserialize, Serialize};

/// A presentation outline with its ordered slides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationOutline {
    #[serde(alias = "main_title")]
    pub title: String,
    #[serde(default, alias = "overall_theme")]
    pub theme: String,
    #[serde(default, alias = "target_audience")]
    pub audience: String,
    /// Planned duration in minutes.
    #[serde(default, alias = "presentation_duration")]
    pub duration: u32,
    pub slides: Vec<SlideSpec>,
}

/// One slide of an outline, with optional free-text guidance per content kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideSpec {
    pub slide_id: String,
    pub slide_number: u32,
    #[serde(default)]
    pub slide_type: String,
    pub title: String,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_needed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visuals_needed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagrams_needed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables_needed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_preference: Option<String>,
    /// Explicit series for the chart backend, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<serde_json::Value>,
}

impl SlideSpec {
    /// Minimal slide with no guidance, mostly useful for tests and fixtures.
    pub fn new(slide_id: impl Into<String>, slide_number: u32, title: impl Into<String>) -> Self {
        Self {
            slide_id: slide_id.into(),
            slide_number,
            slide_type: String::new(),
            title: title.into(),
            narrative: String::new(),
            key_points: Vec::new(),
            analytics_needed: None,
            visuals_needed: None,
            diagrams_needed: None,
            tables_needed: None,
            structure_preference: None,
            chart_data: None,
        }
    }

    pub fn analytics(&self) -> Option<&str> {
        non_blank(&self.analytics_needed)
    }

    pub fn visuals(&self) -> Option<&str> {
        non_blank(&self.visuals_needed)
    }

    pub fn diagrams(&self) -> Option<&str> {
        non_blank(&self.diagrams_needed)
    }

    pub fn tables(&self) -> Option<&str> {
        non_blank(&self.tables_needed)
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

/// Presentation-level fields shared by every request built for the outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationContext {
    pub title: String,
    pub theme: String,
    pub audience: String,
}

impl From<&PresentationOutline> for PresentationContext {
    fn from(outline: &PresentationOutline) -> Self {
        Self {
            title: outline.title.clone(),
            theme: outline.theme.clone(),
            audience: outline.audience.clone(),
        }
    }
}

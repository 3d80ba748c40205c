//! Layout assignments and the specifications slides are validated against.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::content::ContentType;
use super::error::{EnrichError, Result};

/// Which layout a slide is rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutAssignment {
    pub slide_id: String,
    pub layout_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_name: Option<String>,
}

impl LayoutAssignment {
    pub fn new(slide_id: impl Into<String>, layout_id: impl Into<String>) -> Self {
        Self {
            slide_id: slide_id.into(),
            layout_id: layout_id.into(),
            layout_name: None,
        }
    }
}

/// Inclusive word-count band for generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRange {
    pub min: u32,
    pub max: u32,
}

impl WordRange {
    pub fn contains(&self, words: u32) -> bool {
        words >= self.min && words <= self.max
    }
}

/// A content slot on a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRegion {
    pub content_type: ContentType,
    #[serde(default = "default_required")]
    pub required: bool,
    /// The region renders a table, so text must carry tabular rows.
    #[serde(default)]
    pub table: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_range: Option<WordRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_characters: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    /// Most table rows or bullet items the region can show.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

fn default_required() -> bool {
    true
}

impl ContentRegion {
    pub fn required(content_type: ContentType) -> Self {
        Self {
            content_type,
            required: true,
            table: false,
            word_range: None,
            max_characters: None,
            aspect_ratio: None,
            max_items: None,
        }
    }

    pub fn optional(content_type: ContentType) -> Self {
        Self {
            required: false,
            ..Self::required(content_type)
        }
    }

    pub fn with_table(mut self) -> Self {
        self.table = true;
        self
    }

    pub fn with_word_range(mut self, min: u32, max: u32) -> Self {
        self.word_range = Some(WordRange { min, max });
        self
    }

    pub fn with_max_characters(mut self, limit: usize) -> Self {
        self.max_characters = Some(limit);
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
        self
    }

    pub fn with_max_items(mut self, limit: usize) -> Self {
        self.max_items = Some(limit);
        self
    }
}

/// Split a `W:H` ratio into its positive integer parts.
pub fn parse_aspect_ratio(ratio: &str) -> Option<(u32, u32)> {
    let (w, h) = ratio.split_once(':')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Content regions a layout declares, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSpecification {
    pub layout_id: String,
    #[serde(default)]
    pub name: String,
    pub regions: Vec<ContentRegion>,
}

impl LayoutSpecification {
    pub fn new(layout_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            layout_id: layout_id.into(),
            name: name.into(),
            regions: Vec::new(),
        }
    }

    pub fn with_region(mut self, region: ContentRegion) -> Self {
        self.regions.push(region);
        self
    }

    pub fn region(&self, content_type: ContentType) -> Option<&ContentRegion> {
        self.regions.iter().find(|r| r.content_type == content_type)
    }

    pub fn required_content_types(&self) -> Vec<ContentType> {
        self.regions
            .iter()
            .filter(|r| r.required)
            .map(|r| r.content_type)
            .collect()
    }

    /// Reject specifications the validator could not interpret deterministically.
    pub fn check_well_formed(&self) -> Result<()> {
        if self.layout_id.trim().is_empty() {
            return Err(EnrichError::MalformedLayoutSpecification {
                layout_id: self.layout_id.clone(),
                reason: "layout id is empty".to_string(),
            });
        }

        let mut seen = BTreeSet::new();
        for region in &self.regions {
            if !seen.insert(region.content_type) {
                return Err(EnrichError::MalformedLayoutSpecification {
                    layout_id: self.layout_id.clone(),
                    reason: format!("region {} declared twice", region.content_type),
                });
            }
            if region.table && region.content_type != ContentType::Text {
                return Err(EnrichError::MalformedLayoutSpecification {
                    layout_id: self.layout_id.clone(),
                    reason: format!("table constraint on non-text region {}", region.content_type),
                });
            }
            if let Some(ratio) = &region.aspect_ratio {
                if parse_aspect_ratio(ratio).is_none() {
                    return Err(EnrichError::MalformedLayoutSpecification {
                        layout_id: self.layout_id.clone(),
                        reason: format!(
                            "aspect ratio {ratio:?} on region {} is not a positive W:H pair",
                            region.content_type
                        ),
                    });
                }
            }
            if region.max_items == Some(0) {
                return Err(EnrichError::MalformedLayoutSpecification {
                    layout_id: self.layout_id.clone(),
                    reason: format!("region {} allows zero items", region.content_type),
                });
            }
            if let Some(range) = region.word_range {
                if range.min > range.max {
                    return Err(EnrichError::MalformedLayoutSpecification {
                        layout_id: self.layout_id.clone(),
                        reason: format!("word range {}..{} is inverted", range.min, range.max),
                    });
                }
            }
        }
        Ok(())
    }
}

//! Layout compliance checks for assembled slides.
//!
//! Regions are checked in declaration order. Within a region the order is
//! fixed: required presence, the table structure check, the word range, the
//! character and item limits, then aspect ratio. Limits warn when exceeded and
//! turn critical past `critical_overflow_factor` times the limit. A slide with
//! no layout specification is compliant.

use crate::config::SeverityPolicy;
use crate::domain::{
    ConstraintKind, ContentRegion, ContentType, EnrichedSlide, GeneratedContent,
    LayoutSpecification, Severity, ValidationStatus, Violation,
};

#[derive(Debug, Clone, Default)]
pub struct ComplianceValidator {
    policy: SeverityPolicy,
}

impl ComplianceValidator {
    pub fn new(policy: SeverityPolicy) -> Self {
        Self { policy }
    }

    pub fn validate(
        &self,
        slide: &EnrichedSlide,
        spec: Option<&LayoutSpecification>,
    ) -> ValidationStatus {
        let Some(spec) = spec else {
            return ValidationStatus::compliant();
        };

        let mut violations = Vec::new();
        for region in &spec.regions {
            self.check_region(slide, region, &mut violations);
        }
        ValidationStatus::from_violations(violations)
    }

    fn check_region(&self, slide: &EnrichedSlide, region: &ContentRegion, out: &mut Vec<Violation>) {
        let field = region.content_type;
        let Some(result) = slide.content(field) else {
            if region.required {
                out.push(violation(
                    field,
                    ConstraintKind::Required,
                    self.policy.missing_required,
                    format!("required {field} content is missing"),
                ));
            }
            return;
        };

        if let GeneratedContent::Text(text) = &result.content {
            if region.table && !text.has_table() {
                out.push(violation(
                    field,
                    ConstraintKind::Table,
                    Severity::Critical,
                    "layout declares a table region but the text has no tabular content".to_string(),
                ));
            }
            if let Some(range) = region.word_range {
                if !range.contains(text.word_count) {
                    out.push(violation(
                        field,
                        ConstraintKind::WordRange,
                        Severity::Warning,
                        format!(
                            "{} words, recommended {}-{}",
                            text.word_count, range.min, range.max
                        ),
                    ));
                }
            }
            if let Some(limit) = region.max_characters {
                let chars = text.content.chars().count();
                if chars > limit {
                    out.push(violation(
                        field,
                        ConstraintKind::CharacterLimit,
                        self.overflow_severity(chars, limit),
                        format!("{chars} characters exceeds the {limit} character limit"),
                    ));
                }
            }
            if let Some(limit) = region.max_items {
                let items = text.item_count();
                if items > limit {
                    out.push(violation(
                        field,
                        ConstraintKind::ItemLimit,
                        self.overflow_severity(items, limit),
                        format!("{items} items exceeds the {limit} item limit"),
                    ));
                }
            }
        }

        if let (Some(expected), Some(actual)) =
            (region.aspect_ratio.as_deref(), result.content.aspect_ratio())
        {
            if !same_ratio(expected, actual) {
                out.push(violation(
                    field,
                    ConstraintKind::AspectRatio,
                    Severity::Warning,
                    format!("aspect ratio {actual}, layout expects {expected}"),
                ));
            }
        }
    }

    fn overflow_severity(&self, actual: usize, limit: usize) -> Severity {
        if actual as f64 > limit as f64 * self.policy.critical_overflow_factor {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}

fn violation(
    field: ContentType,
    constraint: ConstraintKind,
    severity: Severity,
    description: String,
) -> Violation {
    Violation {
        field: field.to_string(),
        constraint,
        severity,
        description,
    }
}

/// Compare `W:H` ratios numerically, falling back to string equality.
fn same_ratio(a: &str, b: &str) -> bool {
    match (ratio_value(a), ratio_value(b)) {
        (Some(x), Some(y)) => (x - y).abs() < 0.01,
        _ => a.trim() == b.trim(),
    }
}

fn ratio_value(ratio: &str) -> Option<f64> {
    let (w, h) = ratio.split_once(':')?;
    let w: f64 = w.trim().parse().ok()?;
    let h: f64 = h.trim().parse().ok()?;
    (h > 0.0).then(|| w / h)
}

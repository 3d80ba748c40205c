//! Compliance verdict types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// The constraint family a violation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Required,
    Table,
    WordRange,
    CharacterLimit,
    ItemLimit,
    AspectRatio,
}

/// A single compliance deficiency on a slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Region (content type) the violation is about.
    pub field: String,
    pub constraint: ConstraintKind,
    pub severity: Severity,
    pub description: String,
}

impl Violation {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Per-slide verdict. `compliant` is false iff a critical violation exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub compliant: bool,
    pub violations: Vec<Violation>,
}

impl ValidationStatus {
    pub fn compliant() -> Self {
        Self {
            compliant: true,
            violations: Vec::new(),
        }
    }

    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            compliant: !violations.iter().any(Violation::is_critical),
            violations,
        }
    }

    pub fn critical_count(&self) -> usize {
        self.violations.iter().filter(|v| v.is_critical()).count()
    }
}

impl Default for ValidationStatus {
    fn default() -> Self {
        Self::compliant()
    }
}

/// Presentation-level roll-up, derived once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub overall_compliant: bool,
    pub total_slides: usize,
    pub compliant_slides: usize,
    pub total_violations: usize,
    pub critical_violations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(severity: Severity) -> Violation {
        Violation {
            field: "text".to_string(),
            constraint: ConstraintKind::WordRange,
            severity,
            description: "too long".to_string(),
        }
    }

    #[test]
    fn test_warnings_do_not_break_compliance() {
        let status = ValidationStatus::from_violations(vec![violation(Severity::Warning)]);
        assert!(status.compliant);
        assert_eq!(status.critical_count(), 0);
    }

    #[test]
    fn test_any_critical_breaks_compliance() {
        let status = ValidationStatus::from_violations(vec![
            violation(Severity::Warning),
            violation(Severity::Critical),
        ]);
        assert!(!status.compliant);
        assert_eq!(status.critical_count(), 1);
    }
}

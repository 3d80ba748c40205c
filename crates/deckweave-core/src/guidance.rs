//! Parser for `Goal: .., Content: .., Style: ..` guidance strings.
//!
//! Parsing is total: anything that is not recognisable yields empty fields.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::domain::Guidance;

static LABEL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn label_regex() -> Option<&'static Regex> {
    LABEL_PATTERN
        .get_or_init(|| Regex::new(r"(?i)\b(goal|content|style)\s*:").ok())
        .as_ref()
}

/// Parse free-text guidance into a [`Guidance`] triple.
///
/// Labels are matched case-insensitively. A value runs from its label to the
/// next recognised label (or the end of input), with surrounding whitespace
/// and separating commas trimmed. A repeated label overwrites the earlier one.
pub fn parse_guidance(text: Option<&str>) -> Guidance {
    let mut guidance = Guidance::default();
    let Some(text) = text else {
        return guidance;
    };
    let Some(re) = label_regex() else {
        return guidance;
    };

    let labels: Vec<(usize, usize, String)> = re
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?.as_str().to_ascii_lowercase();
            Some((whole.start(), whole.end(), label))
        })
        .collect();

    for (idx, (_, value_start, label)) in labels.iter().enumerate() {
        let value_end = labels
            .get(idx + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(text.len());
        let value = clean_value(&text[*value_start..value_end]);
        match label.as_str() {
            "goal" => guidance.goal = value,
            "content" => guidance.content = value,
            "style" => guidance.style = value,
            _ => {}
        }
    }

    debug!(goal = %guidance.goal, content = %guidance.content, style = %guidance.style, "parsed guidance");
    guidance
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// True when at least one of goal/content/style could be extracted.
pub fn has_valid_guidance(text: Option<&str>) -> bool {
    !parse_guidance(text).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_canonical_order() {
        let g = parse_guidance(Some(
            "Goal: Show trend, Content: Q3 revenue, Style: Line chart",
        ));
        assert_eq!(g.goal, "Show trend");
        assert_eq!(g.content, "Q3 revenue");
        assert_eq!(g.style, "Line chart");
    }

    #[test]
    fn test_parses_any_order_and_case() {
        let g = parse_guidance(Some(
            "style: minimal icons, GOAL: explain the funnel, content:  four stages ",
        ));
        assert_eq!(g.goal, "explain the funnel");
        assert_eq!(g.content, "four stages");
        assert_eq!(g.style, "minimal icons");
    }

    #[test]
    fn test_missing_labels_stay_empty() {
        let g = parse_guidance(Some("Content: customer segments"));
        assert_eq!(g.goal, "");
        assert_eq!(g.content, "customer segments");
        assert_eq!(g.style, "");
    }

    #[test]
    fn test_unlabelled_and_absent_input_is_empty() {
        assert!(parse_guidance(Some("just draw something nice")).is_empty());
        assert!(parse_guidance(Some("")).is_empty());
        assert!(parse_guidance(None).is_empty());
    }

    #[test]
    fn test_last_occurrence_wins() {
        let g = parse_guidance(Some("Goal: first, Style: bar, Goal: second"));
        assert_eq!(g.goal, "second");
        assert_eq!(g.style, "bar");
    }

    #[test]
    fn test_value_runs_until_next_label_including_commas() {
        let g = parse_guidance(Some("Content: revenue, cost, margin, Style: stacked bar"));
        assert_eq!(g.content, "revenue, cost, margin");
        assert_eq!(g.style, "stacked bar");
    }

    #[test]
    fn test_label_inside_word_is_not_a_label() {
        let g = parse_guidance(Some("Goal: compare subgoal: tracking"));
        assert_eq!(g.goal, "compare subgoal: tracking");
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let input = Some("Goal: Show trend, Content: Q3 revenue, Style: Line chart, Goal: again");
        assert_eq!(parse_guidance(input), parse_guidance(input));
    }

    #[test]
    fn test_has_valid_guidance() {
        assert!(has_valid_guidance(Some("Style: pie")));
        assert!(!has_valid_guidance(Some("pie chart please")));
        assert!(!has_valid_guidance(None));
    }
}

//! Built-in layout catalog and deterministic layout selection.

use std::collections::BTreeMap;

use crate::domain::{
    ContentRegion, ContentType, LayoutAssignment, LayoutSpecification, PresentationOutline,
    SlideSpec,
};

pub const TITLE_SLIDE: &str = "L01";
pub const BULLET_LIST: &str = "L05";
pub const IMAGE_WITH_TEXT: &str = "L10";
pub const CHART_WITH_INSIGHTS: &str = "L17";

/// The four standard layouts, keyed by layout id.
pub fn builtin_catalog() -> BTreeMap<String, LayoutSpecification> {
    [
        LayoutSpecification::new(TITLE_SLIDE, "Title slide")
            .with_region(ContentRegion::required(ContentType::Text)),
        LayoutSpecification::new(BULLET_LIST, "Bullet list")
            .with_region(
                ContentRegion::required(ContentType::Text)
                    .with_max_characters(480)
                    .with_max_items(8),
            ),
        LayoutSpecification::new(IMAGE_WITH_TEXT, "Image with text")
            .with_region(ContentRegion::required(ContentType::Image).with_aspect_ratio("16:9"))
            .with_region(ContentRegion::required(ContentType::Text).with_max_characters(300)),
        LayoutSpecification::new(CHART_WITH_INSIGHTS, "Chart with insights")
            .with_region(ContentRegion::required(ContentType::Chart))
            .with_region(
                ContentRegion::required(ContentType::Text)
                    .with_word_range(20, 200)
                    .with_max_items(6),
            ),
    ]
    .into_iter()
    .map(|spec| (spec.layout_id.clone(), spec))
    .collect()
}

/// Pick a layout for every slide from its type and guidance.
pub fn infer_assignments(outline: &PresentationOutline) -> Vec<LayoutAssignment> {
    let catalog = builtin_catalog();
    outline
        .slides
        .iter()
        .map(|slide| {
            let layout_id = infer_layout(slide);
            LayoutAssignment {
                slide_id: slide.slide_id.clone(),
                layout_id: layout_id.to_string(),
                layout_name: catalog.get(layout_id).map(|spec| spec.name.clone()),
            }
        })
        .collect()
}

fn infer_layout(slide: &SlideSpec) -> &'static str {
    match slide.slide_type.to_ascii_lowercase().as_str() {
        "title_slide" => TITLE_SLIDE,
        "data_driven" | "content_heavy" if slide.analytics().is_some() => CHART_WITH_INSIGHTS,
        "visual_heavy" if slide.visuals().is_some() => IMAGE_WITH_TEXT,
        _ => BULLET_LIST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(id: &str, slide_type: &str) -> SlideSpec {
        SlideSpec {
            slide_type: slide_type.to_string(),
            ..SlideSpec::new(id, 1, "t")
        }
    }

    #[test]
    fn test_catalog_is_well_formed() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.len(), 4);
        for (id, spec) in &catalog {
            assert_eq!(id, &spec.layout_id);
            spec.check_well_formed().unwrap();
        }
        assert_eq!(
            catalog[CHART_WITH_INSIGHTS].required_content_types(),
            vec![ContentType::Chart, ContentType::Text]
        );
    }

    #[test]
    fn test_inference_rules() {
        let mut data = slide("s2", "data_driven");
        data.analytics_needed = Some("Goal: trend".to_string());
        let mut visual = slide("s3", "visual_heavy");
        visual.visuals_needed = Some("Content: skyline".to_string());
        let outline = PresentationOutline {
            title: "Deck".to_string(),
            theme: String::new(),
            audience: String::new(),
            duration: 10,
            slides: vec![
                slide("s1", "title_slide"),
                data,
                visual,
                slide("s4", "data_driven"),
                slide("s5", "visual_heavy"),
            ],
        };

        let ids: Vec<_> = infer_assignments(&outline)
            .into_iter()
            .map(|a| a.layout_id)
            .collect();
        assert_eq!(ids, vec!["L01", "L17", "L10", "L05", "L05"]);
    }

    #[test]
    fn test_assignment_carries_layout_name() {
        let outline = PresentationOutline {
            title: "Deck".to_string(),
            theme: String::new(),
            audience: String::new(),
            duration: 5,
            slides: vec![slide("s1", "Title_Slide")],
        };
        let assignments = infer_assignments(&outline);
        assert_eq!(assignments[0].layout_name.as_deref(), Some("Title slide"));
    }
}

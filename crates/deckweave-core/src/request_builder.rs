//! Slide guidance → typed generation requests.
//!
//! Pure and deterministic: no request depends on another request's result.
//! Every slide gets one text request; chart, image and diagram requests are
//! added for each guidance field the slide fills in.

use tracing::debug;

use crate::config::TextDefaults;
use crate::domain::{
    parse_aspect_ratio, ChartRequest, ChartType, ContentType, DiagramRequest, DiagramType,
    GenerationRequest, Guidance, ImageRequest, LayoutSpecification, PresentationContext, RequestPayload, SlideSpec,
    TextConstraints, TextFormat, TextRequest,
};
use crate::guidance::parse_guidance;

const CHART_DEFAULT: (u32, u32) = (800, 400);
const IMAGE_DEFAULT: (u32, u32) = (1600, 900);
const IMAGE_DEFAULT_RATIO: &str = "16:9";

#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    text_defaults: TextDefaults,
}

impl RequestBuilder {
    pub fn new(text_defaults: TextDefaults) -> Self {
        Self { text_defaults }
    }

    /// Build every request a slide needs, with no layout hints.
    pub fn build(&self, slide: &SlideSpec, ctx: &PresentationContext) -> Vec<GenerationRequest> {
        self.build_for_layout(slide, ctx, None)
    }

    /// Build every request a slide needs, shaping sizes and text limits to
    /// the slide's layout when one is known.
    pub fn build_for_layout(
        &self,
        slide: &SlideSpec,
        ctx: &PresentationContext,
        layout: Option<&LayoutSpecification>,
    ) -> Vec<GenerationRequest> {
        let mut requests = vec![self.text_request(slide, ctx, layout)];

        if let Some(raw) = slide.analytics() {
            requests.push(chart_request(slide, ctx, layout, parse_guidance(Some(raw))));
        }
        if let Some(raw) = slide.visuals() {
            requests.push(image_request(slide, ctx, layout, parse_guidance(Some(raw))));
        }
        if let Some(raw) = slide.diagrams() {
            requests.push(diagram_request(slide, ctx, parse_guidance(Some(raw))));
        }

        debug!(
            slide_id = %slide.slide_id,
            requests = requests.len(),
            "built generation requests"
        );
        requests
    }

    fn text_request(
        &self,
        slide: &SlideSpec,
        ctx: &PresentationContext,
        layout: Option<&LayoutSpecification>,
    ) -> GenerationRequest {
        let region = layout.and_then(|l| l.region(ContentType::Text));
        let table = slide.tables().map(|raw| parse_guidance(Some(raw)));

        let format = if table.is_some() || region.is_some_and(|r| r.table) {
            TextFormat::Table
        } else if slide
            .structure_preference
            .as_deref()
            .is_some_and(|p| p.to_ascii_lowercase().contains("bullet"))
        {
            TextFormat::Bullets
        } else {
            self.text_defaults.format
        };

        let word_count = region
            .and_then(|r| r.word_range)
            .map(|range| self.text_defaults.word_count.clamp(range.min, range.max))
            .unwrap_or(self.text_defaults.word_count);

        let topics = if slide.key_points.is_empty() {
            vec![slide.title.clone()]
        } else {
            slide.key_points.clone()
        };

        GenerationRequest {
            slide_id: slide.slide_id.clone(),
            slide_number: slide.slide_number,
            payload: RequestPayload::Text(TextRequest {
                topics,
                narrative: slide.narrative.clone(),
                slide_title: slide.title.clone(),
                context: ctx.clone(),
                table,
                constraints: TextConstraints {
                    word_count,
                    tone: self.text_defaults.tone.clone(),
                    format,
                    max_characters: region.and_then(|r| r.max_characters),
                },
            }),
        }
    }
}

fn chart_request(
    slide: &SlideSpec,
    ctx: &PresentationContext,
    layout: Option<&LayoutSpecification>,
    guidance: Guidance,
) -> GenerationRequest {
    let ratio = layout
        .and_then(|l| l.region(ContentType::Chart))
        .and_then(|r| r.aspect_ratio.as_deref());
    let (width, height) = ratio
        .and_then(dimensions_for_ratio)
        .unwrap_or(CHART_DEFAULT);

    GenerationRequest {
        slide_id: slide.slide_id.clone(),
        slide_number: slide.slide_number,
        payload: RequestPayload::Chart(ChartRequest {
            chart_type: infer_chart_type(&guidance),
            guidance,
            title: slide.title.clone(),
            data: slide.chart_data.clone(),
            theme: ctx.theme.clone(),
            width,
            height,
        }),
    }
}

fn image_request(
    slide: &SlideSpec,
    ctx: &PresentationContext,
    layout: Option<&LayoutSpecification>,
    guidance: Guidance,
) -> GenerationRequest {
    let ratio = layout
        .and_then(|l| l.region(ContentType::Image))
        .and_then(|r| r.aspect_ratio.clone())
        .unwrap_or_else(|| IMAGE_DEFAULT_RATIO.to_string());
    let (width, height) = dimensions_for_ratio(&ratio).unwrap_or(IMAGE_DEFAULT);

    GenerationRequest {
        slide_id: slide.slide_id.clone(),
        slide_number: slide.slide_number,
        payload: RequestPayload::Image(ImageRequest {
            guidance,
            aspect_ratio: ratio,
            width,
            height,
            context: ctx.clone(),
            slide_title: slide.title.clone(),
        }),
    }
}

fn diagram_request(
    slide: &SlideSpec,
    ctx: &PresentationContext,
    guidance: Guidance,
) -> GenerationRequest {
    GenerationRequest {
        slide_id: slide.slide_id.clone(),
        slide_number: slide.slide_number,
        payload: RequestPayload::Diagram(DiagramRequest {
            diagram_type: infer_diagram_type(&guidance),
            guidance,
            theme: ctx.theme.clone(),
            slide_title: slide.title.clone(),
        }),
    }
}

/// Chart type from the style hint; bar when nothing matches.
pub fn infer_chart_type(guidance: &Guidance) -> ChartType {
    let style = guidance.style.to_ascii_lowercase();
    if style.contains("line") || style.contains("trend") {
        ChartType::Line
    } else if style.contains("pie") || style.contains("distribution") {
        ChartType::Pie
    } else if style.contains("scatter") {
        ChartType::Scatter
    } else {
        ChartType::Bar
    }
}

/// Diagram type from style and content hints; flowchart when nothing matches.
pub fn infer_diagram_type(guidance: &Guidance) -> DiagramType {
    let style = guidance.style.to_ascii_lowercase();
    let content = guidance.content.to_ascii_lowercase();
    if style.contains("hierarchy") || content.contains("org") {
        DiagramType::Hierarchy
    } else if style.contains("process") || content.contains("workflow") {
        DiagramType::Process
    } else if style.contains("network") || content.contains("connection") {
        DiagramType::Network
    } else {
        DiagramType::Flowchart
    }
}

/// Pixel size for a `W:H` ratio string, 1600 px wide. `None` when the ratio
/// is unparseable or the height would not be a usable `u32`.
fn dimensions_for_ratio(ratio: &str) -> Option<(u32, u32)> {
    let (w, h) = parse_aspect_ratio(ratio)?;
    let width = IMAGE_DEFAULT.0;
    let height = u64::from(width) * u64::from(h) / u64::from(w);
    match u32::try_from(height) {
        Ok(0) | Err(_) => None,
        Ok(height) => Some((width, height)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContentRegion;

    fn ctx() -> PresentationContext {
        PresentationContext {
            title: "Q3 Business Review".to_string(),
            theme: "Growth".to_string(),
            audience: "Board".to_string(),
        }
    }

    fn plain_slide() -> SlideSpec {
        let mut slide = SlideSpec::new("slide_001", 1, "Overview");
        slide.key_points = vec!["Revenue growth".to_string(), "Customer wins".to_string()];
        slide.narrative = "A strong quarter".to_string();
        slide
    }

    fn text_payload(req: &GenerationRequest) -> &TextRequest {
        match &req.payload {
            RequestPayload::Text(t) => t,
            other => panic!("expected text payload, got {other:?}"),
        }
    }

    #[test]
    fn test_slide_without_guidance_gets_only_text() {
        let requests = RequestBuilder::default().build(&plain_slide(), &ctx());
        assert_eq!(requests.len(), 1);
        let text = text_payload(&requests[0]);
        assert_eq!(text.topics.len(), 2);
        assert_eq!(text.context.audience, "Board");
        assert_eq!(text.constraints.word_count, 150);
        assert_eq!(text.constraints.tone, "professional");
        assert_eq!(text.constraints.format, TextFormat::Paragraph);
    }

    #[test]
    fn test_each_guidance_field_adds_one_request_in_fixed_order() {
        let mut slide = plain_slide();
        slide.diagrams_needed = Some("Goal: explain, Content: approval workflow".to_string());
        slide.analytics_needed = Some("Goal: Show trend, Content: Q3 revenue, Style: Line chart".to_string());
        slide.visuals_needed = Some("Style: photo".to_string());

        let requests = RequestBuilder::default().build(&slide, &ctx());
        let types: Vec<_> = requests.iter().map(|r| r.content_type()).collect();
        assert_eq!(
            types,
            vec![
                ContentType::Text,
                ContentType::Chart,
                ContentType::Image,
                ContentType::Diagram
            ]
        );
        assert!(requests.iter().all(|r| r.slide_id == "slide_001"));

        match &requests[1].payload {
            RequestPayload::Chart(chart) => {
                assert_eq!(chart.chart_type, ChartType::Line);
                assert_eq!(chart.guidance.content, "Q3 revenue");
                assert_eq!(chart.theme, "Growth");
                assert_eq!((chart.width, chart.height), (800, 400));
            }
            other => panic!("expected chart, got {other:?}"),
        }
        match &requests[3].payload {
            RequestPayload::Diagram(d) => assert_eq!(d.diagram_type, DiagramType::Process),
            other => panic!("expected diagram, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_guidance_is_ignored() {
        let mut slide = plain_slide();
        slide.analytics_needed = Some("   ".to_string());
        assert_eq!(RequestBuilder::default().build(&slide, &ctx()).len(), 1);
    }

    #[test]
    fn test_tables_guidance_shapes_the_text_request() {
        let mut slide = plain_slide();
        slide.tables_needed = Some("Content: quarterly revenue by region".to_string());
        let requests = RequestBuilder::default().build(&slide, &ctx());
        assert_eq!(requests.len(), 1);
        let text = text_payload(&requests[0]);
        assert_eq!(text.constraints.format, TextFormat::Table);
        assert_eq!(
            text.table.as_ref().map(|g| g.content.as_str()),
            Some("quarterly revenue by region")
        );
    }

    #[test]
    fn test_custom_text_defaults_are_used() {
        let builder = RequestBuilder::new(TextDefaults {
            word_count: 60,
            tone: "casual".to_string(),
            format: TextFormat::Bullets,
        });
        let requests = builder.build(&plain_slide(), &ctx());
        let text = text_payload(&requests[0]);
        assert_eq!(text.constraints.word_count, 60);
        assert_eq!(text.constraints.tone, "casual");
        assert_eq!(text.constraints.format, TextFormat::Bullets);
    }

    #[test]
    fn test_layout_hints_shape_sizes_and_limits() {
        let layout = LayoutSpecification::new("L10", "Image + Text")
            .with_region(ContentRegion::required(ContentType::Image).with_aspect_ratio("4:3"))
            .with_region(
                ContentRegion::required(ContentType::Text)
                    .with_max_characters(300)
                    .with_word_range(20, 50),
            );
        let mut slide = plain_slide();
        slide.visuals_needed = Some("Goal: inspire".to_string());

        let requests = RequestBuilder::default().build_for_layout(&slide, &ctx(), Some(&layout));
        let text = text_payload(&requests[0]);
        assert_eq!(text.constraints.max_characters, Some(300));
        assert_eq!(text.constraints.word_count, 50);

        match &requests[1].payload {
            RequestPayload::Image(img) => {
                assert_eq!(img.aspect_ratio, "4:3");
                assert_eq!((img.width, img.height), (1600, 1200));
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn test_extreme_ratios_fall_back_to_default_size() {
        assert_eq!(dimensions_for_ratio("16:9"), Some((1600, 900)));
        assert_eq!(dimensions_for_ratio("1:3000000"), None);
        assert_eq!(dimensions_for_ratio("3000000:1"), None);
        assert_eq!(dimensions_for_ratio("4294967295:4294967295"), Some((1600, 1600)));

        let layout = LayoutSpecification::new("TALL", "Tall image")
            .with_region(ContentRegion::required(ContentType::Image).with_aspect_ratio("1:3000000"));
        let mut slide = plain_slide();
        slide.visuals_needed = Some("Content: skyline".to_string());

        let requests = RequestBuilder::default().build_for_layout(&slide, &ctx(), Some(&layout));
        match &requests[1].payload {
            RequestPayload::Image(img) => assert_eq!((img.width, img.height), IMAGE_DEFAULT),
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn test_slide_without_key_points_uses_title_as_topic() {
        let slide = SlideSpec::new("s9", 9, "Closing thoughts");
        let requests = RequestBuilder::default().build(&slide, &ctx());
        assert_eq!(text_payload(&requests[0]).topics, vec!["Closing thoughts".to_string()]);
    }

    #[test]
    fn test_chart_and_diagram_inference() {
        let g = |style: &str, content: &str| Guidance {
            goal: String::new(),
            content: content.to_string(),
            style: style.to_string(),
        };
        assert_eq!(infer_chart_type(&g("Pie of market share", "")), ChartType::Pie);
        assert_eq!(infer_chart_type(&g("scatter plot", "")), ChartType::Scatter);
        assert_eq!(infer_chart_type(&g("", "")), ChartType::Bar);
        assert_eq!(infer_diagram_type(&g("", "org chart")), DiagramType::Hierarchy);
        assert_eq!(infer_diagram_type(&g("network map", "")), DiagramType::Network);
        assert_eq!(infer_diagram_type(&g("", "")), DiagramType::Flowchart);
    }
}

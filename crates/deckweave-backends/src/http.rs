//! JSON-over-HTTP generation client.
//!
//! One client type serves all four content types. A service either answers
//! the POST with the finished payload, or with a `job_id` that is polled at
//! the status endpoint until it reports `completed` or `failed`.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use deckweave_core::{
    ContentType, FailureKind, GeneratedContent, GenerationError, GenerationRequest,
    GenerationResult, GeneratorPort, PortResult, RequestPayload,
};
use deckweave_core::domain::{
    ChartType, GeneratedChart, GeneratedDiagram, GeneratedImage, GeneratedText, ResultMetadata,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::HttpGeneratorConfig;
use crate::error::{classify, BackendError, Result};

/// Longest upstream error body kept in a failure message.
const MAX_ERROR_BODY: usize = 300;

pub struct HttpGenerator {
    config: HttpGeneratorConfig,
    client: reqwest::Client,
}

impl HttpGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Result<Self> {
        if reqwest::Url::parse(&config.submit_url()).is_err() {
            return Err(BackendError::InvalidUrl {
                content_type: config.content_type.to_string(),
                url: config.base_url.clone(),
            });
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("deckweave-backends/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        info!(
            content_type = %config.content_type,
            url = %config.base_url,
            timeout_ms = config.timeout.as_millis() as u64,
            "HTTP generator initialized"
        );
        Ok(Self { config, client })
    }

    pub fn from_env(content_type: ContentType) -> Result<Self> {
        Self::new(HttpGeneratorConfig::from_env(content_type))
    }

    pub fn config(&self) -> &HttpGeneratorConfig {
        &self.config
    }

    async fn poll_job(&self, job_id: &str) -> std::result::Result<Value, GenerationError> {
        let url = self.config.status_url(job_id);
        for attempt in 1..=self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;

            let response = self.client.get(&url).send().await.map_err(classify)?;
            let status = read_json(response).await?;
            match status.get("status").and_then(Value::as_str) {
                Some("completed") => {
                    debug!(job_id = %job_id, attempt = attempt, "job completed");
                    return Ok(status);
                }
                Some("failed") => {
                    let error = status
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error");
                    return Err(GenerationError::new(
                        FailureKind::UpstreamRejected,
                        format!("job {job_id} failed: {error}"),
                    ));
                }
                Some("pending") | Some("processing") => {
                    debug!(job_id = %job_id, attempt = attempt, max = self.config.max_polls, "job still running");
                }
                other => {
                    warn!(job_id = %job_id, status = ?other, "unknown job status");
                }
            }
        }
        Err(GenerationError::timeout(format!(
            "job {job_id} not finished after {} polls",
            self.config.max_polls
        )))
    }
}

#[async_trait]
impl GeneratorPort for HttpGenerator {
    fn content_type(&self) -> ContentType {
        self.config.content_type
    }

    async fn generate(&self, request: &GenerationRequest) -> PortResult {
        if request.content_type() != self.config.content_type {
            return Err(GenerationError::new(
                FailureKind::Internal,
                format!(
                    "{} generator received a {} request",
                    self.config.content_type,
                    request.content_type()
                ),
            ));
        }

        let started = Instant::now();
        let response = self
            .client
            .post(self.config.submit_url())
            .json(&service_body(request))
            .send()
            .await
            .map_err(classify)?;
        let mut body = read_json(response).await?;

        if let Some(job_id) = body.get("job_id").and_then(Value::as_str).map(str::to_string) {
            debug!(slide_id = %request.slide_id, job_id = %job_id, "job submitted");
            body = self.poll_job(&job_id).await?;
        }

        let mut result = parse_generation_result(request, &body)?;
        result.metadata.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }
}

/// Decode a JSON body, turning non-2xx statuses into upstream rejections.
async fn read_json(response: reqwest::Response) -> std::result::Result<Value, GenerationError> {
    let status = response.status();
    if !status.is_success() {
        let mut text = response.text().await.unwrap_or_default();
        if text.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        return Err(GenerationError::rejected(status.as_u16(), text));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| GenerationError::malformed(e.to_string()))
}

/// The JSON posted to a service: the payload fields plus slide identity.
pub fn service_body(request: &GenerationRequest) -> Value {
    let mut body = serde_json::to_value(&request.payload).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut body {
        map.remove("type");
        map.insert("slide_id".to_string(), json!(request.slide_id));
        map.insert("slide_number".to_string(), json!(request.slide_number));
        let guidance = match &request.payload {
            RequestPayload::Chart(c) => Some(&c.guidance),
            RequestPayload::Image(i) => Some(&i.guidance),
            RequestPayload::Diagram(d) => Some(&d.guidance),
            RequestPayload::Text(_) => None,
        };
        if let Some(g) = guidance {
            map.insert("goal".to_string(), json!(g.goal));
            map.insert("content".to_string(), json!(g.content));
            map.insert("style".to_string(), json!(g.style));
        }
    }
    body
}

/// Map a finished service response onto the typed payload for `request`.
///
/// Pure: no IO, so every response shape can be tested without a server.
pub fn parse_generation_result(
    request: &GenerationRequest,
    body: &Value,
) -> std::result::Result<GenerationResult, GenerationError> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let error = str_at(body, &["error"]).unwrap_or("service reported failure");
        return Err(GenerationError::new(FailureKind::UpstreamRejected, error.to_string()));
    }

    let meta = body.get("metadata").cloned().unwrap_or(Value::Null);
    let mut extra = BTreeMap::new();
    for key in ["session_id", "image_id", "theme"] {
        if let Some(v) = body.get(key).filter(|v| !v.is_null()) {
            extra.insert(key.to_string(), v.clone());
        }
    }
    for key in ["generated_at", "data_points"] {
        if let Some(v) = meta.get(key).filter(|v| !v.is_null()) {
            extra.insert(key.to_string(), v.clone());
        }
    }

    let (content, source, model) = match &request.payload {
        RequestPayload::Text(_) => {
            let text = str_at(body, &["content"])
                .ok_or_else(|| GenerationError::malformed("text response has no content"))?;
            let mut generated = GeneratedText::new(text);
            if let Some(words) = meta.get("word_count").and_then(Value::as_u64) {
                generated.word_count = u32::try_from(words).unwrap_or(u32::MAX);
            }
            generated.table = body
                .get("table")
                .cloned()
                .and_then(|t| serde_json::from_value::<Vec<Vec<String>>>(t).ok());
            (
                GeneratedContent::Text(generated),
                "text_service",
                str_at(&meta, &["model_used"]),
            )
        }
        RequestPayload::Chart(chart) => {
            let url = str_at(body, &["chart_url"])
                .ok_or_else(|| GenerationError::malformed("chart response has no chart_url"))?;
            let chart_type = body
                .get("chart_type")
                .cloned()
                .and_then(|t| serde_json::from_value::<ChartType>(t).ok())
                .unwrap_or(chart.chart_type);
            (
                GeneratedContent::Chart(GeneratedChart {
                    chart_type,
                    url: url.to_string(),
                    data: body.get("chart_data").cloned().unwrap_or(Value::Null),
                    aspect_ratio: str_at(body, &["aspect_ratio"]).map(str::to_string),
                }),
                "analytics_service",
                None,
            )
        }
        RequestPayload::Image(image) => {
            let url = body
                .get("urls")
                .and_then(|urls| str_at(urls, &["cropped", "original"]))
                .or_else(|| str_at(body, &["url", "image_url"]))
                .ok_or_else(|| GenerationError::malformed("image response has no url"))?;
            let caption = [&image.guidance.goal, &image.guidance.content]
                .into_iter()
                .find(|s| !s.is_empty())
                .cloned();
            (
                GeneratedContent::Image(GeneratedImage {
                    url: url.to_string(),
                    caption,
                    aspect_ratio: str_at(&meta, &["target_aspect_ratio"])
                        .unwrap_or(image.aspect_ratio.as_str())
                        .to_string(),
                }),
                "image_service",
                str_at(&meta, &["model"]),
            )
        }
        RequestPayload::Diagram(diagram) => {
            let url = str_at(body, &["diagram_url"])
                .ok_or_else(|| GenerationError::malformed("diagram response has no diagram_url"))?;
            (
                GeneratedContent::Diagram(GeneratedDiagram {
                    diagram_type: diagram.diagram_type,
                    url: url.to_string(),
                    data: body.get("diagram_data").cloned().filter(|v| !v.is_null()),
                }),
                "diagram_service",
                None,
            )
        }
    };

    Ok(GenerationResult {
        content,
        metadata: ResultMetadata {
            elapsed_ms: meta
                .get("generation_time_ms")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            model: model.unwrap_or("unknown").to_string(),
            source: source.to_string(),
            extra,
        },
    })
}

/// First non-empty string among `keys` in `value`.
fn str_at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

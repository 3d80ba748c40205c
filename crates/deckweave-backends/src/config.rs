//! Per-service endpoint configuration.

use std::time::Duration;

use deckweave_core::ContentType;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Where and how to reach one generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpGeneratorConfig {
    pub content_type: ContentType,
    /// Service root, without a trailing slash.
    pub base_url: String,
    /// Path the request is POSTed to.
    pub submit_path: String,
    /// Job status path; `{job_id}` is substituted.
    pub status_path: String,
    /// Overall time budget, also the per-call HTTP timeout.
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl HttpGeneratorConfig {
    /// Built-in defaults for a content type, pointing at a local service.
    pub fn defaults_for(content_type: ContentType) -> Self {
        let (port, submit_path, timeout_secs) = match content_type {
            ContentType::Text => (8001, "/api/v1/generate/text", 30),
            ContentType::Chart => (8002, "/generate", 60),
            ContentType::Image => (8003, "/api/v2/generate", 20),
            ContentType::Diagram => (8004, "/generate", 60),
        };
        let mut config = Self {
            content_type,
            base_url: format!("http://localhost:{port}"),
            submit_path: submit_path.to_string(),
            status_path: "/status/{job_id}".to_string(),
            timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_secs(2),
            max_polls: 0,
        };
        config.max_polls = config.derived_max_polls();
        config
    }

    /// Defaults overlaid with `<TYPE>_SERVICE_URL`, `<TYPE>_SERVICE_TIMEOUT`
    /// (seconds) and `<TYPE>_POLL_INTERVAL` (seconds).
    pub fn from_env(content_type: ContentType) -> Self {
        Self::defaults_for(content_type).with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = self.content_type.as_str().to_ascii_uppercase();

        if let Some(url) = lookup(&format!("{prefix}_SERVICE_URL")).filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(secs) = seconds(&lookup, &format!("{prefix}_SERVICE_TIMEOUT")) {
            self.timeout = secs;
        }
        if let Some(secs) = seconds(&lookup, &format!("{prefix}_POLL_INTERVAL")) {
            self.poll_interval = secs;
        }
        self.max_polls = self.derived_max_polls();
        self
    }

    pub fn submit_url(&self) -> String {
        format!("{}{}", self.base_url, self.submit_path)
    }

    pub fn status_url(&self, job_id: &str) -> String {
        format!("{}{}", self.base_url, self.status_path.replace("{job_id}", job_id))
    }

    fn derived_max_polls(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        u32::try_from(self.timeout.as_millis() / interval)
            .unwrap_or(u32::MAX)
            .max(1)
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => {
            warn!(key = key, value = %raw, "ignoring invalid service setting");
            None
        }
        Ok(secs) => Some(Duration::from_secs(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_per_content_type() {
        let text = HttpGeneratorConfig::defaults_for(ContentType::Text);
        assert_eq!(text.submit_url(), "http://localhost:8001/api/v1/generate/text");
        assert_eq!(text.timeout, Duration::from_secs(30));

        let chart = HttpGeneratorConfig::defaults_for(ContentType::Chart);
        assert_eq!(chart.status_url("job-7"), "http://localhost:8002/status/job-7");
        assert_eq!(chart.max_polls, 30);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DIAGRAM_SERVICE_URL", "https://diagrams.example.com/"),
            ("DIAGRAM_SERVICE_TIMEOUT", "10"),
            ("DIAGRAM_POLL_INTERVAL", "5"),
            ("CHART_SERVICE_URL", "https://charts.example.com"),
        ]
        .into_iter()
        .collect();

        let config = HttpGeneratorConfig::defaults_for(ContentType::Diagram)
            .with_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.base_url, "https://diagrams.example.com");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_polls, 2);
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let config = HttpGeneratorConfig::defaults_for(ContentType::Image).with_env_overrides(|k| {
            match k {
                "IMAGE_SERVICE_TIMEOUT" => Some("soon".to_string()),
                "IMAGE_POLL_INTERVAL" => Some("0".to_string()),
                _ => None,
            }
        });
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }
}

//! Runtime configuration for enrichment runs.
//!
//! Every knob has a default; [`EnrichConfig::from_env`] overlays `DECKWEAVE_*`
//! environment variables and [`EnrichConfig::from_json_file`] loads a file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{Severity, TextFormat};

/// Errors loading configuration from disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Retry policy for failed generator calls.
///
/// Defaults to no retries: a failed call becomes a failure outcome at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum in-flight generator calls; `None` means unbounded.
    pub max_concurrency: Option<usize>,
    /// Per-call time budget; `None` leaves timing to the generator.
    pub request_timeout_ms: Option<u64>,
    pub retry: RetryPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            request_timeout_ms: Some(60_000),
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatchConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Text constraints applied when the caller supplies none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    pub word_count: u32,
    pub tone: String,
    pub format: TextFormat,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            word_count: 150,
            tone: "professional".to_string(),
            format: TextFormat::Paragraph,
        }
    }
}

/// How hard the validator comes down on each class of problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityPolicy {
    /// Severity of a required region with no content.
    pub missing_required: Severity,
    /// Text longer than `factor × max_characters` is critical; longer than
    /// the limit alone is a warning.
    pub critical_overflow_factor: f64,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            missing_required: Severity::Critical,
            critical_overflow_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub dispatch: DispatchConfig,
    pub text: TextDefaults,
    pub severity: SeverityPolicy,
    /// Layout id recorded for slides without an assignment.
    pub default_layout_id: String,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            text: TextDefaults::default(),
            severity: SeverityPolicy::default(),
            default_layout_id: "default".to_string(),
        }
    }
}

impl EnrichConfig {
    /// Defaults overlaid with `DECKWEAVE_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Load a JSON config file. Missing sections fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply overrides from a key lookup. Unparseable values are skipped.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = parse_var::<usize>(&lookup, "DECKWEAVE_MAX_CONCURRENCY") {
            self.dispatch.max_concurrency = (n > 0).then_some(n);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "DECKWEAVE_REQUEST_TIMEOUT_MS") {
            self.dispatch.request_timeout_ms = (ms > 0).then_some(ms);
        }
        if let Some(n) = parse_var::<u32>(&lookup, "DECKWEAVE_MAX_RETRIES") {
            self.dispatch.retry.max_retries = n;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "DECKWEAVE_BACKOFF_BASE_MS") {
            self.dispatch.retry.backoff_base_ms = ms;
        }
        if let Some(words) = parse_var::<u32>(&lookup, "DECKWEAVE_TEXT_WORD_COUNT") {
            self.text.word_count = words;
        }
        if let Some(tone) = lookup("DECKWEAVE_TEXT_TONE").filter(|t| !t.trim().is_empty()) {
            self.text.tone = tone;
        }
        self
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key = key, value = %raw, "ignoring unparseable config override");
            None
        }
    }
}

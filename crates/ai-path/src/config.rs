//! Path configuration loading.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{default_should_retry, PathOptions, RetryConfig, DEFAULT_REACHED_DISTANCE};

/// Agent options, retry policy and follow tolerance, usually loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Agent constraints for the search service
    pub options: PathOptions,

    /// Automatic recovery policy
    pub retry: RetrySettings,

    /// Distance at which a waypoint counts as reached
    #[serde(default = "default_reached_distance")]
    pub reached_distance: f32,
}

/// Serializable part of [`RetryConfig`]; the retry predicate is always the default one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,

    /// Base delay between attempts, in seconds
    pub retry_delay_secs: f64,

    /// Double the delay on every attempt
    pub exponential_backoff: bool,
}

fn default_reached_distance() -> f32 {
    DEFAULT_REACHED_DISTANCE
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            options: PathOptions::default(),
            retry: RetrySettings::default(),
            reached_distance: default_reached_distance(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: RetryConfig::DEFAULT_MAX_RETRIES,
            retry_delay_secs: RetryConfig::DEFAULT_RETRY_DELAY.as_secs_f64(),
            exponential_backoff: true,
        }
    }
}

impl From<RetrySettings> for RetryConfig {
    fn from(settings: RetrySettings) -> Self {
        // Negative and NaN delays clamp to zero; unrepresentable ones fall back to the default.
        let retry_delay = Duration::try_from_secs_f64(settings.retry_delay_secs.max(0.0))
            .unwrap_or(RetryConfig::DEFAULT_RETRY_DELAY);
        Self {
            max_retries: settings.max_retries,
            retry_delay,
            use_exponential_backoff: settings.exponential_backoff,
            should_retry: Arc::new(default_should_retry),
        }
    }
}

impl PathConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read path config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse path config from {}", path.display()))?;
        Ok(config.sanitized())
    }

    /// Load from `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Options with out-of-range values replaced by their defaults.
    pub fn sanitized(mut self) -> Self {
        self.options = self.options.sanitized();
        if !(self.reached_distance.is_finite() && self.reached_distance > 0.0) {
            self.reached_distance = default_reached_distance();
        }
        self
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().into()
    }
}

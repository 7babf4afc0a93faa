use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Key arithmetic
    pub radix: u32,                        // Digit base of every SortKey
    pub initial_key_length: usize,         // Digits of a freshly minted key
    pub saturation_growth_step: usize,     // Digits appended per saturation event
    pub case_insensitive: bool,

    // Rebuild policy
    pub rebuild_count_floor: usize,        // Collections smaller than this always rebuild
    pub rebuild_fraction_threshold: f64,   // Unkeyed fraction that forces a rebuild
    pub collision_retry_limit: usize,

    // Scheduler
    pub consumer_concurrency: usize,
    pub group_visibility_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub key_prefix: String,

    pub quiet: bool,                       // Suppress timing diagnostics
}

impl Default for Config {
    fn default() -> Self {
        Config {
            radix: 1 << 16,
            initial_key_length: 8,
            saturation_growth_step: 2,
            case_insensitive: false,

            rebuild_count_floor: 100,
            rebuild_fraction_threshold: 0.5,
            collision_retry_limit: 3,

            consumer_concurrency: 1,
            group_visibility_timeout_ms: 60_000,
            poll_interval_ms: 100,
            key_prefix: "sortfield".to_string(),

            quiet: false,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=1 << 16).contains(&self.radix) {
            return Err(config_error(format!("radix must be within 2..=65536, got {}", self.radix)));
        }
        if self.initial_key_length == 0 {
            return Err(config_error("initial_key_length must be at least 1"));
        }
        if self.saturation_growth_step == 0 {
            return Err(config_error("saturation_growth_step must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.rebuild_fraction_threshold) {
            return Err(config_error(format!(
                "rebuild_fraction_threshold must be within 0..=1, got {}",
                self.rebuild_fraction_threshold
            )));
        }
        if self.consumer_concurrency == 0 {
            return Err(config_error("consumer_concurrency must be at least 1"));
        }
        if self.group_visibility_timeout_ms == 0 || self.poll_interval_ms == 0 {
            return Err(config_error("visibility timeout and poll interval must be positive"));
        }
        Ok(())
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.group_visibility_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn config_error(context: impl Into<String>) -> Error {
    Error::new(ErrorKind::Config, context)
}

/// Per-field-group overrides, resolved against `Config` at registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupOptions {
    pub initial_key_length: Option<usize>,
    pub saturation_growth_step: Option<usize>,
    pub case_insensitive: Option<bool>,
}

impl GroupOptions {
    pub fn case_insensitive(mut self, value: bool) -> Self {
        self.case_insensitive = Some(value);
        self
    }

    pub fn initial_key_length(mut self, value: usize) -> Self {
        self.initial_key_length = Some(value);
        self
    }

    pub fn saturation_growth_step(mut self, value: usize) -> Self {
        self.saturation_growth_step = Some(value);
        self
    }
}

//! Host configuration.
//!
//! Loaded from YAML when a file is given, defaults otherwise, then
//! overridden by `INAI_*` environment variables.

use std::path::Path;
use std::time::Duration;

use inai_preview::ResizeClamp;
use serde::{Deserialize, Serialize};

use crate::error::{InaiError, InaiResult};

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub render: RenderConfig,
    pub store: StoreConfig,
    pub history: HistoryConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub debounce_ms: u64,
    pub resize_min: f64,
    pub resize_max: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 150,
            resize_min: 100.0,
            resize_max: 20_000.0,
        }
    }
}

impl RenderConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn resize_clamp(&self) -> ResizeClamp {
        ResizeClamp {
            min: self.resize_min,
            max: self.resize_max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub max_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Entries kept per page, the initial snapshot included.
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub line_prefix: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/chat".to_string(),
            timeout_secs: 120,
            line_prefix: "data: ".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl HostConfig {
    /// File (if any), then environment, then validation.
    pub fn load(path: Option<&Path>) -> InaiResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_yaml(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> InaiResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies `INAI_*` overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> InaiResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("INAI_DEBOUNCE_MS") {
            self.render.debounce_ms = parse_env("INAI_DEBOUNCE_MS", &v)?;
        }
        if let Some(v) = lookup("INAI_RESIZE_MIN") {
            self.render.resize_min = parse_env("INAI_RESIZE_MIN", &v)?;
        }
        if let Some(v) = lookup("INAI_RESIZE_MAX") {
            self.render.resize_max = parse_env("INAI_RESIZE_MAX", &v)?;
        }
        if let Some(v) = lookup("INAI_MAX_DEPTH") {
            self.store.max_depth = parse_env("INAI_MAX_DEPTH", &v)?;
        }
        if let Some(v) = lookup("INAI_HISTORY_MAX_ENTRIES") {
            self.history.max_entries = parse_env("INAI_HISTORY_MAX_ENTRIES", &v)?;
        }
        if let Some(v) = lookup("INAI_GENERATION_ENDPOINT") {
            self.generation.endpoint = v;
        }
        if let Some(v) = lookup("INAI_GENERATION_TIMEOUT_SECS") {
            self.generation.timeout_secs = parse_env("INAI_GENERATION_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("INAI_LINE_PREFIX") {
            self.generation.line_prefix = v;
        }
        if let Some(v) = lookup("INAI_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("INAI_LOG_JSON") {
            self.logging.json = parse_env("INAI_LOG_JSON", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> InaiResult<()> {
        let r = &self.render;
        if !(r.resize_min.is_finite() && r.resize_max.is_finite()) || r.resize_min < 0.0 {
            return Err(InaiError::Config(
                "render.resize_min/resize_max must be finite and non-negative".to_string(),
            ));
        }
        if r.resize_min > r.resize_max {
            return Err(InaiError::Config(format!(
                "render.resize_min ({}) is greater than render.resize_max ({})",
                r.resize_min, r.resize_max
            )));
        }
        if self.store.max_depth == 0 {
            return Err(InaiError::Config("store.max_depth must be at least 1".to_string()));
        }
        if self.history.max_entries < 2 {
            return Err(InaiError::Config(
                "history.max_entries must be at least 2".to_string(),
            ));
        }
        if self.generation.line_prefix.is_empty() {
            return Err(InaiError::Config(
                "generation.line_prefix must not be empty".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(InaiError::Config(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> InaiResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| InaiError::Config(format!("{}: cannot parse '{}'", key, value)))
}

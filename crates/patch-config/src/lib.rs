//! Patchwork configuration system
//!
//! Settings are read from `patchwork.toml` and can be overridden by
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "patchwork.toml";

/// Main configuration structure for Patchwork
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PatchworkConfig {
    /// Hosted model service settings
    pub api: ApiConfig,
    /// Job polling settings
    pub polling: PollingConfig,
    /// Canvas settings
    pub canvas: CanvasConfig,
}

/// Hosted model service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the prediction API, without trailing slash
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Model version identifier sent when creating jobs
    pub model_version: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Job polling configuration. Delays are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// Status queries before giving up with a timeout
    pub max_attempts: u32,
    /// Starting point for the backoff while a job is still starting
    pub initial_delay_ms: u64,
    /// Fixed delay while the job reports `processing`
    pub processing_delay_ms: u64,
    pub backoff_factor: f64,
    /// Ceiling for the regular backoff
    pub max_delay_ms: u64,
    /// Ceiling for the backoff after a failed status query
    pub error_max_delay_ms: u64,
}

/// Canvas configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CanvasConfig {
    /// Patch library selected for new canvases
    pub library: String,
    /// Where the command line front end keeps its canvas between runs
    pub path: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.replicate.com/v1".to_string(),
            token: None,
            model_version: None,
            timeout_secs: 30,
            user_agent: "Patchwork/0.1".to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 180,
            initial_delay_ms: 1000,
            processing_delay_ms: 2000,
            backoff_factor: 1.5,
            max_delay_ms: 5000,
            error_max_delay_ms: 10000,
        }
    }
}

impl PollingConfig {
    /// Reject settings that would make the poll loop spin or never back off
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(format!("polling.{msg}")))
        };
        if self.max_attempts == 0 {
            return invalid("max_attempts must be at least 1".to_string());
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return invalid(format!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            ));
        }
        for (name, value) in [
            ("initial_delay_ms", self.initial_delay_ms),
            ("processing_delay_ms", self.processing_delay_ms),
            ("max_delay_ms", self.max_delay_ms),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be greater than zero"));
            }
        }
        if self.error_max_delay_ms < self.max_delay_ms {
            return invalid(format!(
                "error_max_delay_ms ({}) must not be below max_delay_ms ({})",
                self.error_max_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            library: "default".to_string(),
            path: PathBuf::from("canvas.json"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl PatchworkConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but would break the poll loop
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.polling.validate()
    }

    /// Load configuration from `patchwork.toml` in the current directory, or
    /// return the defaults if it can't be read
    pub fn load_or_default() -> Self {
        Self::load_from_file(CONFIG_FILE).unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        if let Ok(base) = std::env::var("PATCHWORK_API_BASE") {
            self.api.base_url = base.trim_end_matches('/').to_string();
        }
        // Fall back to the service's conventional variable name.
        if let Ok(token) =
            std::env::var("PATCHWORK_API_TOKEN").or_else(|_| std::env::var("REPLICATE_API_TOKEN"))
        {
            if !token.is_empty() {
                self.api.token = Some(token);
            }
        }
        if let Ok(version) = std::env::var("PATCHWORK_MODEL_VERSION") {
            self.api.model_version = Some(version);
        }
        if let Ok(val) = std::env::var("PATCHWORK_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.api.timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("PATCHWORK_MAX_ATTEMPTS") {
            if let Ok(attempts) = val.parse::<u32>() {
                self.polling.max_attempts = attempts;
            }
        }

        if let Ok(library) = std::env::var("PATCHWORK_LIBRARY") {
            self.canvas.library = library;
        }
        if let Ok(path) = std::env::var("PATCHWORK_CANVAS") {
            self.canvas.path = PathBuf::from(path);
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from patchwork.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

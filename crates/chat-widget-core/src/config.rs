//! Widget configuration.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`WidgetConfig::base_url`].
pub const ENV_BASE_URL: &str = "CHAT_WIDGET_BASE_URL";
/// Environment variable overriding [`WidgetConfig::resume_session`].
pub const ENV_RESUME: &str = "CHAT_WIDGET_RESUME";

/// How overlapping requests are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InFlightPolicy {
    /// Overlapping requests are allowed; completions may interleave.
    #[default]
    Concurrent,
    /// New requests are ignored while one is pending.
    SingleFlight,
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for a chat widget session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Base URL of the dialogue service (`/start` and `/reply` hang off it).
    pub base_url: String,
    /// Read a persisted session token at startup and persist new ones.
    pub resume_session: bool,
    /// Key the session token is stored under.
    pub token_key: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum history depth; unbounded when absent.
    pub history_limit: Option<usize>,
    /// Overlapping request policy.
    pub in_flight: InFlightPolicy,
    /// Bot text shown on a transport failure.
    pub network_error_text: String,
    /// Bot text shown when a service failure carries no message.
    pub service_error_text: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5096/api/chat".to_string(),
            resume_session: false,
            token_key: "chatbot_session".to_string(),
            request_timeout_secs: 30,
            history_limit: None,
            in_flight: InFlightPolicy::Concurrent,
            network_error_text: "Network error.".to_string(),
            service_error_text: "Unknown error".to_string(),
        }
    }
}

impl WidgetConfig {
    /// Create a config pointing at `base_url`, everything else defaulted.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    /// Returns error if the document is not valid TOML for this schema.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Default config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chat-widget").join("config.toml"))
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(resume) = lookup(ENV_RESUME) {
            match resume.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.resume_session = true,
                "0" | "false" | "no" | "off" => self.resume_session = false,
                other => tracing::warn!("Ignoring invalid {ENV_RESUME} value: {other}"),
            }
        }
        self
    }

    /// Request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `/start` endpoint URL.
    #[must_use]
    pub fn start_url(&self) -> String {
        format!("{}/start", self.base_url.trim_end_matches('/'))
    }

    /// `/reply` endpoint URL (without query string).
    #[must_use]
    pub fn reply_url(&self) -> String {
        format!("{}/reply", self.base_url.trim_end_matches('/'))
    }
}

//! Client configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Command line flags are applied on top by the binary.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors raised while loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid config JSON.
    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration for talking to the inspector backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectorConfig {
    /// Backend base URL (e.g., `http://127.0.0.1:3000`).
    #[serde(default = "InspectorConfig::default_base_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds.
    #[serde(default = "InspectorConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout in seconds.
    #[serde(default = "InspectorConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Timeline poll cadence while an interaction runs, in milliseconds.
    #[serde(default = "InspectorConfig::default_poll_interval")]
    pub poll_interval_millis: u64,
}

impl InspectorConfig {
    fn default_base_url() -> String {
        "http://127.0.0.1:3000".to_string()
    }

    const fn default_request_timeout() -> u64 {
        // Interactions can run for a long time; the request covers all of it.
        300
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    const fn default_poll_interval() -> u64 {
        700
    }

    /// Load a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get the poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            poll_interval_millis: Self::default_poll_interval(),
        }
    }
}

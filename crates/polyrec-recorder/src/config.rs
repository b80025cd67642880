//! Application configuration.

use crate::error::{AppError, AppResult};
use polyrec_ws::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How the discovery document is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// GET the document from an HTTP endpoint.
    Http,
    /// Run an external fetch command that writes the document to a file.
    #[default]
    Command,
}

/// WebSocket session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Market channel URL.
    #[serde(default = "default_ws_url")]
    pub url: String,
    /// Bounded receive poll (ms).
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Silent-connection watchdog (ms).
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,
    /// Reconnect backoff base delay (ms).
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Reconnect backoff cap (ms).
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_ws_url() -> String {
    "wss://ws-subscriptions-clob.polymarket.com/ws/market".to_string()
}

fn default_poll_timeout_ms() -> u64 {
    1_000
}

fn default_stall_timeout_ms() -> u64 {
    60_000
}

fn default_backoff_base_ms() -> u64 {
    3_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: default_ws_url(),
            poll_timeout_ms: default_poll_timeout_ms(),
            stall_timeout_ms: default_stall_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Recording and persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Root directory of the partitioned output tree.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Seconds between buffer flushes. Default: 900 (15 minutes).
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_flush_interval_secs() -> u64 {
    900
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

/// Discovery collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub mode: DiscoveryMode,
    /// Document endpoint (http mode).
    #[serde(default)]
    pub url: Option<String>,
    /// Fetch command run through the shell (command mode).
    #[serde(default)]
    pub command: Option<String>,
    /// Path the fetch command writes the document to (command mode).
    #[serde(default)]
    pub output_path: Option<String>,
    /// Per-fetch timeout (seconds). The fetch command is killed past this.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Seconds between discovery cycles. Default: 900 (15 minutes).
    #[serde(default = "default_refresh_period_secs")]
    pub refresh_period_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_refresh_period_secs() -> u64 {
    900
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: DiscoveryMode::default(),
            url: None,
            command: None,
            output_path: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            refresh_period_secs: default_refresh_period_secs(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ws: WsConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl AppConfig {
    /// Load configuration from `POLYREC_CONFIG` or the default path, falling
    /// back to defaults when no file exists.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("POLYREC_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            url: self.ws.url.clone(),
            poll_timeout_ms: self.ws.poll_timeout_ms,
            stall_timeout_ms: self.ws.stall_timeout_ms,
            backoff_base_ms: self.ws.backoff_base_ms,
            backoff_max_ms: self.ws.backoff_max_ms,
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.recording.flush_interval_secs)
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.discovery.refresh_period_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.recording.flush_interval_secs, 900);
        assert_eq!(config.discovery.refresh_period_secs, 900);
        assert_eq!(config.discovery.fetch_timeout_secs, 30);
        assert_eq!(config.ws.stall_timeout_ms, 60_000);
        assert_eq!(config.discovery.mode, DiscoveryMode::Command);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [recording]
            data_dir = "/var/lib/polyrec"

            [discovery]
            mode = "http"
            url = "https://example.com/markets.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.recording.data_dir, "/var/lib/polyrec");
        assert_eq!(config.recording.flush_interval_secs, 900);
        assert_eq!(config.discovery.mode, DiscoveryMode::Http);
        assert_eq!(config.discovery.url.as_deref(), Some("https://example.com/markets.json"));
        assert_eq!(config.ws.url, default_ws_url());
    }

    #[test]
    fn test_session_config_mapping() {
        let mut config = AppConfig::default();
        config.ws.stall_timeout_ms = 5_000;

        let session = config.session_config();
        assert_eq!(session.stall_timeout_ms, 5_000);
        assert_eq!(session.url, config.ws.url);
    }
}

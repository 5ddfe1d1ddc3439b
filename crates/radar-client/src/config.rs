//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (RADAR_*)
//! - TOML configuration file
//! - Command line arguments (see `radar-watch --help`)

use crate::channel::ChannelConfig;
use crate::reconnect::{BackoffKind, ReconnectPolicy};
use anyhow::{Context, Result};
use radar_transport::{Endpoint, EndpointError, WebSocketConfig, DEFAULT_WEBSOCKET_PATH};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the REST API; the live endpoint shares its origin.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Path of the WebSocket endpoint on the API origin.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,

    /// Reconnection policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Activity feed settings.
    #[serde(default)]
    pub feed: FeedConfig,
}

/// Reconnection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before a retry in milliseconds.
    #[serde(default = "default_reconnect_interval")]
    pub interval_ms: u64,

    /// Retries before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// `flat` (default) or `exponential`.
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Upper bound for exponential backoff in milliseconds.
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
}

/// Connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Time allowed for one connect attempt in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Silence in milliseconds before the connection counts as lost.
    /// `0` disables the check.
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Activity feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Number of recent activities kept.
    #[serde(default = "default_feed_capacity")]
    pub capacity: usize,
}

// Default value functions
fn default_api_base_url() -> String {
    std::env::var("RADAR_API_BASE_URL").unwrap_or_else(|_| "http://localhost:3000/api".to_string())
}

fn default_ws_path() -> String {
    DEFAULT_WEBSOCKET_PATH.to_string()
}

fn default_reconnect_interval() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_interval() -> u64 {
    60_000
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_max_message_size() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_heartbeat_timeout() -> u64 {
    60_000 // 60 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_feed_capacity() -> usize {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            websocket_path: default_ws_path(),
            reconnect: ReconnectConfig::default(),
            connection: ConnectionConfig::default(),
            metrics: MetricsConfig::default(),
            feed: FeedConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_reconnect_interval(),
            max_attempts: default_max_attempts(),
            backoff: BackoffKind::Flat,
            max_interval_ms: default_max_interval(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            max_message_size: default_max_message_size(),
            heartbeat_timeout_ms: default_heartbeat_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: default_feed_capacity(),
        }
    }
}

impl ReconnectConfig {
    /// Build the policy described by this section.
    #[must_use]
    pub fn policy(&self) -> ReconnectPolicy {
        let interval = Duration::from_millis(self.interval_ms);
        match self.backoff {
            BackoffKind::Flat => ReconnectPolicy::flat(interval, self.max_attempts),
            BackoffKind::Exponential => ReconnectPolicy::exponential(
                interval,
                Duration::from_millis(self.max_interval_ms),
                self.max_attempts,
            ),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "radar.toml",
            "/etc/radar/radar.toml",
            "~/.config/radar/radar.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Live endpoint derived from the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not a usable http(s) URL.
    pub fn endpoint(&self) -> Result<Endpoint, EndpointError> {
        Endpoint::from_api_base(&self.api_base_url, &self.websocket_path)
    }

    /// Settings for the event channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be derived.
    pub fn channel_config(&self) -> Result<ChannelConfig, EndpointError> {
        Ok(ChannelConfig {
            endpoint: self.endpoint()?,
            reconnect: self.reconnect.policy(),
            connect_timeout: Duration::from_millis(self.connection.connect_timeout_ms),
            heartbeat_timeout: match self.connection.heartbeat_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        })
    }

    /// Settings for the WebSocket connector.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            max_message_size: self.connection.max_message_size,
        }
    }
}

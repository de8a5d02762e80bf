//! Configuration for the presence client.

use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;

use crate::error::Result;

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Gateway WebSocket connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Discord user id to subscribe to.
    pub subject_id: String,
    /// First reconnect waits `2 * base`, doubling up to the max.
    #[serde(default = "default_reconnect_base_delay")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_ms: u64,
    /// How long disconnect waits for the close handshake.
    #[serde(default = "default_close_timeout")]
    pub close_timeout_ms: u64,
}

impl GatewayConfig {
    /// Config for `subject_id` against the public gateway, with default timings.
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            ws_url: default_ws_url(),
            subject_id: subject_id.into(),
            reconnect_base_delay_ms: default_reconnect_base_delay(),
            reconnect_max_delay_ms: default_reconnect_max_delay(),
            close_timeout_ms: default_close_timeout(),
        }
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

/// How the watcher renders presence.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Skip the Listening activity when the Spotify block already shows it.
    #[serde(default = "default_true")]
    pub hide_spotify_activity: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            hide_spotify_activity: default_true(),
        }
    }
}

// Default values
fn default_ws_url() -> String {
    "wss://api.lanyard.rest/socket".to_string()
}
fn default_reconnect_base_delay() -> u64 {
    1000
}
fn default_reconnect_max_delay() -> u64 {
    30_000
}
fn default_close_timeout() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (LANYARD__SECTION__KEY format)
    /// 2. lanyard.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self> {
        Self::build(File::with_name("lanyard").required(false))
    }

    /// Load configuration from an explicit file, still honoring environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(File::from(path.as_ref()).required(true))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = ConfigLoader::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("LANYARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

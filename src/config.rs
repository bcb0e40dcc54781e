//! Client configuration
//!
//! Loaded from JSON (file or string) or built in code, with optional
//! environment overrides for the server URL and game UUID.

use crate::error::{Result, SessionError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `server_url`
pub const ENV_SERVER_URL: &str = "PLAYMANITY_SERVER_URL";
/// Environment variable overriding `game_uuid`
pub const ENV_GAME_UUID: &str = "PLAYMANITY_GAME_UUID";

const MIN_AD_TICK_MILLIS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the Playmanity API
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Game identifier issued by Playmanity
    #[serde(default)]
    pub game_uuid: String,

    /// Deadline for every request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Fixed wait between session initiation attempts
    #[serde(default = "default_init_retry")]
    pub init_retry_secs: u64,

    /// Wait between heartbeats
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Delay before re-initiating after NO_ACTIVE_SESSION
    #[serde(default = "default_one_sec")]
    pub reinit_delay_secs: u64,

    /// Wait after initiation before confirming the session survived its first heartbeat
    #[serde(default = "default_one_sec")]
    pub validity_grace_secs: u64,

    /// Poll interval for device authorization status
    #[serde(default = "default_one_sec")]
    pub auth_poll_interval_secs: u64,

    /// Progress tick for the ad presenter
    #[serde(default = "default_ad_tick")]
    pub ad_tick_millis: u64,
}

fn default_server_url() -> String {
    "https://app.playmanity.net/api".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_init_retry() -> u64 {
    10
}
fn default_heartbeat_interval() -> u64 {
    9
}
fn default_one_sec() -> u64 {
    1
}
fn default_ad_tick() -> u64 {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            game_uuid: String::new(),
            request_timeout_secs: default_request_timeout(),
            init_retry_secs: default_init_retry(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            reinit_delay_secs: default_one_sec(),
            validity_grace_secs: default_one_sec(),
            auth_poll_interval_secs: default_one_sec(),
            ad_tick_millis: default_ad_tick(),
        }
    }
}

impl ClientConfig {
    /// Config with default timings
    pub fn new(server_url: impl Into<String>, game_uuid: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            game_uuid: game_uuid.into(),
            ..Default::default()
        }
    }

    /// Parse from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| SessionError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SessionError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Apply `PLAYMANITY_SERVER_URL` / `PLAYMANITY_GAME_UUID` when set
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_SERVER_URL) {
            if !url.is_empty() {
                self.server_url = url;
            }
        }
        if let Ok(uuid) = std::env::var(ENV_GAME_UUID) {
            if !uuid.is_empty() {
                self.game_uuid = uuid;
            }
        }
        self
    }

    /// Reject configurations the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(SessionError::Config("server_url is empty".into()));
        }
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(SessionError::Config(format!(
                "server_url must be http(s): {}",
                self.server_url
            )));
        }
        if self.game_uuid.trim().is_empty() {
            return Err(SessionError::Config("game_uuid is empty".into()));
        }

        let durations = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("init_retry_secs", self.init_retry_secs),
            ("heartbeat_interval_secs", self.heartbeat_interval_secs),
            ("auth_poll_interval_secs", self.auth_poll_interval_secs),
            ("ad_tick_millis", self.ad_tick_millis),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, v)| *v == 0) {
            return Err(SessionError::Config(format!("{} must be greater than zero", name)));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    // Loop intervals are floored so an unvalidated zero cannot spin

    pub fn init_retry(&self) -> Duration {
        Duration::from_secs(self.init_retry_secs.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn reinit_delay(&self) -> Duration {
        Duration::from_secs(self.reinit_delay_secs)
    }

    pub fn validity_grace(&self) -> Duration {
        Duration::from_secs(self.validity_grace_secs)
    }

    pub fn auth_poll_interval(&self) -> Duration {
        Duration::from_secs(self.auth_poll_interval_secs.max(1))
    }

    pub fn ad_tick(&self) -> Duration {
        Duration::from_millis(self.ad_tick_millis.max(MIN_AD_TICK_MILLIS))
    }
}

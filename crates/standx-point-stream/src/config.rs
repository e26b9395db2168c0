/*
[INPUT]:  Stream URL, optional API credentials, YAML configuration file
[OUTPUT]: Validated StreamConfig with retry, heartbeat, and write pacing settings
[POS]:    Configuration layer - consumed once at client construction
[UPDATE]: When adding new connection options or changing defaults
*/

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StreamError};
use crate::ws::HeartbeatMode;

const DEFAULT_MAX_TRY_TIMES: u32 = 3;
const DEFAULT_BACKOFF_STEP_MS: u64 = 5_000;
const DEFAULT_RECONNECT_PAUSE_MS: u64 = 5_000;
const DEFAULT_DIAL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_AUTH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_WRITE_INTERVAL_MS: u64 = 50;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_FRAME_SIZE: usize = 16 << 20;

/// API key pair used for the socket-level auth handshake
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Canonical signing string layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthVersion {
    /// method + host + path + timestamp
    #[default]
    V1,
    /// V1 plus a fresh nonce
    V2,
}

/// Liveness settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeartbeatConfig {
    /// Client ping interval; absent means the server drives ping/pong
    #[serde(default)]
    pub ping_interval_ms: Option<u64>,
    /// Tear the connection down when nothing was received for this long
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
}

impl HeartbeatConfig {
    pub fn mode(&self) -> HeartbeatMode {
        match self.ping_interval_ms {
            Some(ms) => HeartbeatMode::ClientDriven {
                interval: Duration::from_millis(ms),
            },
            None => HeartbeatMode::ServerDriven,
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

/// Streaming client configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StreamConfig {
    pub url: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub auth_version: AuthVersion,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    /// Log raw frames at debug level
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_max_try_times")]
    pub max_try_times: u32,
    /// Attempt `i` (zero-based) waits `i * backoff_step_ms` before dialing
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
    /// Pause between exhausted reconnect rounds
    #[serde(default = "default_reconnect_pause_ms")]
    pub reconnect_pause_ms: u64,
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,
    /// Fixed pause after every outbound frame
    #[serde(default = "default_write_interval_ms")]
    pub write_interval_ms: u64,
    /// Upper bound on one outbound frame write; expiry counts as a write failure
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

impl StreamConfig {
    /// Create a configuration with defaults for everything but the URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            auth_version: AuthVersion::default(),
            auto_reconnect: true,
            debug: false,
            max_try_times: DEFAULT_MAX_TRY_TIMES,
            backoff_step_ms: DEFAULT_BACKOFF_STEP_MS,
            reconnect_pause_ms: DEFAULT_RECONNECT_PAUSE_MS,
            dial_timeout_ms: DEFAULT_DIAL_TIMEOUT_MS,
            auth_timeout_ms: DEFAULT_AUTH_TIMEOUT_MS,
            write_interval_ms: DEFAULT_WRITE_INTERVAL_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            heartbeat: HeartbeatConfig::default(),
        }
    }

    /// Load and validate configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_auth_version(mut self, version: AuthVersion) -> Self {
        self.auth_version = version;
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn with_max_try_times(mut self, max_try_times: u32) -> Self {
        self.max_try_times = max_try_times;
        self
    }

    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step_ms = duration_ms(step);
        self
    }

    pub fn with_reconnect_pause(mut self, pause: Duration) -> Self {
        self.reconnect_pause_ms = duration_ms(pause);
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_write_interval(mut self, interval: Duration) -> Self {
        self.write_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.heartbeat.ping_interval_ms = Some(duration_ms(interval));
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat.idle_timeout_ms = Some(duration_ms(timeout));
        self
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }

    pub fn reconnect_pause(&self) -> Duration {
        Duration::from_millis(self.reconnect_pause_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn write_interval(&self) -> Duration {
        Duration::from_millis(self.write_interval_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Parse the configured URL, rejecting anything that is not ws/wss
    pub fn parsed_url(&self) -> Result<Url> {
        if self.url.trim().is_empty() {
            return Err(StreamError::Config("url must not be empty".to_string()));
        }
        let url = Url::parse(&self.url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(StreamError::Config(format!(
                "url scheme must be ws or wss, got {other}"
            ))),
        }
    }

    /// Check the configuration for values the client cannot run with
    pub fn validate(&self) -> Result<()> {
        self.parsed_url()?;

        if self.max_try_times == 0 {
            return Err(StreamError::Config(
                "max_try_times must be at least 1".to_string(),
            ));
        }
        if self.write_timeout_ms == 0 {
            return Err(StreamError::Config(
                "write_timeout_ms must be positive".to_string(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(StreamError::Config(
                "max_frame_size must be positive".to_string(),
            ));
        }
        if self.heartbeat.ping_interval_ms == Some(0) {
            return Err(StreamError::Config(
                "heartbeat.ping_interval_ms must be positive".to_string(),
            ));
        }
        if self.heartbeat.idle_timeout_ms == Some(0) {
            return Err(StreamError::Config(
                "heartbeat.idle_timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(credentials) = &self.credentials
            && (credentials.api_key.is_empty() || credentials.api_secret.is_empty())
        {
            return Err(StreamError::Config(
                "credentials require both api_key and api_secret".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_true() -> bool {
    true
}

fn default_max_try_times() -> u32 {
    DEFAULT_MAX_TRY_TIMES
}

fn default_backoff_step_ms() -> u64 {
    DEFAULT_BACKOFF_STEP_MS
}

fn default_reconnect_pause_ms() -> u64 {
    DEFAULT_RECONNECT_PAUSE_MS
}

fn default_dial_timeout_ms() -> u64 {
    DEFAULT_DIAL_TIMEOUT_MS
}

fn default_auth_timeout_ms() -> u64 {
    DEFAULT_AUTH_TIMEOUT_MS
}

fn default_write_interval_ms() -> u64 {
    DEFAULT_WRITE_INTERVAL_MS
}

fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

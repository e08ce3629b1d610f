//! Configuration loading and typed config structures for the lobby client.
//!
//! The canonical configuration lives in `lobby-config.yaml` at the project
//! root. Every field has a default, so an empty file (or no file at all)
//! yields a working configuration against the public demo keyset.
//! Deployment-specific values can be overridden through environment
//! variables without editing the YAML.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration.
///
/// Mirrors the structure of `lobby-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LobbyConfig {
    /// The shared channel whose presence is tracked.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Fixed session identifier. A random one is generated when absent.
    #[serde(default)]
    pub uuid: Option<Uuid>,

    /// Presence service endpoint and keys.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Snapshot refresh and teardown timing.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Roster observer HTTP server.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            uuid: None,
            transport: TransportConfig::default(),
            presence: PresenceConfig::default(),
            observer: ObserverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl LobbyConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is unusable.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `LOBBY_CHANNEL` | `channel` |
    /// | `LOBBY_UUID` | `uuid` |
    /// | `LOBBY_ORIGIN` | `transport.origin` |
    /// | `LOBBY_SUBSCRIBE_KEY` | `transport.subscribe_key` |
    /// | `LOBBY_OBSERVER_PORT` | `observer.port` |
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Override fields from an arbitrary variable lookup.
    ///
    /// Values that fail to parse are ignored and the YAML value is kept.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("LOBBY_CHANNEL") {
            self.channel = val;
        }
        if let Some(val) = lookup("LOBBY_UUID").and_then(|v| v.parse().ok()) {
            self.uuid = Some(val);
        }
        if let Some(val) = lookup("LOBBY_ORIGIN") {
            self.transport.origin = val;
        }
        if let Some(val) = lookup("LOBBY_SUBSCRIBE_KEY") {
            self.transport.subscribe_key = val;
        }
        if let Some(val) = lookup("LOBBY_OBSERVER_PORT").and_then(|v| v.parse().ok()) {
            self.observer.port = val;
        }
    }

    /// Reject values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            reason: reason.to_owned(),
        };

        if self.channel.trim().is_empty() {
            return Err(invalid("channel must not be empty"));
        }
        if self.transport.origin.trim().is_empty() {
            return Err(invalid("transport.origin must not be empty"));
        }
        if self.transport.subscribe_key.trim().is_empty() {
            return Err(invalid("transport.subscribe_key must not be empty"));
        }
        if self.presence.refresh_interval_ms == 0 {
            return Err(invalid("presence.refresh_interval_ms must be at least 1"));
        }
        if self.presence.fetch_timeout_ms == 0 {
            return Err(invalid("presence.fetch_timeout_ms must be at least 1"));
        }
        if self.presence.leave_timeout_ms == 0 {
            return Err(invalid("presence.leave_timeout_ms must be at least 1"));
        }
        Ok(())
    }
}

/// Presence service connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransportConfig {
    /// Base URL of the presence service.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Subscribe key of the keyset; scopes every presence endpoint.
    #[serde(default = "default_key")]
    pub subscribe_key: String,

    /// Seconds without a heartbeat before the service times us out.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u32,

    /// Upper bound for one subscribe long-poll, in milliseconds.
    #[serde(default = "default_subscribe_timeout_ms")]
    pub subscribe_timeout_ms: u64,

    /// Delay before retrying a failed long-poll, in milliseconds.
    #[serde(default = "default_subscribe_retry_ms")]
    pub subscribe_retry_ms: u64,
}

impl TransportConfig {
    /// Subscribe long-poll bound as a [`Duration`].
    pub const fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_timeout_ms)
    }

    /// Long-poll retry delay as a [`Duration`].
    pub const fn subscribe_retry(&self) -> Duration {
        Duration::from_millis(self.subscribe_retry_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            subscribe_key: default_key(),
            heartbeat_secs: default_heartbeat_secs(),
            subscribe_timeout_ms: default_subscribe_timeout_ms(),
            subscribe_retry_ms: default_subscribe_retry_ms(),
        }
    }
}

/// Snapshot refresh and teardown timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PresenceConfig {
    /// Milliseconds between here-now snapshots.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Upper bound for one here-now query, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Upper bound for each teardown call, in milliseconds.
    #[serde(default = "default_leave_timeout_ms")]
    pub leave_timeout_ms: u64,
}

impl PresenceConfig {
    /// Refresh period as a [`Duration`].
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Here-now bound as a [`Duration`].
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Teardown call bound as a [`Duration`].
    pub const fn leave_timeout(&self) -> Duration {
        Duration::from_millis(self.leave_timeout_ms)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            leave_timeout_ms: default_leave_timeout_ms(),
        }
    }
}

/// Roster observer server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether to serve the roster over HTTP at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to bind.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_channel() -> String {
    String::from("playerlobby")
}

fn default_origin() -> String {
    String::from("https://ps.pndsn.com")
}

fn default_key() -> String {
    String::from("demo")
}

const fn default_heartbeat_secs() -> u32 {
    300
}

const fn default_subscribe_timeout_ms() -> u64 {
    310_000
}

const fn default_subscribe_retry_ms() -> u64 {
    1_000
}

const fn default_refresh_interval_ms() -> u64 {
    2_000
}

const fn default_fetch_timeout_ms() -> u64 {
    5_000
}

const fn default_leave_timeout_ms() -> u64 {
    1_000
}

const fn default_true() -> bool {
    true
}

fn default_observer_host() -> String {
    String::from("127.0.0.1")
}

const fn default_observer_port() -> u16 {
    8090
}

fn default_log_level() -> String {
    String::from("info")
}

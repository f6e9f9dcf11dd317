//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `homelink.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use homelink_adapter_mqtt::MqttConfig;
use homelink_app::telemetry_hub::HubConfig;
use homelink_domain::command::CommandTimeouts;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Message broker connection.
    pub mqtt: MqttConfig,
    /// Correlated command deadlines and limits.
    pub commands: CommandsConfig,
    /// Telemetry fan-out limits.
    pub telemetry: TelemetryConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub verify_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub disconnect_timeout_ms: u64,
    pub lock_timeout_ms: u64,
    /// Pending correlated commands allowed per device.
    pub max_outstanding_per_device: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Frames buffered per WebSocket before frames are dropped.
    pub connection_buffer: usize,
    pub max_subscriptions_per_connection: usize,
    /// How often closed connections are swept from subscriber groups.
    pub reap_interval_secs: u64,
}

impl Config {
    /// Load configuration from `homelink.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("homelink.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HOMELINK_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("HOMELINK_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("HOMELINK_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("HOMELINK_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("HOMELINK_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("HOMELINK_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = var("HOMELINK_MQTT_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Validation(message.to_string()));
        if self.server.port == 0 {
            return invalid("port must be non-zero");
        }
        if self.mqtt.broker_host.trim().is_empty() {
            return invalid("mqtt.broker_host must not be empty");
        }
        if self.mqtt.broker_port == 0 {
            return invalid("mqtt.broker_port must be non-zero");
        }
        if self.mqtt.channel_capacity == 0 {
            return invalid("mqtt.channel_capacity must be non-zero");
        }
        let commands = &self.commands;
        if [
            commands.verify_timeout_ms,
            commands.connect_timeout_ms,
            commands.disconnect_timeout_ms,
            commands.lock_timeout_ms,
        ]
        .contains(&0)
        {
            return invalid("command timeouts must be non-zero");
        }
        if commands.max_outstanding_per_device == 0 {
            return invalid("commands.max_outstanding_per_device must be non-zero");
        }
        if self.telemetry.connection_buffer == 0 {
            return invalid("telemetry.connection_buffer must be non-zero");
        }
        if self.telemetry.reap_interval_secs == 0 {
            return invalid("telemetry.reap_interval_secs must be non-zero");
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl CommandsConfig {
    #[must_use]
    pub fn timeouts(&self) -> CommandTimeouts {
        CommandTimeouts {
            verify: Duration::from_millis(self.verify_timeout_ms),
            connect: Duration::from_millis(self.connect_timeout_ms),
            disconnect: Duration::from_millis(self.disconnect_timeout_ms),
            lock: Duration::from_millis(self.lock_timeout_ms),
        }
    }
}

impl TelemetryConfig {
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            connection_buffer: self.connection_buffer,
            max_subscriptions_per_connection: self.max_subscriptions_per_connection,
        }
    }

    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:homelink.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homelinkd=info,homelink=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            verify_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            disconnect_timeout_ms: 10_000,
            lock_timeout_ms: 10_000,
            max_outstanding_per_device: 8,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let hub = HubConfig::default();
        Self {
            connection_buffer: hub.connection_buffer,
            max_subscriptions_per_connection: hub.max_subscriptions_per_connection,
            reap_interval_secs: 30,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

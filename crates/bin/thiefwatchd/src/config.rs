//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `thiefwatch.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;

use thiefwatch_adapter_mqtt::MqttConfig;
use thiefwatch_app::services::command_dispatcher::DEFAULT_ACTUATOR;
use thiefwatch_domain::decision::LightingPolicy;
use thiefwatch_domain::id;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lighting rule and scheduling.
    pub control: ControlConfig,
    /// Broker connection.
    pub mqtt: MqttConfig,
    /// Directory snapshot location.
    pub storage: StorageConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Lighting rule, periodic jobs and retention.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Root segment of every topic.
    pub namespace: String,
    /// Device name commands are addressed to.
    pub actuator_name: String,
    /// Idle time after which a bright location is switched off.
    pub motion_timeout_secs: u64,
    /// Lux above which a location counts as bright.
    pub brightness_threshold: f64,
    /// Period of the decision re-evaluation.
    pub tick_interval_secs: u64,
    /// Period of the subscription refresh.
    pub refresh_interval_secs: u64,
    /// Period of the staleness reaper.
    pub reap_interval_secs: u64,
    /// Age after which a device record is evicted.
    pub retention_secs: u64,
    /// Drop subscriptions of locations that left the directory.
    pub unsubscribe_removed: bool,
}

/// Directory snapshot configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON snapshot.
    pub path: PathBuf,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Serve the REST API at all.
    pub enabled: bool,
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from `thiefwatch.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("thiefwatch.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
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

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("THIEFWATCH_NAMESPACE") {
            self.control.namespace = val;
        }
        if let Some(val) = lookup("THIEFWATCH_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = lookup("THIEFWATCH_MQTT_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = lookup("THIEFWATCH_MQTT_CLIENT_ID") {
            self.mqtt.client_id = val;
        }
        if let Some(val) = lookup("THIEFWATCH_DIRECTORY_PATH") {
            self.storage.path = val.into();
        }
        if let Some(val) = lookup("THIEFWATCH_HOST") {
            self.server.host = val;
        }
        if let Some(port) = lookup("THIEFWATCH_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = lookup("THIEFWATCH_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Some(val) = lookup("THIEFWATCH_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let control = &self.control;
        if id::check(&control.namespace).is_err() {
            return Err(ConfigError::Validation(format!(
                "namespace {:?} is not a valid topic segment",
                control.namespace
            )));
        }
        if id::check(&control.actuator_name).is_err() {
            return Err(ConfigError::Validation(format!(
                "actuator name {:?} is not a valid topic segment",
                control.actuator_name
            )));
        }
        if !control.brightness_threshold.is_finite() {
            return Err(ConfigError::Validation(
                "brightness threshold must be finite".to_string(),
            ));
        }
        if control.tick_interval_secs == 0
            || control.refresh_interval_secs == 0
            || control.reap_interval_secs == 0
        {
            return Err(ConfigError::Validation(
                "job intervals must be non-zero".to_string(),
            ));
        }
        if try_secs(control.motion_timeout_secs).is_none()
            || try_secs(control.retention_secs).is_none()
        {
            return Err(ConfigError::Validation(
                "motion timeout and retention are out of range".to_string(),
            ));
        }
        if self.mqtt.qos > 2 {
            return Err(ConfigError::Validation(format!(
                "qos must be 0, 1 or 2, got {}",
                self.mqtt.qos
            )));
        }
        if self.server.enabled && self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ControlConfig {
    /// The lighting rule thresholds.
    #[must_use]
    pub fn policy(&self) -> LightingPolicy {
        LightingPolicy {
            motion_timeout: secs(self.motion_timeout_secs),
            brightness_threshold: self.brightness_threshold,
        }
    }

    #[must_use]
    pub fn retention(&self) -> TimeDelta {
        secs(self.retention_secs)
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

fn try_secs(value: u64) -> Option<TimeDelta> {
    i64::try_from(value).ok().and_then(TimeDelta::try_seconds)
}

// Range is checked by `Config::validate`.
fn secs(value: u64) -> TimeDelta {
    try_secs(value).unwrap_or(TimeDelta::MAX)
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            namespace: "ThiefDetector".to_string(),
            actuator_name: DEFAULT_ACTUATOR.to_string(),
            motion_timeout_secs: 30,
            brightness_threshold: 400.0,
            tick_interval_secs: 10,
            refresh_interval_secs: 60,
            reap_interval_secs: 600,
            retention_secs: 3600,
            unsubscribe_removed: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/directory.json"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "thiefwatchd=info,thiefwatch=info,tower_http=debug".to_string(),
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

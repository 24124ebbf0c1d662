//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `nest.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use nest_adapter_sysfs::{DEFAULT_POLL_INTERVAL, DuplicatePolicy};
use nest_domain::device::DeviceIdentifier;
use nest_domain::error::NestError;
use nest_domain::id::EntityId;
use nest_domain::rules::RuleTable;

/// Default location of the configuration file.
pub const CONFIG_FILE: &str = "nest.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device discovery and polling.
    pub devices: DevicesConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Automation rules.
    pub automation: AutomationConfig,
    /// Virtual entities.
    pub entities: EntitiesConfig,
}

/// Device discovery and polling configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Root of the controller's device tree.
    pub root: PathBuf,
    /// Milliseconds between two reads of a device.
    pub poll_interval_ms: u64,
    /// What to do when two paths yield the same slug.
    pub on_duplicate: DuplicatePolicy,
    /// Events buffered on the bus before producers wait.
    pub event_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Automation configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// `source id -> target id`.
    pub rules: RuleTable,
}

/// Virtual entities to create at startup.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EntitiesConfig {
    pub push_buttons: Vec<EntityConfig>,
    pub lights: Vec<EntityConfig>,
}

/// One virtual entity.
#[derive(Debug, Deserialize)]
pub struct EntityConfig {
    pub id: EntityId,
}

impl Config {
    /// Load configuration from `nest.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Re-read only the rule table from `nest.toml`.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load) minus the environment.
    pub fn reload_rules() -> Result<RuleTable, ConfigError> {
        let config = Self::from_file(CONFIG_FILE)?;
        config.validate()?;
        Ok(config.automation.rules)
    }

    fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NEST_DEVICE_ROOT") {
            self.devices.root = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("NEST_POLL_INTERVAL_MS") {
            if let Ok(interval) = val.parse() {
                self.devices.poll_interval_ms = interval;
            }
        }
        if let Ok(val) = std::env::var("NEST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.devices.event_capacity == 0 {
            return Err(ConfigError::Validation(
                "event_capacity must be non-zero".to_string(),
            ));
        }

        self.automation.rules.validate().map_err(|err| match err {
            NestError::Validation(message) => ConfigError::Validation(message),
            other => ConfigError::Validation(other.to_string()),
        })?;

        let mut seen = HashSet::new();
        for id in self.entity_ids() {
            if DeviceIdentifier::from_slug(id.as_str()).is_some() {
                return Err(ConfigError::Validation(format!(
                    "entity id {id} looks like a device slug"
                )));
            }
            if !seen.insert(id) {
                return Err(ConfigError::Validation(format!(
                    "entity id {id} is declared twice"
                )));
            }
        }
        Ok(())
    }

    /// Interval between two reads of the same device.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.devices.poll_interval_ms)
    }

    fn entity_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.entities
            .push_buttons
            .iter()
            .chain(&self.entities.lights)
            .map(|entity| &entity.id)
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/sys/devices/platform/unipi_plc"),
            poll_interval_ms: u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(250),
            on_duplicate: DuplicatePolicy::default(),
            event_capacity: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "nestd=info,nest=info".to_string(),
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

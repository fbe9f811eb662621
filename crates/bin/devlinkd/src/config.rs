//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `devlink.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::path::PathBuf;

use serde::Deserialize;

use devlink_domain::schema::BuildOptions;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device identity.
    pub device: DeviceConfig,
    /// Settings storage.
    pub settings: SettingsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Schema building knobs for command and state definitions.
    pub commands: CommandsConfig,
    /// Event bus settings.
    pub events: EventsConfig,
    /// Integration toggles.
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Five-character model identifier, part of every settings file name.
    pub model_id: String,
    /// Human-readable device name.
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Directory holding the settings files.
    pub dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub strict_overrides: bool,
    pub lenient_objects: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast buffer size; slow subscribers past it miss events.
    pub capacity: usize,
}

/// Per-integration toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Enable the virtual/demo integration.
    pub virtual_enabled: bool,
}

impl Config {
    /// Load configuration from `devlink.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("devlink.toml")?;
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
        if let Ok(val) = std::env::var("DEVLINK_MODEL_ID") {
            self.device.model_id = val;
        }
        if let Ok(val) = std::env::var("DEVLINK_NAME") {
            self.device.name = val;
        }
        if let Ok(val) = std::env::var("DEVLINK_SETTINGS_DIR") {
            self.settings.dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("DEVLINK_EVENTS_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.events.capacity = capacity;
            }
        }
        if let Ok(val) = std::env::var("DEVLINK_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.device.model_id.is_empty() {
            return Err(ConfigError::Validation(
                "device.model_id must not be empty".to_string(),
            ));
        }
        if self
            .device
            .model_id
            .contains(|c: char| !c.is_ascii_alphanumeric())
        {
            return Err(ConfigError::Validation(format!(
                "device.model_id '{}' must be alphanumeric",
                self.device.model_id
            )));
        }
        if self.events.capacity == 0 {
            return Err(ConfigError::Validation(
                "events.capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Options used to build every command and state schema.
    #[must_use]
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            strict_overrides: self.commands.strict_overrides,
            lenient_objects: self.commands.lenient_objects,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            model_id: "AAAAA".to_string(),
            name: "devlink".to_string(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("settings"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "devlinkd=info,devlink=info".to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
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

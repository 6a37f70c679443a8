//! Configuration file support for Interchange.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/interchange/config.toml`.

use crate::timezone::{ActivityTz, TzValue};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub timezone: TimezoneConfig,
}

/// Log output configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter level, overridden by RUST_LOG
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Zones used when activities arrive without enough information to place them.
///
/// Both accept an IANA name (`Europe/Zurich`) or an offset in minutes (`-300`).
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct TimezoneConfig {
    /// Applied to activities with no located waypoint and no fallback of their own
    #[serde(default)]
    pub fallback_zone: Option<String>,

    /// Answer for every coordinate lookup, for offline use
    #[serde(default)]
    pub lookup_zone: Option<String>,
}

fn default_level() -> String {
    "info".into()
}

fn parse_zone(zone: Option<&str>) -> Result<Option<ActivityTz>> {
    zone.map(|z| ActivityTz::try_from(z.parse::<TzValue>()?))
        .transpose()
}

impl TimezoneConfig {
    pub fn fallback_tz(&self) -> Result<Option<ActivityTz>> {
        parse_zone(self.fallback_zone.as_deref())
    }

    /// The lookup answer, validated as a real zone
    pub fn lookup_value(&self) -> Result<Option<TzValue>> {
        Ok(parse_zone(self.lookup_zone.as_deref())?.map(TzValue::from))
    }
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("interchange").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

//! Application settings management
//!
//! Settings live in `<config dir>/clickguard/settings.toml`. Out-of-range
//! values in the file fall back to their defaults rather than failing the
//! load.

use crate::adaptive::RatioWindow;
use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::sink::DEFAULT_LOG_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, info, warn};

/// Accepted base delay in milliseconds
pub const DELAY_RANGE_MS: RangeInclusive<u64> = 1..=500;

pub const DEFAULT_DELAY_MS: u64 = 50;

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base suppression window in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// tracing level for console output
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Engine log lines queued before new ones are dropped
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines: usize,

    /// How the short-click ratio is computed
    #[serde(default)]
    pub ratio_window: RatioWindow,

    /// Explicit /dev/input/eventN to intercept instead of scanning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,
}

fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_lines() -> usize {
    DEFAULT_LOG_CAPACITY
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            log_level: default_log_level(),
            max_log_lines: DEFAULT_LOG_CAPACITY,
            ratio_window: RatioWindow::default(),
            device: None,
        }
    }
}

/// Validate a base delay given in milliseconds
pub fn validate_delay(delay_ms: u64) -> Result<Duration, ConfigError> {
    if !DELAY_RANGE_MS.contains(&delay_ms) {
        return Err(ConfigError::InvalidDelay {
            value: delay_ms,
            min: *DELAY_RANGE_MS.start(),
            max: *DELAY_RANGE_MS.end(),
        });
    }
    Ok(Duration::from_millis(delay_ms))
}

impl Settings {
    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("clickguard");
        Ok(config_dir.join("settings.toml"))
    }

    /// Load settings from the default location (or use defaults)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::settings_path()?)
    }

    /// Load settings from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded settings from {:?}", path);
        Ok(settings.sanitized())
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Replace invalid values with defaults
    pub fn sanitized(mut self) -> Self {
        if validate_delay(self.delay_ms).is_err() {
            warn!("delay_ms {} out of range, using {}", self.delay_ms, DEFAULT_DELAY_MS);
            self.delay_ms = DEFAULT_DELAY_MS;
        }
        if self.max_log_lines == 0 {
            self.max_log_lines = DEFAULT_LOG_CAPACITY;
        }
        if self.log_level.parse::<Level>().is_err() {
            warn!("Unknown log_level '{}', using info", self.log_level);
            self.log_level = default_log_level();
        }
        self
    }

    /// Engine parameters for these settings
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let base_delay = validate_delay(self.delay_ms)?;
        Ok(EngineConfig::new(base_delay).with_ratio_window(self.ratio_window))
    }

    pub fn tracing_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

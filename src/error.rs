//! Error types for the protection lifecycle and settings

use std::path::PathBuf;
use thiserror::Error;

/// Why protection could not be started
#[derive(Debug, Error)]
pub enum GuardError {
    /// `start` while protection is already active
    #[error("protection is already running")]
    AlreadyRunning,

    #[error("pointer interception is not supported on this platform")]
    UnsupportedPlatform,

    /// The event source could not install its hook
    #[error("failed to install pointer hook")]
    RegistrationFailure(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("delay must be between {min} and {max} milliseconds, got {value}")]
    InvalidDelay { value: u64, min: u64, max: u64 },

    #[error("could not find config directory")]
    NoConfigDir,

    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize settings")]
    Serialize(#[from] toml::ser::Error),
}

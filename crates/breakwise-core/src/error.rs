//! Core error types for breakwise-core.
//!
//! Routine scheduling never fails. The only error a caller sees synchronously
//! is a rejected configuration change; failures of external collaborators
//! (media scripting, overlay creation) are absorbed where they happen and
//! degrade to a safe default.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Core error type for breakwise-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings file could not be parsed
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// Settings could not be serialized
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// The runtime task is gone
    #[error("Scheduler runtime stopped")]
    RuntimeStopped,

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value. The previous value is retained.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// No preset with this id
    #[error("Unknown preset: {0}")]
    UnknownPreset(Uuid),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Failures talking to an external media producer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Producer not running or the script failed. Treated as not playing.
    #[error("Media producer '{producer}' unavailable: {message}")]
    Unavailable { producer: String, message: String },

    /// Probe exceeded its time budget. Treated as unknown.
    #[error("Media producer '{producer}' did not answer within {budget_ms} ms")]
    Timeout { producer: String, budget_ms: u64 },
}

/// Failures creating an overlay surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    /// The display went away or refused a window. Only that display is skipped.
    #[error("Failed to create overlay on display {display}: {message}")]
    CreationFailed { display: u32, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

//! Error types for configuration handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while validating an operation configuration or loading
/// engine settings.
///
/// Every variant is detected before an operation touches the filesystem.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Parallelism hint below zero.
    #[error("parallelism cannot be negative (got {value})")]
    NegativeParallelism { value: i32 },

    /// Minimum file size larger than maximum file size.
    #[error("min file size ({min}) cannot be greater than max file size ({max})")]
    SizeBounds { min: u64, max: u64 },

    /// Similarity threshold outside of `[0.0, 1.0]`.
    #[error("similarity threshold must be between 0.0 and 1.0 (got {value})")]
    SimilarityThreshold { value: f64 },

    /// Hash algorithm name not in the supported set.
    #[error("unsupported hash algorithm: {name}")]
    UnsupportedHashAlgorithm { name: String },

    /// Include or exclude pattern that is not a valid glob.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The operation needs at least one root path.
    #[error("no paths specified")]
    NoPaths,

    /// A required custom setting is absent.
    #[error("{key} parameter is required")]
    MissingSetting { key: String },

    /// A custom setting is present but unusable.
    #[error("invalid value for {key}: {message}")]
    InvalidSetting { key: String, message: String },

    /// Settings file could not be read.
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file could not be parsed.
    #[error("failed to parse settings: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Create an invalid setting error.
    pub fn invalid_setting(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a missing setting error.
    pub fn missing_setting(key: impl Into<String>) -> Self {
        Self::MissingSetting { key: key.into() }
    }
}

//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}: {message}")]
    Io {
        /// Path that was being read
        path: String,
        /// Underlying I/O error message
        message: String,
    },

    /// The configuration document is not valid TOML or has the wrong shape.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A field is outside its allowed range.
    #[error("Invalid value for {field}: {message}")]
    Validation {
        /// Dotted path of the offending field
        field: String,
        /// What is wrong with it
        message: String,
    },

    /// A backend or provider name that this build does not know.
    #[error("Unknown {kind} provider: {name} (available: {available})")]
    UnknownProvider {
        /// Kind of provider, e.g. "graph store"
        kind: String,
        /// The requested name
        name: String,
        /// Comma-separated list of known names
        available: String,
    },
}

impl ConfigError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

//! Error types for configuration loading.

use std::io;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable held a value that failed validation.
    #[error("invalid configuration field")]
    InvalidField {
        /// Environment variable carrying the value.
        field: &'static str,
        /// Offending value when it is safe to echo.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The working directory needed for default paths was unavailable.
    #[error("failed to resolve working directory")]
    WorkingDirectory {
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        field: &'static str,
        value: Option<&str>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            field,
            value: value.map(str::to_string),
            reason,
        }
    }
}

//! # Design
//!
//! - Centralize application-level errors for bootstrap and serving.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or validated.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: mediadrop_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: mediadrop_telemetry::TelemetryError,
    },
    /// Scratch directory or handle signer setup failed.
    #[error("scratch setup failed")]
    Scratch {
        /// Operation identifier.
        operation: &'static str,
        /// Source scratch error.
        source: mediadrop_scratch::ScratchError,
    },
    /// HTTP client construction failed.
    #[error("http client setup failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: mediadrop_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: mediadrop_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: mediadrop_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn scratch(
        operation: &'static str,
        source: mediadrop_scratch::ScratchError,
    ) -> Self {
        Self::Scratch { operation, source }
    }

    pub(crate) const fn http(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Http { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: mediadrop_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}

//! Error types for scratch directory operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for scratch operations.
pub type ScratchResult<T> = Result<T, ScratchError>;

/// Errors raised while resolving, naming or signing scratch artifacts.
#[derive(Debug, Error)]
pub enum ScratchError {
    /// The requested artifact is outside the caller's reach.
    #[error("access denied")]
    AccessDenied {
        /// Name supplied by the caller.
        name: String,
        /// Machine-readable reason for the rejection.
        reason: &'static str,
    },
    /// A configured signing secret was too short.
    #[error("handle secret too short")]
    WeakSecret {
        /// Minimum accepted length in bytes.
        min_len: usize,
    },
    /// Filesystem operation failed.
    #[error("scratch filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the operation.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
}

impl ScratchError {
    pub(crate) fn denied(name: &str, reason: &'static str) -> Self {
        Self::AccessDenied {
            name: name.to_string(),
            reason,
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether this error should surface as an authorization failure.
    #[must_use]
    pub const fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

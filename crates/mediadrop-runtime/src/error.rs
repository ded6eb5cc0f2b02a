//! Error types for history persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors raised while reading or writing the history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Filesystem operation failed.
    #[error("history file operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// The file did not contain a JSON array of entries.
    #[error("history file is corrupt")]
    Corrupt {
        /// History file path.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },
    /// Entries could not be serialized.
    #[error("history could not be encoded")]
    Encode {
        /// Serialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl HistoryError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

//! Error types for the fetch and transcode pipeline.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use mediadrop_scratch::ScratchError;
use thiserror::Error;

use crate::tools::ToolKind;

/// Result alias for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Failures of a single external tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable could not be started.
    #[error("failed to start external tool")]
    Spawn {
        /// Tool category.
        tool: ToolKind,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// The tool did not exit within its time limit and was killed.
    #[error("external tool timed out")]
    TimedOut {
        /// Tool category.
        tool: ToolKind,
        /// Limit that was exceeded.
        timeout: Duration,
    },
    /// The tool exited unsuccessfully.
    #[error("external tool exited unsuccessfully")]
    NonZeroExit {
        /// Tool category.
        tool: ToolKind,
        /// Exit code, absent when killed by a signal.
        exit_code: Option<i32>,
        /// Last lines of standard error, for operator logs only.
        stderr_tail: String,
    },
}

impl ToolError {
    /// Metric outcome label.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn_error",
            Self::TimedOut { .. } => "timeout",
            Self::NonZeroExit { .. } => "failure",
        }
    }
}

/// Failures of the fetch orchestrator.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source URL was missing or not an absolute URL.
    #[error("invalid URL")]
    InvalidUrl {
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// The downloader failed or timed out.
    #[error("download failed")]
    DownloadFailed {
        /// Platform label of the strategy that ran.
        platform: &'static str,
        /// Underlying tool failure.
        #[source]
        source: ToolError,
    },
    /// The downloader exited cleanly but no artifact appeared.
    #[error("downloaded artifact not found")]
    ArtifactNotFound {
        /// Platform label of the strategy that ran.
        platform: &'static str,
    },
    /// The scratch directory could not be prepared or scanned.
    #[error("scratch directory unavailable")]
    Scratch {
        /// Underlying scratch error.
        #[source]
        source: ScratchError,
    },
    /// Artifact metadata could not be read.
    #[error("artifact inspection failed")]
    Inspect {
        /// Artifact path.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Platform label attached to the failure, when one applies.
    #[must_use]
    pub const fn platform(&self) -> Option<&'static str> {
        match self {
            Self::DownloadFailed { platform, .. } | Self::ArtifactNotFound { platform } => {
                Some(platform)
            }
            Self::InvalidUrl { .. } | Self::Scratch { .. } | Self::Inspect { .. } => None,
        }
    }
}

/// Failures of an MP3 transcode. The stream path recovers from all of them.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The source path has no usable file name.
    #[error("transcode source has no file name")]
    InvalidSource {
        /// Offending path.
        path: PathBuf,
    },
    /// The transcoder failed or timed out.
    #[error("transcoder failed")]
    Tool {
        /// Underlying tool failure.
        #[source]
        source: ToolError,
    },
    /// The transcoder exited cleanly without producing output.
    #[error("transcoder produced no output")]
    MissingOutput {
        /// Expected output path.
        path: PathBuf,
    },
    /// Moving the finished output into place failed.
    #[error("transcode output could not be finalised")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn download_failed_keeps_tool_context_out_of_message() {
        let err = FetchError::DownloadFailed {
            platform: "youtube",
            source: ToolError::NonZeroExit {
                tool: ToolKind::Downloader,
                exit_code: Some(1),
                stderr_tail: "ERROR: private video".to_string(),
            },
        };
        assert_eq!(err.to_string(), "download failed");
        assert_eq!(err.platform(), Some("youtube"));
        let source = err.source().map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("external tool exited unsuccessfully")
        );
    }

    #[test]
    fn tool_error_outcomes_are_distinct() {
        let spawn = ToolError::Spawn {
            tool: ToolKind::Transcoder,
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let timeout = ToolError::TimedOut {
            tool: ToolKind::Downloader,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(spawn.outcome(), "spawn_error");
        assert_eq!(timeout.outcome(), "timeout");
        assert!(FetchError::InvalidUrl { reason: "relative" }.platform().is_none());
    }
}

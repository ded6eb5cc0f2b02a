//! External tool invocation.
//!
//! Tools are always launched with an argument vector, never through a shell,
//! and are killed when their time limit expires.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use mediadrop_telemetry::Metrics;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ToolError;

const STDERR_TAIL_LINES: usize = 5;

/// Category of external tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Media downloader (yt-dlp).
    Downloader,
    /// Audio/video transcoder (ffmpeg).
    Transcoder,
}

impl ToolKind {
    /// Metric and log label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Downloader => "downloader",
            Self::Transcoder => "transcoder",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully constructed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Tool category.
    pub kind: ToolKind,
    /// Executable name or path.
    pub program: String,
    /// Arguments, passed verbatim.
    pub args: Vec<String>,
    /// Wall-clock limit.
    pub timeout: Duration,
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, absent when killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// Output of a tool that exited with status zero.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Whether the tool exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Convert a non-zero exit into [`ToolError::NonZeroExit`].
    ///
    /// # Errors
    ///
    /// Returns `NonZeroExit` when the tool did not exit with status zero.
    pub fn into_success(self, tool: ToolKind) -> Result<Self, ToolError> {
        if self.success() {
            return Ok(self);
        }
        Err(ToolError::NonZeroExit {
            tool,
            exit_code: self.exit_code,
            stderr_tail: stderr_tail(&self.stderr),
        })
    }
}

/// Narrow seam over external process execution.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run the tool to completion and capture its output.
    ///
    /// Implementations report spawn failures and timeouts as errors; a
    /// non-zero exit is reported through [`ToolOutput::exit_code`].
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// [`ToolRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        let ToolInvocation {
            kind,
            program,
            args,
            timeout,
        } = invocation;
        debug!(tool = %kind, program = %program, ?args, "invoking external tool");

        let child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn { tool: kind, source })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Spawn { tool: kind, source })?,
            Err(_) => {
                warn!(tool = %kind, timeout_secs = timeout.as_secs(), "external tool timed out");
                return Err(ToolError::TimedOut { tool: kind, timeout });
            }
        };

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Invoke a tool, require a zero exit and record the outcome metric.
pub(crate) async fn run_checked(
    runner: &dyn ToolRunner,
    metrics: &Metrics,
    invocation: ToolInvocation,
) -> Result<ToolOutput, ToolError> {
    let kind = invocation.kind;
    let result = runner
        .invoke(invocation)
        .await
        .and_then(|output| output.into_success(kind));
    let outcome = result.as_ref().map_or_else(ToolError::outcome, |_| "success");
    metrics.inc_tool_invocation(kind.as_str(), outcome);
    result
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_success_maps_exit_codes() {
        assert!(ToolOutput::ok("fine").into_success(ToolKind::Downloader).is_ok());

        let failed = ToolOutput {
            exit_code: Some(2),
            stdout: String::new(),
            stderr: "a\nb\n\nc\nd\ne\nf\n".to_string(),
        };
        match failed.into_success(ToolKind::Downloader) {
            Err(ToolError::NonZeroExit {
                exit_code,
                stderr_tail,
                ..
            }) => {
                assert_eq!(exit_code, Some(2));
                assert_eq!(stderr_tail, "b\nc\nd\ne\nf");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let signalled = ToolOutput {
            exit_code: None,
            ..ToolOutput::default()
        };
        assert!(!signalled.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_runner_captures_output() -> Result<(), ToolError> {
        let output = ProcessRunner
            .invoke(ToolInvocation {
                kind: ToolKind::Downloader,
                program: "sh".to_string(),
                args: vec!["-c".to_string(), "printf hello; printf oops >&2; exit 3".to_string()],
                timeout: Duration::from_secs(5),
            })
            .await?;
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "hello");
        assert_eq!(output.stderr, "oops");
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_runner_enforces_timeout() {
        let result = ProcessRunner
            .invoke(ToolInvocation {
                kind: ToolKind::Transcoder,
                program: "sleep".to_string(),
                args: vec!["5".to_string()],
                timeout: Duration::from_millis(100),
            })
            .await;
        assert!(matches!(result, Err(ToolError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn process_runner_reports_missing_binaries() {
        let result = ProcessRunner
            .invoke(ToolInvocation {
                kind: ToolKind::Downloader,
                program: "mediadrop-definitely-not-installed".to_string(),
                args: Vec::new(),
                timeout: Duration::from_secs(1),
            })
            .await;
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[tokio::test]
    async fn run_checked_records_outcomes() -> Result<(), Box<dyn std::error::Error>> {
        struct Scripted(i32);

        #[async_trait]
        impl ToolRunner for Scripted {
            async fn invoke(&self, _invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
                Ok(ToolOutput {
                    exit_code: Some(self.0),
                    ..ToolOutput::default()
                })
            }
        }

        let metrics = Metrics::new()?;
        let invocation = ToolInvocation {
            kind: ToolKind::Transcoder,
            program: "ffmpeg".to_string(),
            args: Vec::new(),
            timeout: Duration::from_secs(1),
        };
        assert!(run_checked(&Scripted(0), &metrics, invocation.clone()).await.is_ok());
        assert!(run_checked(&Scripted(1), &metrics, invocation).await.is_err());
        let rendered = metrics.render()?;
        assert!(rendered.contains("tool=\"transcoder\""));
        assert!(rendered.contains("outcome=\"failure\""));
        Ok(())
    }
}

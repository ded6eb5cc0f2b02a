//! On-demand MP3 conversion.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mediadrop_telemetry::Metrics;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::TranscodeError;
use crate::tools::{ToolInvocation, ToolKind, ToolRunner, run_checked};

/// Converts artifacts to MP3 with the external transcoder.
#[derive(Clone)]
pub struct Transcoder {
    runner: Arc<dyn ToolRunner>,
    program: String,
    timeout: Duration,
    metrics: Metrics,
}

impl Transcoder {
    /// Transcoder running `program` with `timeout`.
    #[must_use]
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        program: impl Into<String>,
        timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
            metrics,
        }
    }

    /// Produce (or reuse) the `.mp3` sibling of `source`.
    ///
    /// Output is written to a uniquely named `.part` file and renamed into
    /// place, so readers never see a half-written MP3.
    ///
    /// # Errors
    ///
    /// Returns a [`TranscodeError`] when conversion fails; callers fall back
    /// to the original artifact.
    pub async fn to_mp3(&self, source: &Path) -> Result<PathBuf, TranscodeError> {
        let target = source.with_extension("mp3");
        if target == source {
            return Ok(target);
        }
        if tokio::fs::metadata(&target)
            .await
            .is_ok_and(|meta| meta.is_file())
        {
            debug!(path = %target.display(), "reusing existing mp3");
            return Ok(target);
        }

        let target_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| TranscodeError::InvalidSource {
                path: source.to_path_buf(),
            })?;
        let partial = target.with_file_name(format!("{target_name}.{}.part", Uuid::new_v4().simple()));

        let invocation = ToolInvocation {
            kind: ToolKind::Transcoder,
            program: self.program.clone(),
            args: vec![
                "-hide_banner".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "-y".to_string(),
                "-i".to_string(),
                source.to_string_lossy().into_owned(),
                "-vn".to_string(),
                "-acodec".to_string(),
                "mp3".to_string(),
                "-ab".to_string(),
                "128k".to_string(),
                "-f".to_string(),
                "mp3".to_string(),
                partial.to_string_lossy().into_owned(),
            ],
            timeout: self.timeout,
        };

        if let Err(source) = run_checked(self.runner.as_ref(), &self.metrics, invocation).await {
            discard(&partial).await;
            return Err(TranscodeError::Tool { source });
        }
        if !tokio::fs::metadata(&partial)
            .await
            .is_ok_and(|meta| meta.is_file())
        {
            return Err(TranscodeError::MissingOutput { path: partial });
        }
        if let Err(err) = tokio::fs::rename(&partial, &target).await {
            discard(&partial).await;
            return Err(TranscodeError::Io {
                operation: "rename",
                path: target,
                source: err,
            });
        }
        info!(path = %target.display(), "mp3 transcode finished");
        Ok(target)
    }
}

async fn discard(path: &Path) {
    let _ = tokio::fs::remove_file(path).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::tools::ToolOutput;
    use anyhow::Result;
    use async_trait::async_trait;
    use mediadrop_test_support::fixtures::{scratch_dir, write_artifact};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes `payload` to the last argument, or fails when `payload` is `None`.
    struct ScriptedTranscoder {
        payload: Option<&'static [u8]>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ToolRunner for ScriptedTranscoder {
        async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let Some(payload) = self.payload else {
                return Ok(ToolOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "Invalid data found when processing input".to_string(),
                });
            };
            let output = invocation.args.last().cloned().unwrap_or_default();
            tokio::fs::write(&output, payload)
                .await
                .map_err(|source| ToolError::Spawn {
                    tool: ToolKind::Transcoder,
                    source,
                })?;
            Ok(ToolOutput::ok(""))
        }
    }

    fn transcoder(runner: Arc<ScriptedTranscoder>) -> Result<Transcoder> {
        Ok(Transcoder::new(
            runner,
            "ffmpeg",
            Duration::from_secs(5),
            Metrics::new()?,
        ))
    }

    #[tokio::test]
    async fn converts_into_sibling_mp3() -> Result<()> {
        let temp = scratch_dir()?;
        let source = write_artifact(temp.path(), "abc_movie.mp4", b"video")?;
        let runner = Arc::new(ScriptedTranscoder {
            payload: Some(b"mp3 data"),
            calls: AtomicUsize::new(0),
        });

        let output = transcoder(runner.clone())?.to_mp3(&source).await?;
        assert_eq!(output, temp.path().join("abc_movie.mp3"));
        assert_eq!(std::fs::read(&output)?, b"mp3 data");
        let leftovers = std::fs::read_dir(temp.path())?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
            .count();
        assert_eq!(leftovers, 0);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn existing_mp3_is_reused() -> Result<()> {
        let temp = scratch_dir()?;
        let source = write_artifact(temp.path(), "abc_movie.mp4", b"video")?;
        write_artifact(temp.path(), "abc_movie.mp3", b"cached")?;
        let runner = Arc::new(ScriptedTranscoder {
            payload: Some(b"fresh"),
            calls: AtomicUsize::new(0),
        });

        let output = transcoder(runner.clone())?.to_mp3(&source).await?;
        assert_eq!(std::fs::read(&output)?, b"cached");
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn failures_leave_no_output_behind() -> Result<()> {
        let temp = scratch_dir()?;
        let source = write_artifact(temp.path(), "abc_movie.mp4", b"video")?;
        let runner = Arc::new(ScriptedTranscoder {
            payload: None,
            calls: AtomicUsize::new(0),
        });

        let err = transcoder(runner)?.to_mp3(&source).await.unwrap_err();
        assert!(matches!(err, TranscodeError::Tool { .. }));
        assert!(!temp.path().join("abc_movie.mp3").exists());
        assert!(source.exists());
        Ok(())
    }
}

//! Periodic removal of orphaned artifacts.

use std::io;
use std::time::{Duration, SystemTime};

use mediadrop_events::RemovalReason;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dir::ScratchDir;
use crate::error::{ScratchError, ScratchResult};
use crate::lease::ArtifactLeases;

/// Delete regular files older than `ttl` that no stream holds.
///
/// Partial downloads left behind by failed fetches are removed the same way.
///
/// # Errors
///
/// Returns an IO error when the directory cannot be listed. Individual
/// deletion failures are logged and skipped.
pub async fn sweep_once(
    dir: &ScratchDir,
    leases: &ArtifactLeases,
    ttl: Duration,
) -> ScratchResult<usize> {
    let now = SystemTime::now();
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(dir.root())
        .await
        .map_err(|source| ScratchError::io("read_dir", dir.root(), source))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| ScratchError::io("read_dir", dir.root(), source))?
    {
        let path = entry.path();
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() || leases.is_tracked(&path) {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < ttl {
            continue;
        }
        let unlink = {
            let leases = leases.clone();
            let path = path.clone();
            tokio::task::spawn_blocking(move || leases.remove_untracked(&path))
        };
        let outcome = match unlink.await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => continue,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "orphan sweep task failed");
                continue;
            }
        };
        match outcome {
            Ok(()) => {
                removed += 1;
                leases.record_removal(&path, RemovalReason::Sweep);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "orphan sweep failed"),
        }
    }
    Ok(removed)
}

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the current pass to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.task).await {
            warn!(error = %err, "sweeper task ended abnormally");
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}

/// Spawn a task running [`sweep_once`] every `interval`.
#[must_use]
pub fn spawn_sweeper(
    dir: ScratchDir,
    leases: ArtifactLeases,
    interval: Duration,
    ttl: Duration,
) -> SweeperHandle {
    let (tx, mut rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = &mut rx => {
                    debug!("sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match sweep_once(&dir, &leases, ttl).await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "orphaned artifacts swept"),
                        Err(err) => warn!(error = %err, "orphan sweep failed"),
                    }
                }
            }
        }
    });
    SweeperHandle {
        shutdown: Some(tx),
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use mediadrop_events::EventBus;
    use mediadrop_telemetry::Metrics;
    use mediadrop_test_support::fixtures::{scratch_dir, write_artifact};
    use tempfile::TempDir;

    async fn setup() -> Result<(TempDir, ScratchDir, ArtifactLeases, Metrics)> {
        let temp = scratch_dir()?;
        let dir = ScratchDir::ensure(temp.path()).await?;
        let metrics = Metrics::new()?;
        let leases = ArtifactLeases::new(Duration::from_secs(60), EventBus::new(), metrics.clone());
        Ok((temp, dir, leases, metrics))
    }

    #[tokio::test]
    async fn sweep_removes_only_unleased_expired_files() -> Result<()> {
        let (_guard, dir, leases, metrics) = setup().await?;
        let orphan = write_artifact(dir.root(), "old_orphan.mp4", b"x")?;
        let partial = write_artifact(dir.root(), "old_partial.mp4.part", b"x")?;
        let leased = write_artifact(dir.root(), "old_leased.mp4", b"x")?;
        std::fs::create_dir(dir.root().join("subdir"))?;
        let lease = leases.acquire(&leased);

        let removed = sweep_once(&dir, &leases, Duration::ZERO).await?;
        assert_eq!(removed, 2);
        assert!(!orphan.exists());
        assert!(!partial.exists());
        assert!(leased.exists());
        assert!(dir.root().join("subdir").exists());
        assert_eq!(metrics.artifacts_removed("sweep"), 2);
        drop(lease);
        Ok(())
    }

    #[tokio::test]
    async fn sweep_keeps_fresh_files() -> Result<()> {
        let (_guard, dir, leases, _metrics) = setup().await?;
        let fresh = write_artifact(dir.root(), "new_file.mp4", b"x")?;
        let removed = sweep_once(&dir, &leases, Duration::from_secs(3600)).await?;
        assert_eq!(removed, 0);
        assert!(fresh.exists());
        Ok(())
    }

    #[tokio::test]
    async fn spawned_sweeper_runs_and_shuts_down() -> Result<()> {
        let (_guard, dir, leases, _metrics) = setup().await?;
        let orphan = write_artifact(dir.root(), "old_orphan.mp4", b"x")?;
        let handle = spawn_sweeper(dir, leases, Duration::from_millis(20), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!orphan.exists());
        handle.shutdown().await;
        Ok(())
    }
}

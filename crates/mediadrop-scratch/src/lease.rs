//! Reference-counted artifact leases with deferred deletion.
//!
//! Every in-flight stream holds a [`Lease`] on the artifacts it reads. When
//! the last lease on a path is released, deletion is scheduled after a grace
//! delay. Acquiring the path again before the delay fires cancels it.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mediadrop_events::{Event, EventBus, RemovalReason};
use mediadrop_telemetry::Metrics;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Registry of in-flight artifact readers.
#[derive(Clone)]
pub struct ArtifactLeases {
    inner: Arc<LeaseInner>,
}

struct LeaseInner {
    delay: Duration,
    entries: Mutex<HashMap<PathBuf, LeaseEntry>>,
    events: EventBus,
    metrics: Metrics,
}

#[derive(Debug, Default)]
struct LeaseEntry {
    active: usize,
    generation: u64,
}

impl ArtifactLeases {
    /// Registry that deletes released artifacts after `delay`.
    #[must_use]
    pub fn new(delay: Duration, events: EventBus, metrics: Metrics) -> Self {
        Self {
            inner: Arc::new(LeaseInner {
                delay,
                entries: Mutex::new(HashMap::new()),
                events,
                metrics,
            }),
        }
    }

    /// Take a lease on `path`, cancelling any pending deletion.
    #[must_use]
    pub fn acquire(&self, path: impl Into<PathBuf>) -> Lease {
        let mut lease = Lease {
            leases: self.clone(),
            paths: Vec::with_capacity(2),
        };
        lease.include(path);
        lease
    }

    /// Whether `path` has active readers or a pending deletion.
    #[must_use]
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    /// Number of active leases on `path`.
    #[must_use]
    pub fn active(&self, path: &Path) -> usize {
        self.lock().get(path).map_or(0, |entry| entry.active)
    }

    pub(crate) fn record_removal(&self, path: &Path, reason: RemovalReason) {
        let artifact = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(artifact = %artifact, reason = reason.as_str(), "artifact removed");
        self.inner.metrics.inc_artifact_removed(reason.as_str());
        self.inner
            .events
            .publish(Event::ArtifactRemoved { artifact, reason });
    }

    /// Unlink `path` unless a lease holds it; `None` when it is tracked.
    pub(crate) fn remove_untracked(&self, path: &Path) -> Option<io::Result<()>> {
        let entries = self.lock();
        if entries.contains_key(path) {
            return None;
        }
        Some(std::fs::remove_file(path))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, LeaseEntry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn retain(&self, path: &Path) {
        let mut entries = self.lock();
        let entry = entries.entry(path.to_path_buf()).or_default();
        entry.active += 1;
        entry.generation = entry.generation.wrapping_add(1);
    }

    fn release(&self, path: PathBuf) {
        let generation = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(&path) else {
                return;
            };
            entry.active = entry.active.saturating_sub(1);
            if entry.active > 0 {
                return;
            }
            entry.generation = entry.generation.wrapping_add(1);
            entry.generation
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!(path = %path.display(), "no runtime to schedule cleanup; leaving artifact for the sweeper");
            self.lock().remove(&path);
            return;
        };
        let leases = self.clone();
        runtime.spawn(async move {
            tokio::time::sleep(leases.inner.delay).await;
            let path_for_log = path.clone();
            let removal =
                tokio::task::spawn_blocking(move || leases.remove_if_idle(&path, generation));
            if let Err(err) = removal.await {
                warn!(path = %path_for_log.display(), error = %err, "artifact cleanup task failed");
            }
        });
    }

    /// Unlinks while holding the registry lock, so a lease taken concurrently
    /// either cancels the removal or observes the file already gone.
    fn remove_if_idle(&self, path: &Path, generation: u64) {
        let removed = {
            let mut entries = self.lock();
            match entries.get(path) {
                Some(entry) if entry.active == 0 && entry.generation == generation => {
                    entries.remove(path);
                }
                _ => return,
            }
            std::fs::remove_file(path)
        };

        match removed {
            Ok(()) => self.record_removal(path, RemovalReason::Cleanup),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "artifact cleanup failed");
            }
        }
    }
}

/// Lease over one or more artifacts; released on drop.
pub struct Lease {
    leases: ArtifactLeases,
    paths: Vec<PathBuf>,
}

impl Lease {
    /// Extend the lease to a derived artifact, such as a transcoded sibling.
    pub fn include(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.paths.contains(&path) {
            return;
        }
        self.leases.retain(&path);
        self.paths.push(path);
    }

    /// Paths covered by this lease.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            self.leases.release(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use mediadrop_test_support::fixtures::{scratch_dir, write_artifact};

    const DELAY: Duration = Duration::from_millis(50);
    const SETTLE: Duration = Duration::from_millis(250);

    fn leases() -> Result<(ArtifactLeases, EventBus, Metrics)> {
        let events = EventBus::new();
        let metrics = Metrics::new()?;
        Ok((
            ArtifactLeases::new(DELAY, events.clone(), metrics.clone()),
            events,
            metrics,
        ))
    }

    #[tokio::test]
    async fn released_artifact_is_deleted_after_delay() -> Result<()> {
        let temp = scratch_dir()?;
        let path = write_artifact(temp.path(), "abc_movie.mp4", b"data")?;
        let (leases, events, metrics) = leases()?;

        let lease = leases.acquire(&path);
        assert_eq!(leases.active(&path), 1);
        drop(lease);
        assert!(path.exists(), "deletion must wait for the grace delay");

        tokio::time::sleep(SETTLE).await;
        assert!(!path.exists());
        assert!(!leases.is_tracked(&path));
        assert_eq!(metrics.artifacts_removed("cleanup"), 1);

        let mut stream = events.subscribe(Some(0));
        let envelope = stream.next().await;
        assert!(matches!(
            envelope.map(|item| item.event),
            Some(Event::ArtifactRemoved {
                reason: RemovalReason::Cleanup,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn reacquire_before_delay_cancels_deletion() -> Result<()> {
        let temp = scratch_dir()?;
        let path = write_artifact(temp.path(), "abc_movie.mp4", b"data")?;
        let (leases, _events, _metrics) = leases()?;

        drop(leases.acquire(&path));
        let second = leases.acquire(&path);
        tokio::time::sleep(SETTLE).await;
        assert!(path.exists(), "a live lease must keep the artifact");

        drop(second);
        tokio::time::sleep(SETTLE).await;
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn overlapping_leases_delete_only_after_the_last() -> Result<()> {
        let temp = scratch_dir()?;
        let path = write_artifact(temp.path(), "abc_movie.mp4", b"data")?;
        let (leases, _events, _metrics) = leases()?;

        let first = leases.acquire(&path);
        let second = leases.acquire(&path);
        assert_eq!(leases.active(&path), 2);
        drop(first);
        tokio::time::sleep(SETTLE).await;
        assert!(path.exists());

        drop(second);
        tokio::time::sleep(SETTLE).await;
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn included_siblings_are_cleaned_together() -> Result<()> {
        let temp = scratch_dir()?;
        let original = write_artifact(temp.path(), "abc_movie.mp4", b"video")?;
        let derived = write_artifact(temp.path(), "abc_movie.mp3", b"audio")?;
        let (leases, _events, metrics) = leases()?;

        let mut lease = leases.acquire(&original);
        lease.include(&derived);
        lease.include(&derived);
        assert_eq!(lease.paths().len(), 2);
        assert_eq!(leases.active(&derived), 1);
        drop(lease);

        tokio::time::sleep(SETTLE).await;
        assert!(!original.exists());
        assert!(!derived.exists());
        assert_eq!(metrics.artifacts_removed("cleanup"), 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn leased_file_survives_racing_cleanup() -> Result<()> {
        let temp = scratch_dir()?;
        let events = EventBus::new();
        let leases = ArtifactLeases::new(Duration::ZERO, events, Metrics::new()?);

        for attempt in 0..200 {
            let path = write_artifact(temp.path(), &format!("abc{attempt}_movie.mp4"), b"data")?;
            drop(leases.acquire(&path));
            tokio::task::yield_now().await;

            let lease = leases.acquire(&path);
            let present = path.exists();
            tokio::time::sleep(Duration::from_millis(2)).await;
            assert_eq!(leases.active(&path), 1);
            if present {
                assert!(path.exists(), "attempt {attempt}: leased artifact was deleted");
            }
            drop(lease);
        }
        Ok(())
    }

    #[tokio::test]
    async fn untracked_removal_skips_leased_files() -> Result<()> {
        let temp = scratch_dir()?;
        let held = write_artifact(temp.path(), "abc_held.mp4", b"data")?;
        let loose = write_artifact(temp.path(), "abc_loose.mp4", b"data")?;
        let (leases, _events, _metrics) = leases()?;

        let lease = leases.acquire(&held);
        assert!(leases.remove_untracked(&held).is_none());
        assert!(held.exists());
        assert!(matches!(leases.remove_untracked(&loose), Some(Ok(()))));
        assert!(!loose.exists());
        drop(lease);
        Ok(())
    }

    #[tokio::test]
    async fn missing_files_are_not_an_error() -> Result<()> {
        let temp = scratch_dir()?;
        let path = temp.path().join("abc_gone.mp4");
        let (leases, _events, metrics) = leases()?;
        drop(leases.acquire(&path));
        tokio::time::sleep(SETTLE).await;
        assert!(!leases.is_tracked(&path));
        assert_eq!(metrics.artifacts_removed("cleanup"), 0);
        Ok(())
    }
}

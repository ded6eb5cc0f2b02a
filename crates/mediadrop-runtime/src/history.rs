//! JSON-file history store.
//!
//! # Design
//! - Writes go to a temporary sibling and are renamed into place.
//! - A process-local lock serializes read-modify-write cycles.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{HistoryError, HistoryResult};

/// Maximum number of entries kept on disk.
pub const HISTORY_CAPACITY: usize = 100;
/// Number of entries returned by [`HistoryStore::recent`].
pub const HISTORY_PAGE: usize = 20;

/// A stored history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unix milliseconds at insertion, unique within the file.
    pub id: i64,
    /// Source URL.
    pub url: String,
    /// Platform tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Media title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Size label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Client- or server-supplied ISO-8601 timestamp.
    pub timestamp: String,
}

/// Fields supplied by clients when recording a download.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewHistoryEntry {
    /// Source URL.
    pub url: String,
    /// Platform tag.
    #[serde(default)]
    pub platform: Option<String>,
    /// Media title.
    #[serde(default)]
    pub title: Option<String>,
    /// Size label.
    #[serde(default)]
    pub size: Option<String>,
    /// Optional timestamp; defaults to now.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// History store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    /// Store at `path`; the file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The most recent [`HISTORY_PAGE`] entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub async fn recent(&self) -> HistoryResult<Vec<HistoryEntry>> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let skip = entries.len().saturating_sub(HISTORY_PAGE);
        Ok(entries.split_off(skip))
    }

    /// Append an entry, trimming the file to [`HISTORY_CAPACITY`].
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, parsed or replaced.
    pub async fn append(&self, new: NewHistoryEntry) -> HistoryResult<HistoryEntry> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;

        let now = Utc::now();
        let mut id = now.timestamp_millis();
        if let Some(last) = entries.last() {
            id = id.max(last.id.saturating_add(1));
        }
        let entry = HistoryEntry {
            id,
            url: new.url,
            platform: new.platform,
            title: new.title,
            size: new.size,
            timestamp: new
                .timestamp
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        };
        entries.push(entry.clone());
        let excess = entries.len().saturating_sub(HISTORY_CAPACITY);
        entries.drain(..excess);

        self.store(&entries).await?;
        debug!(id = entry.id, total = entries.len(), "history entry recorded");
        Ok(entry)
    }

    async fn load(&self) -> HistoryResult<Vec<HistoryEntry>> {
        let raw = match tokio::fs::read(self.path.as_path()).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(HistoryError::io("read", self.path.as_path(), err)),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&raw).map_err(|source| HistoryError::Corrupt {
            path: self.path.to_path_buf(),
            source,
        })
    }

    async fn store(&self, entries: &[HistoryEntry]) -> HistoryResult<()> {
        let encoded =
            serde_json::to_vec_pretty(entries).map_err(|source| HistoryError::Encode { source })?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| HistoryError::io("create_dir_all", parent, err))?;
        }
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history.json".to_string());
        let temp = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&temp, encoded)
            .await
            .map_err(|err| HistoryError::io("write", &temp, err))?;
        if let Err(err) = tokio::fs::rename(&temp, self.path.as_path()).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(HistoryError::io("rename", self.path.as_path(), err));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use mediadrop_test_support::fixtures::{scratch_dir, write_artifact};

    fn entry(url: &str) -> NewHistoryEntry {
        NewHistoryEntry {
            url: url.to_string(),
            platform: Some("YouTube".to_string()),
            title: Some("Title".to_string()),
            size: Some("1.0 MB".to_string()),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() -> Result<()> {
        let temp = scratch_dir()?;
        let store = HistoryStore::new(temp.path().join("nested").join("history.json"));
        assert!(store.recent().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn append_persists_and_assigns_increasing_ids() -> Result<()> {
        let temp = scratch_dir()?;
        let store = HistoryStore::new(temp.path().join("nested").join("history.json"));

        let first = store.append(entry("https://a")).await?;
        let second = store.append(entry("https://b")).await?;
        assert!(second.id > first.id);
        assert!(first.timestamp.ends_with('Z'));

        let reopened = HistoryStore::new(store.path().to_path_buf());
        let entries = reopened.recent().await?;
        assert_eq!(entries, vec![first, second]);
        Ok(())
    }

    #[tokio::test]
    async fn capacity_and_page_limits_apply() -> Result<()> {
        let temp = scratch_dir()?;
        let store = HistoryStore::new(temp.path().join("history.json"));
        for index in 0..105 {
            store.append(entry(&format!("https://example.com/{index}"))).await?;
        }

        let raw = std::fs::read(store.path())?;
        let on_disk: Vec<HistoryEntry> = serde_json::from_slice(&raw)?;
        assert_eq!(on_disk.len(), HISTORY_CAPACITY);
        assert_eq!(on_disk[0].url, "https://example.com/5");

        let recent = store.recent().await?;
        assert_eq!(recent.len(), HISTORY_PAGE);
        assert_eq!(recent[0].url, "https://example.com/85");
        assert_eq!(recent[HISTORY_PAGE - 1].url, "https://example.com/104");
        Ok(())
    }

    #[tokio::test]
    async fn client_timestamp_is_kept_and_optional_fields_omitted() -> Result<()> {
        let temp = scratch_dir()?;
        let store = HistoryStore::new(temp.path().join("history.json"));
        let saved = store
            .append(NewHistoryEntry {
                url: "https://x".to_string(),
                timestamp: Some("2024-01-01T00:00:00.000Z".to_string()),
                ..NewHistoryEntry::default()
            })
            .await?;
        assert_eq!(saved.timestamp, "2024-01-01T00:00:00.000Z");
        let json = serde_json::to_value(&saved)?;
        assert!(json.get("platform").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_files_are_reported() -> Result<()> {
        let temp = scratch_dir()?;
        let path = write_artifact(temp.path(), "history.json", b"{not json")?;
        let store = HistoryStore::new(path);
        assert!(matches!(
            store.recent().await,
            Err(HistoryError::Corrupt { .. })
        ));
        Ok(())
    }
}

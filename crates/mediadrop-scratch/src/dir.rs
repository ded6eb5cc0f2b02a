//! The scratch directory and path containment.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{ScratchError, ScratchResult};

/// Suffixes of files the downloader is still writing.
const IN_PROGRESS_SUFFIXES: [&str; 3] = [".part", ".ytdl", ".temp"];

/// Canonicalized scratch directory shared by the fetch and stream paths.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: Arc<PathBuf>,
}

impl ScratchDir {
    /// Create the directory if needed and canonicalize it.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the directory cannot be created or resolved.
    pub async fn ensure(root: impl AsRef<Path>) -> ScratchResult<Self> {
        let root = root.as_ref();
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|source| ScratchError::io("create_dir_all", root, source))?;
        let canonical = tokio::fs::canonicalize(root)
            .await
            .map_err(|source| ScratchError::io("canonicalize", root, source))?;
        debug!(path = %canonical.display(), "scratch directory ready");
        Ok(Self {
            root: Arc::new(canonical),
        })
    }

    /// Canonical root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a client-supplied file name to a path inside the directory.
    ///
    /// The file does not need to exist. When it does, symlinks are resolved
    /// and the target must still live under the root.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` for empty names, separators, NUL bytes, `.`/`..`,
    /// absolute paths, or anything resolving outside the root.
    pub async fn resolve(&self, name: &str) -> ScratchResult<PathBuf> {
        if name.is_empty() {
            return Err(ScratchError::denied(name, "empty_name"));
        }
        if name.contains(['/', '\\', '\0']) {
            return Err(ScratchError::denied(name, "path_separator"));
        }
        let relative = Path::new(name);
        if relative.is_absolute() {
            return Err(ScratchError::denied(name, "absolute_path"));
        }
        let mut components = relative.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(ScratchError::denied(name, "not_a_file_name")),
        }

        let candidate = self.root.join(relative);
        if tokio::fs::symlink_metadata(&candidate).await.is_ok() {
            let canonical = tokio::fs::canonicalize(&candidate)
                .await
                .map_err(|source| ScratchError::io("canonicalize", &candidate, source))?;
            if !canonical.starts_with(self.root.as_path()) {
                return Err(ScratchError::denied(name, "escapes_scratch_dir"));
            }
        }
        Ok(candidate)
    }

    /// First completed regular file whose name starts with `prefix`, in
    /// lexical order.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the directory cannot be listed.
    pub async fn find_by_prefix(&self, prefix: &str) -> ScratchResult<Option<PathBuf>> {
        let mut matches = Vec::new();
        let mut entries = tokio::fs::read_dir(self.root.as_path())
            .await
            .map_err(|source| ScratchError::io("read_dir", self.root.as_path(), source))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| ScratchError::io("read_dir", self.root.as_path(), source))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with(prefix)
                || IN_PROGRESS_SUFFIXES
                    .iter()
                    .any(|suffix| name.ends_with(suffix))
            {
                continue;
            }
            let is_file = entry
                .file_type()
                .await
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            if is_file {
                matches.push(name);
            }
        }
        matches.sort();
        Ok(matches.into_iter().next().map(|name| self.root.join(name)))
    }
}

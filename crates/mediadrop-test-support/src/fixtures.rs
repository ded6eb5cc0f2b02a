//! Scratch directory and artifact fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Create a fresh temporary directory usable as a scratch root.
///
/// # Errors
///
/// Returns an error if the temporary directory cannot be created.
pub fn scratch_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("mediadrop-scratch-")
        .tempdir()
        .context("failed to create temporary scratch directory")
}

/// Deterministic byte at `offset` for patterned artifacts.
#[must_use]
pub fn pattern_byte(offset: u64) -> u8 {
    // 251 is prime so windows at different offsets rarely line up.
    u8::try_from(offset % 251).unwrap_or_default()
}

/// Expected bytes for the inclusive window `start..=end` of a patterned artifact.
#[must_use]
pub fn pattern_window(start: u64, end: u64) -> Vec<u8> {
    (start..=end).map(pattern_byte).collect()
}

/// Write a patterned artifact of `len` bytes named `name` inside `dir`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_patterned(dir: &Path, name: &str, len: u64) -> Result<PathBuf> {
    let path = dir.join(name);
    let bytes: Vec<u8> = (0..len).map(pattern_byte).collect();
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Write an artifact with the provided contents.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_artifact(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterned_artifact_matches_window() -> Result<()> {
        let dir = scratch_dir()?;
        let path = write_patterned(dir.path(), "abc_movie.mp4", 600)?;
        let bytes = fs::read(path)?;
        assert_eq!(bytes.len(), 600);
        assert_eq!(&bytes[250..=300], pattern_window(250, 300).as_slice());
        Ok(())
    }

    #[test]
    fn write_artifact_persists_contents() -> Result<()> {
        let dir = scratch_dir()?;
        let path = write_artifact(dir.path(), "abc_clip.webm", b"data")?;
        assert_eq!(fs::read(path)?, b"data");
        Ok(())
    }
}

//! Artifact naming convention: `{uniqueId}_{label}.{ext}`.

use std::path::Path;

use crate::error::{ScratchError, ScratchResult};

/// A parsed artifact file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactName<'a> {
    file_name: &'a str,
    id: &'a str,
}

impl<'a> ArtifactName<'a> {
    /// Parse a bare file name.
    ///
    /// # Errors
    ///
    /// Returns `AccessDenied` unless the name starts with a non-empty run of
    /// ASCII alphanumerics or `-` followed by `_`.
    pub fn parse(file_name: &'a str) -> ScratchResult<Self> {
        let (id, _) = file_name
            .split_once('_')
            .ok_or_else(|| ScratchError::denied(file_name, "missing_unique_id"))?;
        if id.is_empty()
            || !id
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        {
            return Err(ScratchError::denied(file_name, "invalid_unique_id"));
        }
        Ok(Self { file_name, id })
    }

    /// Full file name.
    #[must_use]
    pub const fn as_str(&self) -> &'a str {
        self.file_name
    }

    /// The unique id namespacing this artifact.
    #[must_use]
    pub const fn unique_id(&self) -> &'a str {
        self.id
    }

    /// Lower-cased extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Sibling name with the extension replaced (or appended).
    #[must_use]
    pub fn with_extension(&self, extension: &str) -> String {
        Path::new(self.file_name)
            .with_extension(extension)
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uuid_and_short_ids() -> ScratchResult<()> {
        let name = ArtifactName::parse("5f0c2a9e-1b7d-4c1e-9a53-0d5b8f1e2c3a_Some Title.mp4")?;
        assert_eq!(name.unique_id(), "5f0c2a9e-1b7d-4c1e-9a53-0d5b8f1e2c3a");
        assert_eq!(name.extension().as_deref(), Some("mp4"));

        let short = ArtifactName::parse("abc123_movie.MP4")?;
        assert_eq!(short.unique_id(), "abc123");
        assert_eq!(short.extension().as_deref(), Some("mp4"));
        assert_eq!(short.as_str(), "abc123_movie.MP4");
        Ok(())
    }

    #[test]
    fn rejects_names_without_a_valid_prefix() {
        for bad in ["movie.mp4", "_movie.mp4", "ab.c_movie.mp4", "../x_y.mp4", ""] {
            let err = ArtifactName::parse(bad).unwrap_err();
            assert!(err.is_access_denied(), "{bad} should be denied");
        }
    }

    #[test]
    fn with_extension_swaps_suffix() -> ScratchResult<()> {
        let name = ArtifactName::parse("abc123_movie.mp4")?;
        assert_eq!(name.with_extension("mp3"), "abc123_movie.mp3");
        let bare = ArtifactName::parse("abc123_instagram")?;
        assert_eq!(bare.with_extension("mp3"), "abc123_instagram.mp3");
        assert_eq!(bare.extension(), None);
        Ok(())
    }
}

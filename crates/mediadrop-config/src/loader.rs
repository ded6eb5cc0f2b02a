//! Environment-driven configuration loading.
//!
//! # Design
//! - Parsing is a pure function over a key lookup so tests never mutate the
//!   process environment.
//! - Blank values are treated as unset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    AppConfig, CleanupConfig, HandleConfig, HttpConfig, StorageConfig, TelemetryConfig,
    ToolConfig,
};
use crate::validate::{
    parse_bind_addr, parse_log_format, parse_port, parse_seconds, validate_secret,
};

/// Listener IP variable.
pub const ENV_BIND_ADDR: &str = "MEDIADROP_BIND_ADDR";
/// Listener port variable.
pub const ENV_HTTP_PORT: &str = "MEDIADROP_HTTP_PORT";
/// Scratch directory variable.
pub const ENV_SCRATCH_DIR: &str = "MEDIADROP_SCRATCH_DIR";
/// History file variable.
pub const ENV_HISTORY_FILE: &str = "MEDIADROP_HISTORY_FILE";
/// Downloader executable variable.
pub const ENV_DOWNLOADER_BIN: &str = "MEDIADROP_DOWNLOADER_BIN";
/// Transcoder executable variable.
pub const ENV_TRANSCODER_BIN: &str = "MEDIADROP_TRANSCODER_BIN";
/// Metadata timeout variable.
pub const ENV_METADATA_TIMEOUT: &str = "MEDIADROP_METADATA_TIMEOUT_SECS";
/// Download timeout variable.
pub const ENV_DOWNLOAD_TIMEOUT: &str = "MEDIADROP_DOWNLOAD_TIMEOUT_SECS";
/// Transcode timeout variable.
pub const ENV_TRANSCODE_TIMEOUT: &str = "MEDIADROP_TRANSCODE_TIMEOUT_SECS";
/// Cleanup grace delay variable.
pub const ENV_CLEANUP_DELAY: &str = "MEDIADROP_CLEANUP_DELAY_SECS";
/// Sweep interval variable.
pub const ENV_SWEEP_INTERVAL: &str = "MEDIADROP_SWEEP_INTERVAL_SECS";
/// Orphan TTL variable.
pub const ENV_ARTIFACT_TTL: &str = "MEDIADROP_ARTIFACT_TTL_SECS";
/// Handle secret variable.
pub const ENV_HANDLE_SECRET: &str = "MEDIADROP_HANDLE_SECRET";
/// Handle TTL variable.
pub const ENV_HANDLE_TTL: &str = "MEDIADROP_HANDLE_TTL_SECS";
/// Log level variable.
pub const ENV_LOG_LEVEL: &str = "MEDIADROP_LOG_LEVEL";
/// Log format variable.
pub const ENV_LOG_FORMAT: &str = "MEDIADROP_LOG_FORMAT";
/// YouTube Data API key variable.
pub const ENV_YOUTUBE_API_KEY: &str = "YOUTUBE_API_KEY";

impl AppConfig {
    /// Load configuration from the process environment, resolving relative
    /// defaults against the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the working directory is unavailable or any
    /// variable fails validation.
    pub fn from_env() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(|source| ConfigError::WorkingDirectory { source })?;
        Self::from_lookup(&cwd, |key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` for the first variable that fails validation.
    pub fn from_lookup<F>(cwd: &Path, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = match get(ENV_BIND_ADDR) {
            Some(raw) => parse_bind_addr(ENV_BIND_ADDR, &raw)?,
            None => parse_bind_addr(ENV_BIND_ADDR, defaults::BIND_ADDR)?,
        };
        let port = get(ENV_HTTP_PORT)
            .map(|raw| parse_port(ENV_HTTP_PORT, &raw))
            .transpose()?
            .unwrap_or(defaults::HTTP_PORT);

        let scratch_dir = path_or_default(get(ENV_SCRATCH_DIR), cwd, defaults::SCRATCH_DIR);
        let history_file = path_or_default(get(ENV_HISTORY_FILE), cwd, defaults::HISTORY_FILE);

        let seconds = |key: &'static str, default: u64, allow_zero: bool| -> ConfigResult<Duration> {
            get(key).map_or(Ok(Duration::from_secs(default)), |raw| {
                parse_seconds(key, &raw, allow_zero)
            })
        };

        let tools = ToolConfig {
            downloader_bin: get(ENV_DOWNLOADER_BIN)
                .unwrap_or_else(|| defaults::DOWNLOADER_BIN.to_string()),
            transcoder_bin: get(ENV_TRANSCODER_BIN)
                .unwrap_or_else(|| defaults::TRANSCODER_BIN.to_string()),
            metadata_timeout: seconds(ENV_METADATA_TIMEOUT, defaults::METADATA_TIMEOUT_SECS, false)?,
            download_timeout: seconds(ENV_DOWNLOAD_TIMEOUT, defaults::DOWNLOAD_TIMEOUT_SECS, false)?,
            transcode_timeout: seconds(
                ENV_TRANSCODE_TIMEOUT,
                defaults::TRANSCODE_TIMEOUT_SECS,
                false,
            )?,
        };

        let cleanup = CleanupConfig {
            delay: seconds(ENV_CLEANUP_DELAY, defaults::CLEANUP_DELAY_SECS, true)?,
            sweep_interval: seconds(ENV_SWEEP_INTERVAL, defaults::SWEEP_INTERVAL_SECS, false)?,
            artifact_ttl: seconds(ENV_ARTIFACT_TTL, defaults::ARTIFACT_TTL_SECS, false)?,
        };

        let handles = HandleConfig {
            secret: lookup(ENV_HANDLE_SECRET)
                .filter(|value| !value.is_empty())
                .map(|raw| validate_secret(ENV_HANDLE_SECRET, &raw))
                .transpose()?,
            ttl: seconds(ENV_HANDLE_TTL, defaults::HANDLE_TTL_SECS, false)?,
        };

        let telemetry = TelemetryConfig {
            log_level: get(ENV_LOG_LEVEL).unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
            log_format: get(ENV_LOG_FORMAT)
                .map(|raw| parse_log_format(ENV_LOG_FORMAT, &raw))
                .transpose()?,
        };

        let config = Self {
            http: HttpConfig { bind_addr, port },
            storage: StorageConfig {
                scratch_dir,
                history_file,
            },
            tools,
            cleanup,
            handles,
            telemetry,
            youtube_api_key: get(ENV_YOUTUBE_API_KEY),
        };
        debug!(
            addr = %config.http.socket_addr(),
            scratch_dir = %config.storage.scratch_dir.display(),
            "configuration loaded"
        );
        Ok(config)
    }
}

fn path_or_default(value: Option<String>, cwd: &Path, default: &str) -> PathBuf {
    value.map_or_else(|| cwd.join(default), |raw| {
        let path = PathBuf::from(raw);
        if path.is_absolute() { path } else { cwd.join(path) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> ConfigResult<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        AppConfig::from_lookup(Path::new("/srv/mediadrop"), |key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() -> ConfigResult<()> {
        let config = load(&[])?;
        assert_eq!(config.http.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(
            config.storage.scratch_dir,
            PathBuf::from("/srv/mediadrop/tmp/downloads")
        );
        assert_eq!(
            config.storage.history_file,
            PathBuf::from("/srv/mediadrop/tmp/download-history.json")
        );
        assert_eq!(config.tools.downloader_bin, "yt-dlp");
        assert_eq!(config.tools.transcoder_bin, "ffmpeg");
        assert_eq!(config.tools.download_timeout, Duration::from_secs(900));
        assert_eq!(config.cleanup.delay, Duration::from_secs(10));
        assert_eq!(config.cleanup.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.cleanup.artifact_ttl, Duration::from_secs(3600));
        assert!(config.handles.secret.is_none());
        assert_eq!(config.handles.ttl, Duration::from_secs(3600));
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.telemetry.log_format.is_none());
        assert!(config.youtube_api_key.is_none());
        Ok(())
    }

    #[test]
    fn overrides_are_parsed() -> ConfigResult<()> {
        let config = load(&[
            (ENV_BIND_ADDR, "0.0.0.0"),
            (ENV_HTTP_PORT, "8088"),
            (ENV_SCRATCH_DIR, "/var/tmp/md"),
            (ENV_HISTORY_FILE, "state/history.json"),
            (ENV_DOWNLOADER_BIN, "/opt/bin/yt-dlp"),
            (ENV_CLEANUP_DELAY, "0"),
            (ENV_HANDLE_SECRET, "0123456789abcdef0123"),
            (ENV_LOG_FORMAT, "JSON"),
            (ENV_YOUTUBE_API_KEY, "key-123"),
        ])?;
        assert_eq!(config.http.socket_addr().to_string(), "0.0.0.0:8088");
        assert_eq!(config.storage.scratch_dir, PathBuf::from("/var/tmp/md"));
        assert_eq!(
            config.storage.history_file,
            PathBuf::from("/srv/mediadrop/state/history.json")
        );
        assert_eq!(config.tools.downloader_bin, "/opt/bin/yt-dlp");
        assert_eq!(config.cleanup.delay, Duration::ZERO);
        assert_eq!(
            config.handles.secret.as_deref(),
            Some("0123456789abcdef0123")
        );
        assert_eq!(config.telemetry.log_format.as_deref(), Some("json"));
        assert_eq!(config.youtube_api_key.as_deref(), Some("key-123"));
        Ok(())
    }

    #[test]
    fn blank_values_fall_back_to_defaults() -> ConfigResult<()> {
        let config = load(&[(ENV_HTTP_PORT, "  "), (ENV_YOUTUBE_API_KEY, "")])?;
        assert_eq!(config.http.port, 3000);
        assert!(config.youtube_api_key.is_none());
        Ok(())
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let cases = [
            (ENV_HTTP_PORT, "99999"),
            (ENV_BIND_ADDR, "nowhere"),
            (ENV_DOWNLOAD_TIMEOUT, "0"),
            (ENV_HANDLE_SECRET, "tiny"),
            (ENV_LOG_FORMAT, "yaml"),
        ];
        for (key, value) in cases {
            match load(&[(key, value)]) {
                Err(ConfigError::InvalidField { field, .. }) => assert_eq!(field, key),
                other => panic!("expected invalid field for {key}, got {other:?}"),
            }
        }
    }
}

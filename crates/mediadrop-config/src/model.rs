//! Typed configuration sections.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Fully validated service configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub http: HttpConfig,
    /// Filesystem locations.
    pub storage: StorageConfig,
    /// External tool executables and timeouts.
    pub tools: ToolConfig,
    /// Artifact cleanup timings.
    pub cleanup: CleanupConfig,
    /// Retrieval handle signing.
    pub handles: HandleConfig,
    /// Logging preferences.
    pub telemetry: TelemetryConfig,
    /// Optional YouTube Data API key for metadata enrichment.
    #[serde(skip_serializing)]
    pub youtube_api_key: Option<String>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HttpConfig {
    /// Listener IP.
    pub bind_addr: IpAddr,
    /// Listener port.
    pub port: u16,
}

impl HttpConfig {
    /// Socket address the listener binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize)]
pub struct StorageConfig {
    /// Directory holding scratch artifacts.
    pub scratch_dir: PathBuf,
    /// JSON file backing the download history.
    pub history_file: PathBuf,
}

/// External tool executables and timeouts.
#[derive(Debug, Clone, Serialize)]
pub struct ToolConfig {
    /// Downloader executable name or path.
    pub downloader_bin: String,
    /// Transcoder executable name or path.
    pub transcoder_bin: String,
    /// Limit for the downloader's metadata query.
    pub metadata_timeout: Duration,
    /// Limit for a download.
    pub download_timeout: Duration,
    /// Limit for a transcode.
    pub transcode_timeout: Duration,
}

/// Artifact cleanup timings.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CleanupConfig {
    /// Grace delay between the last stream of an artifact and its deletion.
    pub delay: Duration,
    /// Orphan sweep period.
    pub sweep_interval: Duration,
    /// Age after which an unleased artifact is swept.
    pub artifact_ttl: Duration,
}

/// Retrieval handle signing.
#[derive(Clone, Serialize)]
pub struct HandleConfig {
    /// Signing key; a random key is generated when absent.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Lifetime of issued handles.
    pub ttl: Duration,
}

impl fmt::Debug for HandleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Logging preferences.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// `json` or `pretty`; inferred from the build profile when absent.
    pub log_format: Option<String>,
}

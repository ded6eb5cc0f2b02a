//! Fallback values applied when a variable is unset.

/// Listener IP.
pub const BIND_ADDR: &str = "127.0.0.1";
/// Listener port.
pub const HTTP_PORT: u16 = 3000;
/// Scratch directory, relative to the working directory.
pub const SCRATCH_DIR: &str = "tmp/downloads";
/// History store, relative to the working directory.
pub const HISTORY_FILE: &str = "tmp/download-history.json";
/// External downloader executable.
pub const DOWNLOADER_BIN: &str = "yt-dlp";
/// External transcoder executable.
pub const TRANSCODER_BIN: &str = "ffmpeg";
/// Metadata query timeout in seconds.
pub const METADATA_TIMEOUT_SECS: u64 = 60;
/// Download timeout in seconds.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 900;
/// Transcode timeout in seconds.
pub const TRANSCODE_TIMEOUT_SECS: u64 = 600;
/// Grace delay between the last stream of an artifact and its deletion.
pub const CLEANUP_DELAY_SECS: u64 = 10;
/// Orphan sweep period in seconds.
pub const SWEEP_INTERVAL_SECS: u64 = 300;
/// Age after which an unleased artifact counts as orphaned.
pub const ARTIFACT_TTL_SECS: u64 = 3600;
/// Retrieval handle lifetime in seconds.
pub const HANDLE_TTL_SECS: u64 = 3600;
/// Minimum accepted length of a configured handle secret, in bytes.
pub const MIN_HANDLE_SECRET_LEN: usize = 16;
/// Default log filter.
pub const LOG_LEVEL: &str = "info";

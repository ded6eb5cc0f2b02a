//! Shared HTTP constants (headers, problem URIs, stream settings).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "last-event-id";
pub(crate) const SSE_KEEP_ALIVE_SECS: u64 = 20;

pub(crate) const PROBLEM_INTERNAL: &str = "https://mediadrop.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://mediadrop.dev/problems/bad-request";
pub(crate) const PROBLEM_FORBIDDEN: &str = "https://mediadrop.dev/problems/forbidden";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://mediadrop.dev/problems/not-found";
pub(crate) const PROBLEM_METHOD_NOT_ALLOWED: &str =
    "https://mediadrop.dev/problems/method-not-allowed";
pub(crate) const PROBLEM_RANGE_NOT_SATISFIABLE: &str =
    "https://mediadrop.dev/problems/range-not-satisfiable";
pub(crate) const PROBLEM_DOWNLOAD_FAILED: &str = "https://mediadrop.dev/problems/download-failed";

/// Format that triggers on-demand transcoding.
pub(crate) const MP3_FORMAT: &str = "mp3";

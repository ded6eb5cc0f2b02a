//! Descriptive metadata: the downloader's print mode plus optional YouTube
//! Data API enrichment.

use std::time::Duration;

use mediadrop_telemetry::Metrics;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::tools::{ToolInvocation, ToolKind, ToolRunner, run_checked};

/// Print template understood by the downloader.
pub const METADATA_TEMPLATE: &str = "%(title)s|%(duration)s|%(filesize)s|%(thumbnail)s";

const YOUTUBE_VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";
const ENRICH_TIMEOUT: Duration = Duration::from_secs(10);

static YOUTUBE_ID: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([^&\n?#]+)").ok());

/// Descriptive fields reported alongside a download.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaMetadata {
    /// Media title.
    pub title: Option<String>,
    /// Duration in seconds.
    pub duration_secs: Option<f64>,
    /// Size estimate reported by the platform.
    pub filesize_bytes: Option<u64>,
    /// Thumbnail URL.
    pub thumbnail: Option<String>,
}

impl MediaMetadata {
    /// Parse `title|duration|filesize|thumbnail`.
    ///
    /// Fields are split from the right so titles containing `|` survive.
    /// `NA` and empty fields become `None`.
    #[must_use]
    pub fn parse(stdout: &str) -> Self {
        let Some(line) = stdout.lines().map(str::trim).find(|line| !line.is_empty()) else {
            return Self::default();
        };
        let mut fields: Vec<&str> = line.rsplitn(4, '|').collect();
        fields.reverse();
        let (title, duration, filesize, thumbnail) = match fields.as_slice() {
            [title, duration, filesize, thumbnail] => {
                (*title, Some(*duration), Some(*filesize), Some(*thumbnail))
            }
            _ => (line, None, None, None),
        };
        Self {
            title: present(title),
            duration_secs: duration.and_then(present).and_then(|raw| raw.parse().ok()),
            filesize_bytes: filesize.and_then(present).and_then(|raw| raw.parse().ok()),
            thumbnail: thumbnail.and_then(present),
        }
    }

    fn needs_enrichment(&self) -> bool {
        self.title.is_none() || self.thumbnail.is_none()
    }
}

fn present(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty() && trimmed != "NA").then(|| trimmed.to_string())
}

/// Run the downloader in print mode for `url`.
///
/// # Errors
///
/// Returns the tool failure; callers treat it as non-fatal.
pub(crate) async fn query(
    runner: &dyn ToolRunner,
    metrics: &Metrics,
    program: &str,
    url: &str,
    timeout: Duration,
) -> Result<MediaMetadata, ToolError> {
    let invocation = ToolInvocation {
        kind: ToolKind::Downloader,
        program: program.to_string(),
        args: [
            "--no-warnings",
            "--no-playlist",
            "--skip-download",
            "--print",
            METADATA_TEMPLATE,
            "--",
            url,
        ]
        .map(str::to_string)
        .into(),
        timeout,
    };
    let output = run_checked(runner, metrics, invocation).await?;
    Ok(MediaMetadata::parse(&output.stdout))
}

/// Extract the video id from a `youtube.com/watch?v=` or `youtu.be/` URL.
#[must_use]
pub fn youtube_video_id(url: &str) -> Option<&str> {
    YOUTUBE_ID
        .as_ref()?
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}

/// Fills missing titles and thumbnails from the YouTube Data API.
#[derive(Clone)]
pub struct YouTubeEnricher {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl std::fmt::Debug for YouTubeEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeEnricher")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl YouTubeEnricher {
    /// Build an enricher using `api_key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(ENRICH_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: YOUTUBE_VIDEOS_ENDPOINT.to_string(),
        })
    }

    /// Fill in missing fields of `metadata` for `url`. Failures are logged
    /// and leave `metadata` untouched.
    pub async fn enrich(&self, url: &str, metadata: &mut MediaMetadata) {
        if !metadata.needs_enrichment() {
            return;
        }
        let Some(video_id) = youtube_video_id(url) else {
            debug!("no youtube video id in url; skipping enrichment");
            return;
        };
        match self.fetch_snippet(video_id).await {
            Ok(response) => response.apply(metadata),
            Err(err) => warn!(error = %err, "youtube metadata enrichment failed"),
        }
    }

    /// Errors are stripped of their URL, which carries the API key.
    async fn fetch_snippet(&self, video_id: &str) -> Result<VideoListResponse, reqwest::Error> {
        let request = async {
            self.client
                .get(&self.endpoint)
                .query(&[
                    ("id", video_id),
                    ("key", self.api_key.as_str()),
                    ("part", "snippet"),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        };
        request.await.map_err(reqwest::Error::without_url)
    }
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl VideoListResponse {
    fn apply(self, metadata: &mut MediaMetadata) {
        let Some(item) = self.items.into_iter().next() else {
            return;
        };
        let snippet = item.snippet;
        if metadata.title.is_none() {
            metadata.title = snippet.title.filter(|title| !title.trim().is_empty());
        }
        if metadata.thumbnail.is_none() {
            metadata.thumbnail = snippet
                .thumbnails
                .medium
                .or(snippet.thumbnails.default)
                .map(|thumbnail| thumbnail.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn parse_reads_all_fields() {
        let parsed = MediaMetadata::parse("My Video|213|10485760|https://i.ytimg.com/x.jpg\n");
        assert_eq!(parsed.title.as_deref(), Some("My Video"));
        assert_eq!(parsed.duration_secs, Some(213.0));
        assert_eq!(parsed.filesize_bytes, Some(10_485_760));
        assert_eq!(parsed.thumbnail.as_deref(), Some("https://i.ytimg.com/x.jpg"));
    }

    #[test]
    fn parse_keeps_pipes_in_titles_and_maps_na() {
        let parsed = MediaMetadata::parse("Live | Act 1 | Part 2|NA|NA|NA");
        assert_eq!(parsed.title.as_deref(), Some("Live | Act 1 | Part 2"));
        assert_eq!(parsed.duration_secs, None);
        assert_eq!(parsed.filesize_bytes, None);
        assert_eq!(parsed.thumbnail, None);
    }

    #[test]
    fn parse_tolerates_short_and_empty_output() {
        assert_eq!(MediaMetadata::parse(""), MediaMetadata::default());
        let title_only = MediaMetadata::parse("\n  Just a title \n");
        assert_eq!(title_only.title.as_deref(), Some("Just a title"));
        assert_eq!(MediaMetadata::parse("NA|NA|NA|NA").title, None);
    }

    #[test]
    fn youtube_ids_are_extracted() {
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(youtube_video_id("https://youtu.be/dQw4w9WgXcQ?si=x"), Some("dQw4w9WgXcQ"));
        assert_eq!(youtube_video_id("https://vimeo.com/12345"), None);
    }

    #[test]
    fn api_response_fills_only_missing_fields() -> Result<(), serde_json::Error> {
        let response: VideoListResponse = serde_json::from_str(
            r#"{"items":[{"snippet":{"title":"From API","thumbnails":{"medium":{"url":"https://img/medium.jpg"},"default":{"url":"https://img/default.jpg"}}}}]}"#,
        )?;
        let mut metadata = MediaMetadata {
            title: Some("From downloader".to_string()),
            ..MediaMetadata::default()
        };
        response.apply(&mut metadata);
        assert_eq!(metadata.title.as_deref(), Some("From downloader"));
        assert_eq!(metadata.thumbnail.as_deref(), Some("https://img/medium.jpg"));

        let empty: VideoListResponse = serde_json::from_str(r#"{"items":[]}"#)?;
        let mut untouched = MediaMetadata::default();
        empty.apply(&mut untouched);
        assert_eq!(untouched, MediaMetadata::default());
        Ok(())
    }

    #[tokio::test]
    async fn enrichment_errors_do_not_carry_the_api_key() -> Result<(), reqwest::Error> {
        let mut enricher = YouTubeEnricher::new("SECRET-KEY-0123456789")?;
        enricher.endpoint = "http://127.0.0.1:9/videos".to_string();

        let Err(err) = enricher.fetch_snippet("dQw4w9WgXcQ").await else {
            panic!("nothing should answer on the discard port");
        };
        assert!(err.url().is_none());
        let rendered = format!("{err} {err:?}");
        assert!(!rendered.contains("SECRET-KEY-0123456789"), "{rendered}");

        let mut metadata = MediaMetadata::default();
        enricher
            .enrich("https://youtu.be/dQw4w9WgXcQ", &mut metadata)
            .await;
        assert_eq!(metadata, MediaMetadata::default());
        Ok(())
    }

    struct Recording {
        seen: Mutex<Vec<ToolInvocation>>,
        stdout: &'static str,
    }

    #[async_trait]
    impl ToolRunner for Recording {
        async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
            self.seen
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(invocation);
            Ok(ToolOutput::ok(self.stdout))
        }
    }

    #[tokio::test]
    async fn query_passes_url_as_a_single_argument() -> Result<(), Box<dyn std::error::Error>> {
        let runner = Recording {
            seen: Mutex::new(Vec::new()),
            stdout: "T|1|2|NA",
        };
        let metrics = Metrics::new()?;
        let url = "https://example.com/watch?v=1\"; rm -rf /";
        let metadata = query(&runner, &metrics, "yt-dlp", url, Duration::from_secs(5)).await?;
        assert_eq!(metadata.title.as_deref(), Some("T"));

        let seen = runner.seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let args = &seen[0].args;
        assert_eq!(args.last().map(String::as_str), Some(url));
        assert!(args.contains(&METADATA_TEMPLATE.to_string()));
        Ok(())
    }
}

//! `GET /stream`: verify a signed handle, optionally transcode, and stream
//! the artifact with byte-range support.
//!
//! # Design
//! - Checks run in order: missing `file` (400), containment (403), name,
//!   signature and expiry (403), existence (404).
//! - The response body owns the artifact lease. Dropping the body, whether
//!   finished or abandoned by the client, releases it and starts the
//!   deferred cleanup countdown.
//! - A failed transcode streams the original artifact instead.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_stream::stream;
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{
            ACCEPT_RANGES, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE,
            CONTENT_TYPE, RANGE,
        },
    },
    response::Response,
};
use futures_util::{Stream, StreamExt};
use mediadrop_events::{Event, EventBus};
use mediadrop_scratch::{ArtifactName, Lease, SignedHandle, sanitize_filename};
use mediadrop_telemetry::Metrics;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::http::constants::MP3_FORMAT;
use crate::http::errors::ApiError;
use crate::http::range::RangeRequest;
use crate::state::ApiState;

const FILE_NOT_FOUND: &str = "File not found";
const STREAM_FAILED: &str = "Failed to stream file";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamQuery {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    expires: Option<String>,
    #[serde(default)]
    sig: Option<String>,
}

pub(crate) async fn stream_artifact(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
) -> Result<Response, ApiError> {
    let Some(file) = query.file.filter(|file| !file.is_empty()) else {
        return Err(ApiError::bad_request("File parameter is required"));
    };

    let source = state.scratch.resolve(&file).await?;
    let name = ArtifactName::parse(&file)?;
    let expires = query
        .expires
        .as_deref()
        .and_then(|raw| raw.parse::<i64>().ok());
    let (Some(expires), Some(sig)) = (expires, query.sig) else {
        warn!(artifact = %file, "stream request without a signed handle");
        return Err(ApiError::forbidden());
    };
    let handle = state.signer.verify(&SignedHandle {
        file: file.clone(),
        format: query.format,
        expires,
        sig,
    })?;

    if !is_file(&source).await {
        return Err(ApiError::not_found(FILE_NOT_FOUND));
    }

    // Held from here on so cleanup cannot remove the artifact mid-transcode.
    let mut lease = state.leases.acquire(&source);
    let wants_mp3 = handle
        .requested_format
        .as_deref()
        .is_some_and(|format| format.eq_ignore_ascii_case(MP3_FORMAT));
    let already_mp3 = name.extension().as_deref() == Some(MP3_FORMAT);
    let target = if wants_mp3 && !already_mp3 {
        convert_or_fallback(&state, &source, &file, &mut lease).await
    } else {
        source
    };

    let mut artifact = File::open(&target).await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            ApiError::not_found(FILE_NOT_FOUND)
        } else {
            error!(error = %err, path = %target.display(), "failed to open artifact");
            ApiError::internal(STREAM_FAILED)
        }
    })?;
    let size = artifact
        .metadata()
        .await
        .map_err(|err| {
            error!(error = %err, path = %target.display(), "failed to stat artifact");
            ApiError::internal(STREAM_FAILED)
        })?
        .len();

    let range_header = headers.get(RANGE).and_then(|value| value.to_str().ok());
    let (status, start, length) = match RangeRequest::parse(range_header, size) {
        RangeRequest::Full => (StatusCode::OK, 0, size),
        RangeRequest::Partial { start, end } => (StatusCode::PARTIAL_CONTENT, start, end - start + 1),
        RangeRequest::Unsatisfiable => return Err(ApiError::range_not_satisfiable(size)),
    };
    if start > 0 {
        artifact.seek(SeekFrom::Start(start)).await.map_err(|err| {
            error!(error = %err, path = %target.display(), "failed to seek artifact");
            ApiError::internal(STREAM_FAILED)
        })?;
    }

    let served_name = file_name(&target);
    let builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, mime_for(&target))
        .header(CONTENT_LENGTH, length)
        .header(CACHE_CONTROL, "no-cache")
        .header(ACCEPT_RANGES, "bytes")
        .header(
            CONTENT_DISPOSITION,
            content_disposition(&sanitize_filename(&served_name)),
        );
    let builder = if status == StatusCode::PARTIAL_CONTENT {
        builder.header(
            CONTENT_RANGE,
            format!("bytes {start}-{}/{size}", start + length - 1),
        )
    } else {
        builder
    };

    let partial = status == StatusCode::PARTIAL_CONTENT;
    info!(artifact = %served_name, size, partial, "streaming artifact");
    let tracker = StreamTracker::start(
        served_name,
        partial,
        lease,
        state.events.clone(),
        state.telemetry.clone(),
    );
    builder
        .body(Body::from_stream(body_stream(artifact, length, tracker)))
        .map_err(|err| {
            error!(error = %err, "failed to build stream response");
            ApiError::internal(STREAM_FAILED)
        })
}

async fn convert_or_fallback(
    state: &ApiState,
    source: &Path,
    artifact: &str,
    lease: &mut Lease,
) -> PathBuf {
    match state.transcoder.to_mp3(source).await {
        Ok(converted) => {
            lease.include(&converted);
            converted
        }
        Err(err) => {
            warn!(error = %err, artifact, "transcode failed; streaming original");
            state.telemetry.inc_transcode_fallback();
            state.events.publish(Event::TranscodeFallback {
                artifact: artifact.to_string(),
            });
            source.to_path_buf()
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn content_disposition(file_name: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// MIME type for the artifact's extension.
pub(crate) fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Bookkeeping owned by a streaming body. Dropping it records the outcome
/// and releases the lease.
struct StreamTracker {
    artifact: String,
    bytes_sent: u64,
    completed: bool,
    events: EventBus,
    metrics: Metrics,
    _lease: Lease,
}

impl StreamTracker {
    fn start(
        artifact: String,
        partial: bool,
        lease: Lease,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        metrics.stream_started();
        events.publish(Event::StreamStarted {
            artifact: artifact.clone(),
            partial,
        });
        Self {
            artifact,
            bytes_sent: 0,
            completed: false,
            events,
            metrics,
            _lease: lease,
        }
    }
}

impl Drop for StreamTracker {
    fn drop(&mut self) {
        self.metrics.stream_finished();
        self.metrics.add_stream_bytes(self.bytes_sent);
        if !self.completed {
            debug!(artifact = %self.artifact, bytes = self.bytes_sent, "stream interrupted");
        }
        self.events.publish(Event::StreamFinished {
            artifact: std::mem::take(&mut self.artifact),
            bytes_sent: self.bytes_sent,
            completed: self.completed,
        });
    }
}

fn body_stream(
    file: File,
    length: u64,
    mut tracker: StreamTracker,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    stream! {
        let mut chunks = ReaderStream::new(file.take(length));
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => {
                    let sent = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
                    yield Ok(bytes);
                    // Resumed only after the previous chunk was taken by the writer.
                    tracker.bytes_sent = tracker.bytes_sent.saturating_add(sent);
                }
                Err(err) => {
                    error!(error = %err, artifact = %tracker.artifact, "artifact read failed mid-stream");
                    yield Err(err);
                    return;
                }
            }
        }
        tracker.completed = tracker.bytes_sent == length;
    }
}

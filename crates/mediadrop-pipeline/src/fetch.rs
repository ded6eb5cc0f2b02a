//! Fetch orchestrator: validate, download, locate, describe.
//!
//! # Design
//! - One shared routine driven by the platform strategy table.
//! - Every artifact is namespaced by a fresh UUID prefix; nothing else links
//!   a fetch to its later streams.
//! - Metadata failures never fail the fetch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mediadrop_events::{Event, EventBus};
use mediadrop_scratch::{HandleSigner, RetrievalHandle, ScratchDir, SignedHandle, sanitize_filename};
use mediadrop_telemetry::Metrics;
use tracing::{Instrument, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{FetchError, FetchResult};
use crate::metadata::{self, MediaMetadata, YouTubeEnricher};
use crate::platform::{AUDIO_VARIANT_LABEL, MediaType, Platform, PlatformStrategy};
use crate::tools::{ToolInvocation, ToolKind, ToolRunner, run_checked};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A request to fetch media.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Absolute source URL.
    pub url: String,
    /// Platform tag as sent by the client.
    pub platform: String,
}

/// One retrievable output of a fetch.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    /// Human-readable label.
    pub label: String,
    /// Signed handle to pass to `/stream`.
    pub handle: SignedHandle,
    /// Suggested download file name.
    pub filename: String,
}

/// Description of a finished fetch.
#[derive(Debug, Clone)]
pub struct DownloadDescriptor {
    /// Unique id prefixing the artifact.
    pub fetch_id: Uuid,
    /// Platform tag echoed from the request.
    pub platform: String,
    /// Media type.
    pub media_type: MediaType,
    /// Quality label.
    pub quality: String,
    /// Size rendered as `{:.1} MB`.
    pub size: String,
    /// Artifact size in bytes.
    pub size_bytes: u64,
    /// Title from metadata or the platform default.
    pub title: String,
    /// Thumbnail URL when known.
    pub thumbnail: Option<String>,
    /// Duration in seconds when known.
    pub duration_secs: Option<f64>,
    /// Artifact file name in the scratch directory.
    pub artifact: String,
    /// Retrievable outputs.
    pub downloads: Vec<DownloadEntry>,
}

/// Tool settings used by the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Downloader executable.
    pub downloader_bin: String,
    /// Metadata query limit.
    pub metadata_timeout: Duration,
    /// Download limit.
    pub download_timeout: Duration,
}

/// Drives a fetch through the platform strategy table.
#[derive(Clone)]
pub struct FetchOrchestrator {
    scratch: ScratchDir,
    signer: HandleSigner,
    runner: Arc<dyn ToolRunner>,
    settings: PipelineSettings,
    enricher: Option<YouTubeEnricher>,
    events: EventBus,
    metrics: Metrics,
}

impl FetchOrchestrator {
    /// Assemble an orchestrator.
    #[must_use]
    pub fn new(
        scratch: ScratchDir,
        signer: HandleSigner,
        runner: Arc<dyn ToolRunner>,
        settings: PipelineSettings,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            scratch,
            signer,
            runner,
            settings,
            enricher: None,
            events,
            metrics,
        }
    }

    /// Enable YouTube Data API enrichment.
    #[must_use]
    pub fn with_enricher(mut self, enricher: YouTubeEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Fetch `request.url` and describe the resulting artifact.
    ///
    /// # Errors
    ///
    /// - `InvalidUrl` before any tool runs.
    /// - `DownloadFailed` when the downloader fails or times out.
    /// - `ArtifactNotFound` when it exits cleanly without output.
    /// - `Scratch`/`Inspect` for filesystem failures.
    pub async fn fetch(&self, request: FetchRequest) -> FetchResult<DownloadDescriptor> {
        let url = validate_url(&request.url)?;
        let strategy = Platform::from_tag(&request.platform).strategy();
        let fetch_id = Uuid::new_v4();
        let span = info_span!("fetch", %fetch_id, platform = strategy.label);

        async {
            self.events.publish(Event::FetchStarted {
                fetch_id,
                platform: request.platform.clone(),
            });
            let result = self.run(fetch_id, strategy, &url, &request.platform).await;
            match &result {
                Ok(descriptor) => {
                    info!(artifact = %descriptor.artifact, size_bytes = descriptor.size_bytes, "fetch completed");
                    self.metrics.inc_fetch(strategy.label, "success");
                    self.events.publish(Event::FetchCompleted {
                        fetch_id,
                        artifact: descriptor.artifact.clone(),
                        size_bytes: descriptor.size_bytes,
                    });
                }
                Err(err) => {
                    warn!(error = %err, cause = ?std::error::Error::source(err).map(ToString::to_string), "fetch failed");
                    self.metrics.inc_fetch(strategy.label, "failure");
                    self.events.publish(Event::FetchFailed {
                        fetch_id,
                        platform: request.platform.clone(),
                        message: err.to_string(),
                    });
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        fetch_id: Uuid,
        strategy: &'static PlatformStrategy,
        url: &Url,
        platform_tag: &str,
    ) -> FetchResult<DownloadDescriptor> {
        let scratch = ScratchDir::ensure(self.scratch.root())
            .await
            .map_err(|source| FetchError::Scratch { source })?;

        let metadata = self.metadata(strategy, url).await;
        let file_label = match (&metadata.title, strategy.title_file_label) {
            (Some(title), true) => sanitize_filename(title),
            _ => strategy.label.to_string(),
        };

        let stem = scratch.root().join(format!("{fetch_id}_{file_label}"));
        let template = format!("{}.%(ext)s", escape_template(&stem.to_string_lossy()));
        let mut args: Vec<String> = ["--no-warnings", "--no-playlist", "--no-progress"]
            .map(str::to_string)
            .into();
        if let Some(selector) = strategy.format_selector {
            args.extend(["-f".to_string(), selector.to_string()]);
        }
        args.extend([
            "-o".to_string(),
            template,
            "--".to_string(),
            url.as_str().to_string(),
        ]);
        run_checked(
            self.runner.as_ref(),
            &self.metrics,
            ToolInvocation {
                kind: ToolKind::Downloader,
                program: self.settings.downloader_bin.clone(),
                args,
                timeout: self.settings.download_timeout,
            },
        )
        .await
        .map_err(|source| FetchError::DownloadFailed {
            platform: strategy.label,
            source,
        })?;

        let prefix = if strategy.title_file_label {
            format!("{fetch_id}_")
        } else {
            format!("{fetch_id}_{}", strategy.label)
        };
        let path = scratch
            .find_by_prefix(&prefix)
            .await
            .map_err(|source| FetchError::Scratch { source })?
            .ok_or(FetchError::ArtifactNotFound {
                platform: strategy.label,
            })?;
        let size_bytes = tokio::fs::metadata(&path)
            .await
            .map_err(|source| FetchError::Inspect {
                path: path.clone(),
                source,
            })?
            .len();
        let artifact = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(FetchError::ArtifactNotFound {
                platform: strategy.label,
            })?;

        let extension = Path::new(&artifact)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        let media_type = strategy.media_type.resolve(extension.as_deref());
        let downloads = self.entries(strategy, &artifact, media_type);

        Ok(DownloadDescriptor {
            fetch_id,
            platform: platform_tag.to_string(),
            media_type,
            quality: strategy.quality.to_string(),
            size: format_megabytes(size_bytes),
            size_bytes,
            title: metadata
                .title
                .unwrap_or_else(|| strategy.default_title.to_string()),
            thumbnail: metadata.thumbnail,
            duration_secs: metadata.duration_secs,
            artifact,
            downloads,
        })
    }

    async fn metadata(&self, strategy: &PlatformStrategy, url: &Url) -> MediaMetadata {
        if !strategy.query_metadata {
            return MediaMetadata::default();
        }
        let mut metadata = match metadata::query(
            self.runner.as_ref(),
            &self.metrics,
            &self.settings.downloader_bin,
            url.as_str(),
            self.settings.metadata_timeout,
        )
        .await
        {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(error = %err, "metadata query failed; continuing with defaults");
                MediaMetadata::default()
            }
        };
        if let Some(enricher) = &self.enricher {
            enricher.enrich(url.as_str(), &mut metadata).await;
        }
        metadata
    }

    fn entries(
        &self,
        strategy: &PlatformStrategy,
        artifact: &str,
        media_type: MediaType,
    ) -> Vec<DownloadEntry> {
        let mut entries = vec![DownloadEntry {
            label: strategy.primary_label_for(media_type).to_string(),
            handle: self.signer.sign(&RetrievalHandle::original(artifact)),
            filename: sanitize_filename(artifact),
        }];
        if strategy.audio_variant {
            let mp3_name = Path::new(artifact).with_extension("mp3");
            entries.push(DownloadEntry {
                label: AUDIO_VARIANT_LABEL.to_string(),
                handle: self.signer.sign(&RetrievalHandle::converted(artifact, "mp3")),
                filename: sanitize_filename(&mp3_name.to_string_lossy()),
            });
        }
        entries
    }
}

fn validate_url(raw: &str) -> FetchResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidUrl { reason: "missing" });
    }
    let url = Url::parse(trimmed).map_err(|_| FetchError::InvalidUrl {
        reason: "not_absolute",
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl {
            reason: "unsupported_scheme",
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(FetchError::InvalidUrl { reason: "missing_host" });
    }
    Ok(url)
}

/// The downloader expands `%(...)s` fields in output templates; literal `%`
/// must be doubled.
fn escape_template(raw: &str) -> String {
    raw.replace('%', "%%")
}

#[allow(clippy::cast_precision_loss)]
fn format_megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / BYTES_PER_MB)
}

//! Request and response bodies of the HTTP API.

use mediadrop_pipeline::{DownloadDescriptor, MediaType};
use mediadrop_runtime::HistoryEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `POST /fetch` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchRequestBody {
    /// Source URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Platform tag; unknown or missing tags use the generic strategy.
    #[serde(default)]
    pub platform: Option<String>,
}

/// One retrievable output in a [`FetchResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    /// Human-readable label.
    pub label: String,
    /// Relative `/stream` URL carrying the signed handle.
    pub url: String,
    /// Suggested file name.
    pub filename: String,
}

/// `POST /fetch` success body.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResponse {
    /// Always `true`; failures use the error body.
    pub success: bool,
    /// Unique id of the fetch, usable as the `/events?fetch=` filter.
    pub fetch_id: Uuid,
    /// Platform tag echoed from the request.
    pub platform: String,
    /// Media type.
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Quality label.
    pub quality: String,
    /// Approximate size, e.g. `12.3 MB`.
    pub size: String,
    /// Title.
    pub title: String,
    /// Thumbnail URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Retrievable outputs.
    pub downloads: Vec<DownloadLink>,
}

impl From<DownloadDescriptor> for FetchResponse {
    fn from(descriptor: DownloadDescriptor) -> Self {
        let downloads = descriptor
            .downloads
            .into_iter()
            .map(|entry| DownloadLink {
                label: entry.label,
                url: format!("/stream?{}", entry.handle.to_query()),
                filename: entry.filename,
            })
            .collect();
        Self {
            success: true,
            fetch_id: descriptor.fetch_id,
            platform: descriptor.platform,
            media_type: descriptor.media_type,
            quality: descriptor.quality,
            size: descriptor.size,
            title: descriptor.title,
            thumbnail: descriptor.thumbnail,
            downloads,
        }
    }
}

/// `POST /history` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryAppendResponse {
    /// Always `true`.
    pub success: bool,
    /// The stored entry.
    pub entry: HistoryEntry,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Client-facing message.
    pub error: String,
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// HTTP status code.
    pub status: u16,
}

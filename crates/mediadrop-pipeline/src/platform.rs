//! Per-platform strategy table.

use serde::Serialize;

/// Supported source platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// youtube.com / youtu.be
    YouTube,
    /// instagram.com
    Instagram,
    /// tiktok.com
    TikTok,
    /// twitter.com / x.com
    Twitter,
    /// facebook.com
    Facebook,
    /// Anything else the downloader understands.
    Generic,
}

impl Platform {
    /// Map a caller-supplied tag, ignoring ASCII case. Unknown tags are generic.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim();
        [
            ("youtube", Self::YouTube),
            ("instagram", Self::Instagram),
            ("tiktok", Self::TikTok),
            ("twitter", Self::Twitter),
            ("facebook", Self::Facebook),
        ]
        .into_iter()
        .find_map(|(name, platform)| tag.eq_ignore_ascii_case(name).then_some(platform))
        .unwrap_or(Self::Generic)
    }

    /// Strategy used to fetch from this platform.
    #[must_use]
    pub const fn strategy(self) -> &'static PlatformStrategy {
        match self {
            Self::YouTube => &YOUTUBE,
            Self::Instagram => &INSTAGRAM,
            Self::TikTok => &TIKTOK,
            Self::Twitter | Self::Facebook | Self::Generic => &GENERIC,
        }
    }
}

/// Media type reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Video artifact.
    Video,
    /// Still image.
    Image,
    /// Audio only.
    Audio,
    /// Unknown media.
    Media,
}

/// How the media type of a finished artifact is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTypeRule {
    /// Always the same type.
    Fixed(MediaType),
    /// Video when the artifact is `.mp4`, image otherwise.
    VideoIfMp4,
}

impl MediaTypeRule {
    /// Resolve against an artifact extension.
    #[must_use]
    pub fn resolve(self, extension: Option<&str>) -> MediaType {
        match self {
            Self::Fixed(kind) => kind,
            Self::VideoIfMp4 if extension == Some("mp4") => MediaType::Video,
            Self::VideoIfMp4 => MediaType::Image,
        }
    }
}

/// Parameters that distinguish one platform's fetch from another.
#[derive(Debug, PartialEq, Eq)]
pub struct PlatformStrategy {
    /// Metric/log label and default file label.
    pub label: &'static str,
    /// Query title/duration/size/thumbnail before downloading.
    pub query_metadata: bool,
    /// Name the artifact after the sanitized title when one is known.
    pub title_file_label: bool,
    /// Downloader format selector.
    pub format_selector: Option<&'static str>,
    /// Offer an MP3 variant alongside the original.
    pub audio_variant: bool,
    /// Media type decision.
    pub media_type: MediaTypeRule,
    /// Quality label.
    pub quality: &'static str,
    /// Title used when metadata is unavailable.
    pub default_title: &'static str,
    /// Label of the primary download entry.
    pub primary_label: &'static str,
    /// Primary entry label for image artifacts, when it differs.
    pub image_label: Option<&'static str>,
}

impl PlatformStrategy {
    /// Primary entry label for an artifact of `media_type`.
    #[must_use]
    pub fn primary_label_for(&self, media_type: MediaType) -> &'static str {
        match (media_type, self.image_label) {
            (MediaType::Image, Some(label)) => label,
            _ => self.primary_label,
        }
    }
}

/// Label of the MP3 variant entry.
pub const AUDIO_VARIANT_LABEL: &str = "Audio Only (MP3)";

const YOUTUBE: PlatformStrategy = PlatformStrategy {
    label: "youtube",
    query_metadata: true,
    title_file_label: true,
    format_selector: Some("best[ext=mp4]/best"),
    audio_variant: true,
    media_type: MediaTypeRule::Fixed(MediaType::Video),
    quality: "HD",
    default_title: "YouTube Video",
    primary_label: "MP4 Video",
    image_label: None,
};

const INSTAGRAM: PlatformStrategy = PlatformStrategy {
    label: "instagram",
    query_metadata: false,
    title_file_label: false,
    format_selector: None,
    audio_variant: false,
    media_type: MediaTypeRule::VideoIfMp4,
    quality: "Original",
    default_title: "Instagram Media",
    primary_label: "MP4 Video",
    image_label: Some("Image"),
};

const TIKTOK: PlatformStrategy = PlatformStrategy {
    label: "tiktok",
    query_metadata: false,
    title_file_label: false,
    format_selector: None,
    audio_variant: false,
    media_type: MediaTypeRule::Fixed(MediaType::Video),
    quality: "Original",
    default_title: "TikTok Video",
    primary_label: "MP4 Video (No Watermark)",
    image_label: None,
};

const GENERIC: PlatformStrategy = PlatformStrategy {
    label: "generic",
    query_metadata: false,
    title_file_label: false,
    format_selector: None,
    audio_variant: false,
    media_type: MediaTypeRule::Fixed(MediaType::Media),
    quality: "Original",
    default_title: "Downloaded Media",
    primary_label: "Download File",
    image_label: None,
};

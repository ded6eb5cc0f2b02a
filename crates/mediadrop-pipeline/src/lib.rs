#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, unused_must_use)]
#![allow(clippy::module_name_repetitions)]

//! Fetch and transcode pipeline.
//!
//! Layout: `tools.rs` (external process runner), `platform.rs` (per-platform
//! strategy table), `metadata.rs` (metadata query and YouTube enrichment),
//! `fetch.rs` (the orchestrator), `transcode.rs` (MP3 conversion),
//! `error.rs` (pipeline errors).

pub mod error;
pub mod fetch;
pub mod metadata;
pub mod platform;
pub mod tools;
pub mod transcode;

pub use error::{FetchError, FetchResult, ToolError, TranscodeError};
pub use fetch::{
    DownloadDescriptor, DownloadEntry, FetchOrchestrator, FetchRequest, PipelineSettings,
};
pub use metadata::{MediaMetadata, YouTubeEnricher};
pub use platform::{MediaType, Platform, PlatformStrategy};
pub use tools::{ProcessRunner, ToolInvocation, ToolKind, ToolOutput, ToolRunner};
pub use transcode::Transcoder;

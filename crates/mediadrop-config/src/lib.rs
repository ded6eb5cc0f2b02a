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

//! Typed configuration for the Mediadrop service.
//!
//! Layout: `model.rs` (typed sections), `loader.rs` (environment parsing),
//! `validate.rs` (field parsers), `defaults.rs` (fallback values),
//! `error.rs` (configuration errors).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    AppConfig, CleanupConfig, HandleConfig, HttpConfig, StorageConfig, TelemetryConfig,
    ToolConfig,
};

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

//! Telemetry primitives shared across the Mediadrop workspace.
//!
//! Layout: `init.rs` (subscriber setup), `context.rs` (span/request context),
//! `layers.rs` (request-id layers), `metrics.rs` (Prometheus registry),
//! `error.rs` (telemetry errors).

pub mod context;
pub mod error;
pub mod init;
pub mod layers;
pub mod metrics;

pub use context::{
    GlobalContextGuard, current_request_id, current_route, set_request_context,
    with_request_context,
};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_version, init_logging};
pub use layers::{propagate_request_id_layer, set_request_id_layer};
pub use metrics::{Metrics, MetricsSnapshot};

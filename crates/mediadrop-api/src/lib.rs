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

//! HTTP surface for fetching and streaming media artifacts.

pub mod error;
pub(crate) mod http;
pub mod models;
pub(crate) mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use state::ApiDependencies;

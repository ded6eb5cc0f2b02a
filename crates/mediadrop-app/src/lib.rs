#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (configuration, service wiring, serve loop),
//! `error.rs` (application error type).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level errors.
pub mod error;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};

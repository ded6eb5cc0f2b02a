#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Shared test helpers used across the workspace test suites.
//! Layout: fixtures.rs (scratch directories and artifact files).

pub mod fixtures;

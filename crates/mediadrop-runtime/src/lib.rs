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

//! Download history persisted as a JSON array on disk.

pub mod error;
pub mod history;

pub use error::{HistoryError, HistoryResult};
pub use history::{HISTORY_CAPACITY, HISTORY_PAGE, HistoryEntry, HistoryStore, NewHistoryEntry};

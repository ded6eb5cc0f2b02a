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

//! Scratch directory management for downloaded artifacts.
//!
//! Artifacts live in a single flat directory and are named
//! `{uniqueId}_{label}.{ext}`. This crate owns everything that touches that
//! namespace: path containment, naming, signed retrieval handles, lease-based
//! deferred deletion and the periodic orphan sweep.

pub mod dir;
pub mod error;
pub mod handle;
pub mod lease;
pub mod name;
pub mod sanitize;
pub mod sweep;

pub use dir::ScratchDir;
pub use error::{ScratchError, ScratchResult};
pub use handle::{HandleSigner, RetrievalHandle, SignedHandle};
pub use lease::{ArtifactLeases, Lease};
pub use name::ArtifactName;
pub use sanitize::sanitize_filename;
pub use sweep::{SweeperHandle, spawn_sweeper, sweep_once};

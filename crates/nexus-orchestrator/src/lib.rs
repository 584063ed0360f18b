#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Client registry and the torrent service that routes and aggregates across it.
//!
//! Layout: `registry.rs` (immutable adapter set keyed by client id), `service.rs`
//! (single-target routing, scatter-gather listing, filtering).

pub mod registry;
pub mod service;

pub use registry::{AddDefaults, ClientRegistry, ClientSummary, Registration};
pub use service::{AggregatedTorrents, ClientFailure, TorrentFilter, TorrentService};

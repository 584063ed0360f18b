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

//! Backend-agnostic downloader interfaces and DTOs.
//!
//! Layout: `model/` (unified data model), `client/` (`DownloaderClient` capability trait),
//! `error.rs` (shared error taxonomy).

pub mod client;
pub mod error;
pub mod model;

pub use client::{DownloaderClient, find_by_hash};
pub use error::{DownloaderError, DownloaderResult};
pub use model::{
    BackendKind, Category, LogEntry, PeerInfo, ServerInfo, TorrentFile, TorrentOptions,
    TorrentProperties, TrackerInfo, TransferInfo, UNLIMITED, UnifiedTorrent, unified_limit,
};

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

//! Shared test helpers used across orchestrator and API suites.
//! Layout: fixtures.rs (torrent builders), mocks.rs (recording fake downloader).

pub mod fixtures;
pub mod mocks;

pub use fixtures::{magnet, torrent};
pub use mocks::{Call, FakeDownloader};

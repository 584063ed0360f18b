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
#![allow(clippy::redundant_pub_crate)]

//! REST surface over the torrent service.
//!
//! Layout:
//! - `http/router.rs`: route table, CORS and trace layers, server host
//! - `http/torrents.rs`: aggregated listing, batch actions and per-torrent routes
//! - `http/clients.rs`: client listing and connection tests
//! - `http/admin.rs`: per-client categories, tags, limits, transfer and server routes
//! - `http/errors.rs`: problem-details responses and downloader error mapping
//! - `models.rs`: request and response bodies

pub mod error;
pub(crate) mod http;
pub mod models;
pub(crate) mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;

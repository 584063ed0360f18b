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

//! qBittorrent WebAPI v2 adapter.
//!
//! Layout: `transport.rs` (HTTP session with SID cookie), `models.rs` (native payloads and
//! their unified projections), `adapter.rs` (`DownloaderClient` implementation).

pub mod adapter;
pub mod error;
mod models;
pub mod transport;

pub use adapter::QbitAdapter;
pub use error::{TransportError, TransportResult};
pub use transport::{HttpQbitTransport, MetainfoUpload, QbitTransport};

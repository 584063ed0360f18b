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

//! Transmission RPC adapter.
//!
//! Layout: `transport.rs` (JSON-RPC with session-id handshake), `models.rs` (native payloads),
//! `convert.rs` (units, labels, priorities), `adapter.rs` (`DownloaderClient` implementation).

pub mod adapter;
mod convert;
pub mod error;
mod models;
pub mod transport;

pub use adapter::TransmissionAdapter;
pub use error::{RpcError, RpcResult};
pub use transport::{HttpRpcTransport, RpcTransport};

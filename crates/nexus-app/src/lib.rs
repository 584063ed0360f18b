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

//! Application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (config, logging, client connection, API launch), `error.rs`
//! (application error taxonomy).

/// Application bootstrap.
pub mod bootstrap;
/// Application errors.
pub mod error;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};

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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint that connects the configured downloaders and serves the API.

use nexus_app::{AppResult, run_app};

/// Bootstraps the service and blocks until the API server stops.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}

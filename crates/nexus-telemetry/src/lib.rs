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

//! Logging bootstrap and request-id middleware shared across the workspace.
//!
//! Layout: `init.rs` (subscriber installation, build SHA), `layers.rs` (`x-request-id`
//! layers), `error.rs` (telemetry errors).

pub mod error;
pub mod init;
pub mod layers;

pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use layers::{propagate_request_id_layer, set_request_id_layer};

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

//! File and environment configuration for the down-nexus service.
//!
//! Layout: `model.rs` (typed configuration document), `defaults.rs` (fallback values and
//! environment variable names), `loader.rs` (read, override, validate), `validate.rs`
//! (field checks).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load, load_with, parse_document};
pub use model::{AppConfig, ClientConfig, LogStyle, LoggingSettings, ServerConfig};

//! Error types shared by every downloader adapter and the orchestration layer.
//!
//! # Design
//! - One taxonomy for all backends so callers can branch on the variant, not the backend.
//! - Messages stay constant; identifiers and sources travel in structured fields.
//! - `Unsupported` is distinct from `NotFound`: the former is never retryable on that backend.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::BackendKind;

/// Primary error type for downloader operations.
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// No adapter is registered under the requested client id.
    #[error("downloader client not found")]
    ClientNotFound {
        /// Requested client identifier.
        client_id: String,
    },
    /// The backend listed successfully but holds no torrent with this hash.
    #[error("torrent not found")]
    NotFound {
        /// Missing torrent hash.
        hash: String,
    },
    /// The targeted backend cannot perform this operation.
    #[error("operation not supported by backend")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
        /// Backend that lacks the capability.
        backend: BackendKind,
    },
    /// The backend call itself failed (network, auth, or rejection).
    #[error("backend operation failed")]
    Backend {
        /// Client identifier of the failing adapter.
        client_id: String,
        /// Operation identifier.
        operation: &'static str,
        /// Torrent hash when the call targeted one torrent.
        hash: Option<String>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Two registrations tried to claim the same client id.
    #[error("duplicate client id")]
    DuplicateClientId {
        /// Conflicting client identifier.
        client_id: String,
    },
    /// Caller-supplied input was rejected before reaching the backend.
    #[error("invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Local filesystem access failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl DownloaderError {
    /// Wrap a backend failure with the adapter's context.
    pub fn backend(
        client_id: impl Into<String>,
        operation: &'static str,
        hash: Option<&str>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            client_id: client_id.into(),
            operation,
            hash: hash.map(str::to_owned),
            source: source.into(),
        }
    }

    /// Build a `NotFound` error for the given hash.
    pub fn not_found(hash: impl Into<String>) -> Self {
        Self::NotFound { hash: hash.into() }
    }

    /// Build a `ClientNotFound` error for the given client id.
    pub fn client_not_found(client_id: impl Into<String>) -> Self {
        Self::ClientNotFound {
            client_id: client_id.into(),
        }
    }
}

/// Convenience alias for downloader operation results.
pub type DownloaderResult<T> = Result<T, DownloaderError>;

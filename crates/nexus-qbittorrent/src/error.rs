//! Transport-level failures for the qBittorrent WebAPI.

use thiserror::Error;

/// Errors raised while talking to a qBittorrent daemon.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Building the HTTP client failed.
    #[error("failed to build http client")]
    Build {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The request could not be sent or the body could not be read.
    #[error("http request failed")]
    Request {
        /// API endpoint relative to `/api/v2/`.
        endpoint: String,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The daemon answered with a non-success status.
    #[error("unexpected http status")]
    Status {
        /// API endpoint relative to `/api/v2/`.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// Credentials were refused.
    #[error("authentication rejected")]
    AuthRejected,
    /// The daemon replied `Fails.` to a mutating request.
    #[error("request rejected by daemon")]
    Rejected {
        /// API endpoint relative to `/api/v2/`.
        endpoint: String,
    },
    /// A response body did not match the expected shape.
    #[error("failed to decode response")]
    Decode {
        /// API endpoint relative to `/api/v2/`.
        endpoint: String,
        /// Underlying decode failure.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TransportError {
    /// HTTP status when the failure carried one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

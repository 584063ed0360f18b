//! Transport-level failures for the Transmission RPC endpoint.

use thiserror::Error;

/// Errors raised while talking to a Transmission daemon.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Building the HTTP client failed.
    #[error("failed to build http client")]
    Build {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The request could not be sent or the body could not be read.
    #[error("rpc request failed")]
    Request {
        /// RPC method name.
        method: String,
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
    /// The daemon answered `409` without a session id header.
    #[error("session id missing from conflict response")]
    MissingSessionId,
    /// Basic auth credentials were refused.
    #[error("rpc credentials rejected")]
    Unauthorized,
    /// The daemon answered with a non-success status.
    #[error("unexpected http status")]
    Status {
        /// RPC method name.
        method: String,
        /// HTTP status code.
        status: u16,
    },
    /// The RPC envelope carried a `result` other than `success`.
    #[error("rpc call rejected")]
    Rejected {
        /// RPC method name.
        method: String,
        /// Result string reported by the daemon.
        result: String,
    },
    /// A response did not match the expected shape.
    #[error("failed to decode rpc response")]
    Decode {
        /// RPC method name.
        method: String,
        /// Underlying decode failure.
        source: serde_json::Error,
    },
}

/// Result alias for RPC calls.
pub type RpcResult<T> = Result<T, RpcError>;

//! RFC9457-style API error wrapper and downloader error mapping.

use std::error::Error;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nexus_torrent_core::DownloaderError;
use tracing::warn;

use crate::models::ProblemDetails;

pub(crate) const PROBLEM_INTERNAL: &str = "https://down-nexus.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://down-nexus.dev/problems/bad-request";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://down-nexus.dev/problems/not-found";
pub(crate) const PROBLEM_UNSUPPORTED: &str = "https://down-nexus.dev/problems/unsupported";
pub(crate) const PROBLEM_BACKEND: &str = "https://down-nexus.dev/problems/backend-unavailable";

/// Structured API error rendered as problem details.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn unsupported(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_IMPLEMENTED,
            PROBLEM_UNSUPPORTED,
            "operation not supported by backend",
        )
        .with_detail(detail)
    }

    pub(crate) fn bad_gateway(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            PROBLEM_BACKEND,
            "backend request failed",
        )
        .with_detail(detail)
    }
}

impl From<DownloaderError> for ApiError {
    fn from(err: DownloaderError) -> Self {
        match &err {
            DownloaderError::ClientNotFound { client_id } => {
                Self::not_found(format!("client '{client_id}' is not registered"))
            }
            DownloaderError::NotFound { hash } => {
                Self::not_found(format!("torrent '{hash}' not found"))
            }
            DownloaderError::Unsupported { operation, backend } => {
                Self::unsupported(format!("{backend} does not support {operation}"))
            }
            DownloaderError::InvalidInput { field, reason } => {
                Self::bad_request(format!("{field}: {reason}"))
            }
            DownloaderError::Backend {
                client_id,
                operation,
                hash,
                source,
            } => {
                warn!(
                    client_id = %client_id,
                    operation,
                    hash = hash.as_deref().unwrap_or(""),
                    error = %source,
                    "backend call failed"
                );
                Self::bad_gateway(format!("{client_id}: {operation} failed: {}", chain(source.as_ref())))
            }
            DownloaderError::DuplicateClientId { .. } | DownloaderError::Io { .. } => {
                Self::internal(chain(&err))
            }
        }
    }
}

fn chain(err: &(dyn Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

// Test-only: lets unit tests propagate `ApiError` through `anyhow::Result` with `?`.
#[cfg(test)]
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {:?}", self.title, self.status, self.detail)
    }
}

#[cfg(test)]
impl Error for ApiError {}

//! HTTP surface modules (router, handlers, problem responses).

/// Per-client administration handlers.
pub(crate) mod admin;
/// Client listing and connection tests.
pub(crate) mod clients;
/// Problem response helpers and error mapping.
pub(crate) mod errors;
/// Health endpoint.
pub(crate) mod health;
/// Router construction and server host.
pub(crate) mod router;
/// Torrent listing, batch and per-torrent handlers.
pub(crate) mod torrents;

use axum::Json;

use crate::http::errors::ApiError;
use crate::models::{Ack, ApiResponse};

/// Handler result wrapping a payload in the success envelope.
pub(crate) type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Envelope for mutations without a payload.
pub(crate) fn ack(client_id: String, operation: &'static str) -> Json<ApiResponse<Ack>> {
    Json(ApiResponse::ok(Ack {
        client_id,
        operation,
    }))
}

/// Envelope for list payloads.
pub(crate) fn listed<T>(items: Vec<T>) -> Json<ApiResponse<Vec<T>>> {
    let count = items.len();
    Json(ApiResponse::counted(items, count))
}

//! Health endpoint.

use std::sync::Arc;

use axum::{Json, extract::State};
use nexus_telemetry::build_sha;
use serde::Serialize;

use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) build: String,
    pub(crate) clients: usize,
}

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        build: build_sha().to_string(),
        clients: state.service.clients().len(),
    })
}

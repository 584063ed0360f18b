//! Client listing and connection tests.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path as AxumPath, State},
};
use nexus_orchestrator::ClientSummary;
use tracing::info;

use crate::http::errors::ApiError;
use crate::models::{ApiResponse, ConnectionView};
use crate::state::ApiState;

pub(crate) async fn list_clients(
    State(state): State<Arc<ApiState>>,
) -> Json<ApiResponse<Vec<ClientSummary>>> {
    let clients = state.service.clients();
    let count = clients.len();
    Json(ApiResponse::counted(clients, count))
}

pub(crate) async fn test_client(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): AxumPath<String>,
) -> Result<Json<ApiResponse<ConnectionView>>, ApiError> {
    let torrent_count = state.service.test_connection(&client_id).await?;
    info!(client_id = %client_id, torrent_count, "client connection test passed");
    Ok(Json(ApiResponse::ok(ConnectionView {
        client_id,
        torrent_count,
    })))
}

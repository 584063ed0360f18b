//! Per-client management routes: categories, tags, global limits and server state.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path as AxumPath, Query, State},
};
use nexus_torrent_core::{Category, LogEntry, ServerInfo, TransferInfo};
use tracing::{info, warn};

use crate::http::errors::ApiError;
use crate::http::torrents::check_limits;
use crate::http::{ApiResult, ack, listed};
use crate::models::{
    Ack, AltSpeedView, ApiResponse, CategoryRemoveRequest, CategoryUpsertRequest, FreeSpaceQuery,
    FreeSpaceView, LimitsRequest, LimitsView, LogsQuery, SavePathView, TagsRequest,
};
use crate::state::ApiState;

type ClientPath = AxumPath<String>;

pub(crate) async fn list_categories(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
) -> ApiResult<BTreeMap<String, Category>> {
    let categories = state.service.categories(&client_id).await?;
    let count = categories.len();
    Ok(Json(ApiResponse::counted(categories, count)))
}

pub(crate) async fn create_category(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
    Json(request): Json<CategoryUpsertRequest>,
) -> ApiResult<Ack> {
    require_name(&request.name)?;
    state
        .service
        .create_category(&client_id, &request.name, &request.save_path)
        .await?;
    Ok(ack(client_id, "create_category"))
}

pub(crate) async fn edit_category(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
    Json(request): Json<CategoryUpsertRequest>,
) -> ApiResult<Ack> {
    require_name(&request.name)?;
    state
        .service
        .edit_category(&client_id, &request.name, &request.save_path)
        .await?;
    Ok(ack(client_id, "edit_category"))
}

pub(crate) async fn remove_categories(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
    Json(request): Json<CategoryRemoveRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .remove_categories(&client_id, &request.names)
        .await?;
    Ok(ack(client_id, "remove_categories"))
}

pub(crate) async fn list_tags(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
) -> ApiResult<Vec<String>> {
    Ok(listed(state.service.tags(&client_id).await?))
}

pub(crate) async fn create_tags(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
    Json(request): Json<TagsRequest>,
) -> ApiResult<Ack> {
    state.service.create_tags(&client_id, &request.tags).await?;
    Ok(ack(client_id, "create_tags"))
}

pub(crate) async fn delete_tags(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
    Json(request): Json<TagsRequest>,
) -> ApiResult<Ack> {
    state.service.delete_tags(&client_id, &request.tags).await?;
    Ok(ack(client_id, "delete_tags"))
}

pub(crate) async fn global_limits(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
) -> ApiResult<LimitsView> {
    let (download_limit, upload_limit) = state.service.global_limits(&client_id).await?;
    Ok(Json(ApiResponse::ok(LimitsView {
        download_limit,
        upload_limit,
    })))
}

pub(crate) async fn set_global_limits(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
    Json(request): Json<LimitsRequest>,
) -> ApiResult<Ack> {
    check_limits(&request)?;
    state
        .service
        .set_global_limits(&client_id, request.download_limit, request.upload_limit)
        .await?;
    info!(
        client_id = %client_id,
        download_limit = ?request.download_limit,
        upload_limit = ?request.upload_limit,
        "global limits updated"
    );
    Ok(ack(client_id, "set_global_limits"))
}

pub(crate) async fn alt_speed(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
) -> ApiResult<AltSpeedView> {
    let enabled = state
        .service
        .alternative_speed_limits_enabled(&client_id)
        .await?;
    Ok(Json(ApiResponse::ok(AltSpeedView { enabled })))
}

pub(crate) async fn toggle_alt_speed(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
) -> ApiResult<Ack> {
    state
        .service
        .toggle_alternative_speed_limits(&client_id)
        .await?;
    Ok(ack(client_id, "toggle_alternative_speed_limits"))
}

pub(crate) async fn transfer_info(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
) -> ApiResult<TransferInfo> {
    Ok(Json(ApiResponse::ok(
        state.service.transfer_info(&client_id).await?,
    )))
}

pub(crate) async fn free_space(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
    Query(query): Query<FreeSpaceQuery>,
) -> ApiResult<FreeSpaceView> {
    let free_bytes = state.service.free_space(&client_id, &query.path).await?;
    Ok(Json(ApiResponse::ok(FreeSpaceView {
        path: query.path,
        free_bytes,
    })))
}

pub(crate) async fn server_info(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
) -> ApiResult<ServerInfo> {
    Ok(Json(ApiResponse::ok(
        state.service.server_info(&client_id).await?,
    )))
}

pub(crate) async fn default_save_path(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
) -> ApiResult<SavePathView> {
    let save_path = state.service.default_save_path(&client_id).await?;
    Ok(Json(ApiResponse::ok(SavePathView { save_path })))
}

pub(crate) async fn shutdown(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
) -> ApiResult<Ack> {
    warn!(client_id = %client_id, "backend shutdown requested");
    state.service.shutdown(&client_id).await?;
    Ok(ack(client_id, "shutdown"))
}

pub(crate) async fn logs(
    State(state): State<Arc<ApiState>>,
    AxumPath(client_id): ClientPath,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Vec<LogEntry>> {
    let entries = state
        .service
        .logs(
            &client_id,
            query.normal,
            query.warning,
            query.critical,
            query.last_known_id,
        )
        .await?;
    Ok(listed(entries))
}

fn require_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use nexus_orchestrator::{ClientRegistry, Registration, TorrentService};
    use nexus_test_support::{FakeDownloader, torrent};
    use nexus_torrent_core::{BackendKind, DownloaderClient, UnifiedTorrent};

    fn state(fake: &Arc<FakeDownloader>) -> anyhow::Result<State<Arc<ApiState>>> {
        let client: Arc<dyn DownloaderClient> = Arc::clone(fake) as Arc<dyn DownloaderClient>;
        let registry = ClientRegistry::new(vec![Registration::new(client)])?;
        Ok(State(Arc::new(ApiState::new(TorrentService::new(
            Arc::new(registry),
        )))))
    }

    fn client(id: &str) -> ClientPath {
        AxumPath(id.to_string())
    }

    #[tokio::test]
    async fn categories_and_tags_are_listed_with_counts() -> anyhow::Result<()> {
        let fake = Arc::new(
            FakeDownloader::new("qb", BackendKind::Qbittorrent).with_torrents(vec![
                UnifiedTorrent {
                    category: "movies".to_string(),
                    tags: vec!["hd".to_string(), "new".to_string()],
                    ..torrent("qb", "aa")
                },
            ]),
        );
        let state = state(&fake)?;

        let Json(categories) = list_categories(state.clone(), client("qb")).await?;
        assert_eq!(categories.count, Some(1));
        assert_eq!(categories.data["movies"].save_path, "/downloads");

        let Json(tags) = list_tags(state, client("qb")).await?;
        assert_eq!(tags.count, Some(2));
        assert_eq!(tags.data, vec!["hd".to_string(), "new".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn global_limits_round_trip() -> anyhow::Result<()> {
        let fake = Arc::new(FakeDownloader::new("tr", BackendKind::Transmission));
        let state = state(&fake)?;

        let _ = set_global_limits(
            state.clone(),
            client("tr"),
            Json(LimitsRequest {
                download_limit: Some(4096),
                upload_limit: None,
            }),
        )
        .await?;
        let Json(limits) = global_limits(state, client("tr")).await?;

        assert_eq!(limits.data.download_limit, 4096);
        assert_eq!(limits.data.upload_limit, -1);
        assert_eq!(fake.global_limits().await, (4096, -1));
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_operations_map_to_not_implemented() -> anyhow::Result<()> {
        let fake = Arc::new(FakeDownloader::new("tr", BackendKind::Transmission));
        let state = state(&fake)?;

        let err = logs(state.clone(), client("tr"), Query(LogsQuery::default()))
            .await
            .expect_err("logs unsupported");
        assert_eq!(err.status, StatusCode::NOT_IMPLEMENTED);

        let err = shutdown(state, client("tr"))
            .await
            .expect_err("shutdown unsupported");
        assert_eq!(err.status, StatusCode::NOT_IMPLEMENTED);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_client_is_not_found_and_blank_category_rejected() -> anyhow::Result<()> {
        let fake = Arc::new(FakeDownloader::new("qb", BackendKind::Qbittorrent));
        let state = state(&fake)?;

        let err = server_info(state.clone(), client("ghost"))
            .await
            .expect_err("unknown client");
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = create_category(
            state.clone(),
            client("qb"),
            Json(CategoryUpsertRequest {
                name: " ".to_string(),
                save_path: String::new(),
            }),
        )
        .await
        .expect_err("blank name");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let Json(info) = server_info(state, client("qb")).await?;
        assert_eq!(info.data.version, "fake-1.0");
        assert!(fake.calls().await.iter().all(|call| call.operation == "get_server_info"));
        Ok(())
    }
}

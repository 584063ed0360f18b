//! Torrent listing, batch actions and per-torrent routes.
//!
//! # Design
//! - The aggregate listing never fails because of one backend; failed clients are returned
//!   next to the torrents.
//! - Batch routes carry the client id in the body; per-torrent routes take it from the path.
//! - Metainfo uploads arrive base64-encoded and are bounded before decoding.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose};
use nexus_orchestrator::{AggregatedTorrents, TorrentFilter};
use nexus_torrent_core::{
    PeerInfo, TorrentFile, TorrentOptions, TorrentProperties, TrackerInfo, UnifiedTorrent,
};
use tracing::info;

use crate::http::errors::ApiError;
use crate::http::{ApiResult, ack, listed};
use crate::models::{
    Ack, AddTorrentRequest, ApiResponse, BatchRequest, CategoryRequest, FilePriorityRequest,
    LimitsRequest, LimitsView, LocationRequest, NameRequest, PriorityRequest, RenameRequest,
    ShareLimitRequest, TagsRequest, ToggleRequest, TrackersRequest,
};
use crate::state::ApiState;

/// Largest accepted `.torrent` payload after decoding.
pub(crate) const MAX_METAINFO_BYTES: usize = 5 * 1024 * 1024;

/// Body limit for adds: the base64 form of the largest payload plus room for the options.
pub(crate) const MAX_ADD_BODY_BYTES: usize = MAX_METAINFO_BYTES.div_ceil(3) * 4 + 64 * 1024;

type TorrentPath = AxumPath<(String, String)>;

// ---- aggregate ----

pub(crate) async fn list_torrents(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<TorrentFilter>,
) -> ApiResult<AggregatedTorrents> {
    let aggregated = state.service.list_filtered_torrents(&filter).await?;
    let count = aggregated.torrents.len();
    Ok(Json(ApiResponse::counted(aggregated, count)))
}

pub(crate) async fn add_torrent(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<AddTorrentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Ack>>), ApiError> {
    require_client_id(&request.client_id)?;
    let options = match request.torrent_file.as_deref() {
        Some(encoded) if !encoded.is_empty() => TorrentOptions {
            torrent_file: decode_metainfo(encoded)?,
            ..request.options
        },
        _ => request.options,
    };
    state
        .service
        .add_torrent(&request.client_id, options)
        .await?;
    info!(client_id = %request.client_id, "torrent add requested");
    Ok((StatusCode::ACCEPTED, ack(request.client_id, "add_torrent")))
}

pub(crate) async fn pause_torrents(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Ack> {
    validate_batch(&request)?;
    state
        .service
        .pause_torrents(&request.client_id, &request.hashes)
        .await?;
    Ok(ack(request.client_id, "pause_torrents"))
}

pub(crate) async fn resume_torrents(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Ack> {
    validate_batch(&request)?;
    state
        .service
        .resume_torrents(&request.client_id, &request.hashes)
        .await?;
    Ok(ack(request.client_id, "resume_torrents"))
}

pub(crate) async fn recheck_torrents(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Ack> {
    validate_batch(&request)?;
    state
        .service
        .recheck_torrents(&request.client_id, &request.hashes)
        .await?;
    Ok(ack(request.client_id, "recheck_torrents"))
}

pub(crate) async fn reannounce_torrents(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Ack> {
    validate_batch(&request)?;
    state
        .service
        .reannounce_torrents(&request.client_id, &request.hashes)
        .await?;
    Ok(ack(request.client_id, "reannounce_torrents"))
}

pub(crate) async fn delete_torrents(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Ack> {
    validate_batch(&request)?;
    state
        .service
        .delete_torrents(&request.client_id, &request.hashes, request.delete_files)
        .await?;
    info!(
        client_id = %request.client_id,
        count = request.hashes.len(),
        delete_files = request.delete_files,
        "torrents removed"
    );
    Ok(ack(request.client_id, "delete_torrents"))
}

// ---- per torrent: reads ----

pub(crate) async fn get_torrent(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
) -> ApiResult<UnifiedTorrent> {
    let torrent = state.service.torrent_details(&client_id, &hash).await?;
    Ok(Json(ApiResponse::ok(torrent)))
}

pub(crate) async fn torrent_files(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
) -> ApiResult<Vec<TorrentFile>> {
    Ok(listed(state.service.torrent_files(&client_id, &hash).await?))
}

pub(crate) async fn torrent_trackers(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
) -> ApiResult<Vec<TrackerInfo>> {
    Ok(listed(
        state.service.torrent_trackers(&client_id, &hash).await?,
    ))
}

pub(crate) async fn torrent_peers(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
) -> ApiResult<Vec<PeerInfo>> {
    Ok(listed(state.service.torrent_peers(&client_id, &hash).await?))
}

pub(crate) async fn torrent_properties(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
) -> ApiResult<TorrentProperties> {
    let properties = state
        .service
        .torrent_properties(&client_id, &hash)
        .await?;
    Ok(Json(ApiResponse::ok(properties)))
}

pub(crate) async fn torrent_pieces(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
) -> ApiResult<Vec<i64>> {
    Ok(listed(
        state
            .service
            .torrent_piece_states(&client_id, &hash)
            .await?,
    ))
}

pub(crate) async fn torrent_limits(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
) -> ApiResult<LimitsView> {
    let (download_limit, upload_limit) = state.service.torrent_limits(&client_id, &hash).await?;
    Ok(Json(ApiResponse::ok(LimitsView {
        download_limit,
        upload_limit,
    })))
}

// ---- per torrent: mutations ----

pub(crate) async fn set_location(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<LocationRequest>,
) -> ApiResult<Ack> {
    if request.location.trim().is_empty() {
        return Err(ApiError::bad_request("location must not be empty"));
    }
    state
        .service
        .set_torrent_location(&client_id, &hash, &request.location)
        .await?;
    Ok(ack(client_id, "set_torrent_location"))
}

pub(crate) async fn set_name(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<NameRequest>,
) -> ApiResult<Ack> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }
    state
        .service
        .set_torrent_name(&client_id, &hash, &request.name)
        .await?;
    Ok(ack(client_id, "set_torrent_name"))
}

pub(crate) async fn set_force_start(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_force_start(&client_id, &hash, request.enabled)
        .await?;
    Ok(ack(client_id, "set_force_start"))
}

pub(crate) async fn set_auto_management(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_auto_management(&client_id, &hash, request.enabled)
        .await?;
    Ok(ack(client_id, "set_auto_management"))
}

pub(crate) async fn set_sequential(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_sequential_download(&client_id, &hash, request.enabled)
        .await?;
    Ok(ack(client_id, "set_sequential_download"))
}

pub(crate) async fn set_first_last(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_first_last_piece_priority(&client_id, &hash, request.enabled)
        .await?;
    Ok(ack(client_id, "set_first_last_piece_priority"))
}

pub(crate) async fn set_super_seeding(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_super_seeding(&client_id, &hash, request.enabled)
        .await?;
    Ok(ack(client_id, "set_super_seeding"))
}

pub(crate) async fn set_share_limit(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<ShareLimitRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_share_limit(
            &client_id,
            &hash,
            request.ratio_limit,
            request.seeding_time_limit,
        )
        .await?;
    Ok(ack(client_id, "set_share_limit"))
}

pub(crate) async fn set_category(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<CategoryRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_torrent_category(&client_id, &hash, &request.category)
        .await?;
    Ok(ack(client_id, "set_torrent_category"))
}

pub(crate) async fn set_tags(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<TagsRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_torrent_tags(&client_id, &hash, &request.tags)
        .await?;
    Ok(ack(client_id, "set_torrent_tags"))
}

pub(crate) async fn add_tags(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<TagsRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .add_torrent_tags(&client_id, &hash, &request.tags)
        .await?;
    Ok(ack(client_id, "add_torrent_tags"))
}

pub(crate) async fn remove_tags(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<TagsRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .remove_torrent_tags(&client_id, &hash, &request.tags)
        .await?;
    Ok(ack(client_id, "remove_torrent_tags"))
}

pub(crate) async fn replace_trackers(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<TrackersRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_torrent_trackers(&client_id, &hash, &request.trackers)
        .await?;
    Ok(ack(client_id, "set_torrent_trackers"))
}

pub(crate) async fn add_trackers(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<TrackersRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .add_torrent_trackers(&client_id, &hash, &request.trackers)
        .await?;
    Ok(ack(client_id, "add_torrent_trackers"))
}

pub(crate) async fn remove_trackers(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<TrackersRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .remove_torrent_trackers(&client_id, &hash, &request.trackers)
        .await?;
    Ok(ack(client_id, "remove_torrent_trackers"))
}

pub(crate) async fn set_limits(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<LimitsRequest>,
) -> ApiResult<Ack> {
    check_limits(&request)?;
    state
        .service
        .set_torrent_limits(
            &client_id,
            &hash,
            request.download_limit,
            request.upload_limit,
        )
        .await?;
    Ok(ack(client_id, "set_torrent_limits"))
}

pub(crate) async fn set_priority(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<PriorityRequest>,
) -> ApiResult<Ack> {
    state
        .service
        .set_torrent_priority(&client_id, &hash, request.priority)
        .await?;
    Ok(ack(client_id, "set_torrent_priority"))
}

pub(crate) async fn set_file_priority(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<FilePriorityRequest>,
) -> ApiResult<Ack> {
    if request.file_ids.is_empty() {
        return Err(ApiError::bad_request("file_ids must not be empty"));
    }
    state
        .service
        .set_file_priority(&client_id, &hash, &request.file_ids, request.priority)
        .await?;
    Ok(ack(client_id, "set_file_priority"))
}

pub(crate) async fn rename_file(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<RenameRequest>,
) -> ApiResult<Ack> {
    validate_rename(&request)?;
    state
        .service
        .rename_file(&client_id, &hash, &request.old_path, &request.new_path)
        .await?;
    Ok(ack(client_id, "rename_file"))
}

pub(crate) async fn rename_folder(
    State(state): State<Arc<ApiState>>,
    AxumPath((client_id, hash)): TorrentPath,
    Json(request): Json<RenameRequest>,
) -> ApiResult<Ack> {
    validate_rename(&request)?;
    state
        .service
        .rename_folder(&client_id, &hash, &request.old_path, &request.new_path)
        .await?;
    Ok(ack(client_id, "rename_folder"))
}

// ---- request checks ----

fn require_client_id(client_id: &str) -> Result<(), ApiError> {
    if client_id.trim().is_empty() {
        return Err(ApiError::bad_request("client_id is required"));
    }
    Ok(())
}

fn validate_batch(request: &BatchRequest) -> Result<(), ApiError> {
    require_client_id(&request.client_id)?;
    if request.hashes.is_empty() {
        return Err(ApiError::bad_request("hashes must not be empty"));
    }
    Ok(())
}

fn validate_rename(request: &RenameRequest) -> Result<(), ApiError> {
    if request.old_path.is_empty() || request.new_path.is_empty() {
        return Err(ApiError::bad_request("old_path and new_path are required"));
    }
    Ok(())
}

pub(crate) fn check_limits(request: &LimitsRequest) -> Result<(), ApiError> {
    let below_unlimited = [request.download_limit, request.upload_limit]
        .into_iter()
        .flatten()
        .any(|limit| limit < -1);
    if below_unlimited {
        return Err(ApiError::bad_request("limits must be -1 or greater"));
    }
    Ok(())
}

fn decode_metainfo(encoded: &str) -> Result<Vec<u8>, ApiError> {
    if encoded.len() > MAX_METAINFO_BYTES.div_ceil(3) * 4 {
        return Err(ApiError::bad_request("torrent_file exceeds the size limit"));
    }
    general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|err| ApiError::bad_request(format!("torrent_file is not valid base64: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_orchestrator::{ClientRegistry, Registration, TorrentService};
    use nexus_test_support::{FakeDownloader, magnet, torrent};
    use nexus_torrent_core::{BackendKind, DownloaderClient};

    fn state(fakes: Vec<Arc<FakeDownloader>>) -> anyhow::Result<State<Arc<ApiState>>> {
        let registrations = fakes
            .into_iter()
            .map(|fake| Registration::new(fake as Arc<dyn DownloaderClient>))
            .collect();
        let service = TorrentService::new(Arc::new(ClientRegistry::new(registrations)?));
        Ok(State(Arc::new(ApiState::new(service))))
    }

    fn path(client_id: &str, hash: &str) -> TorrentPath {
        AxumPath((client_id.to_string(), hash.to_string()))
    }

    #[tokio::test]
    async fn listing_reports_failed_clients() -> anyhow::Result<()> {
        let state = state(vec![
            Arc::new(
                FakeDownloader::new("qb", BackendKind::Qbittorrent)
                    .with_torrents(vec![torrent("qb", "aa")]),
            ),
            Arc::new(FakeDownloader::new("tr", BackendKind::Transmission).failing_listing()),
        ])?;

        let Json(response) = list_torrents(state, Query(TorrentFilter::default())).await?;

        assert!(response.success);
        assert_eq!(response.count, Some(1));
        assert_eq!(response.data.torrents[0].hash, "aa");
        assert_eq!(response.data.failures[0].client_id, "tr");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_client_filter_is_not_found() -> anyhow::Result<()> {
        let state = state(vec![Arc::new(FakeDownloader::new(
            "qb",
            BackendKind::Qbittorrent,
        ))])?;
        let err = list_torrents(
            state,
            Query(TorrentFilter {
                client_id: "ghost".to_string(),
                ..TorrentFilter::default()
            }),
        )
        .await
        .expect_err("unknown client");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn add_decodes_metainfo_and_routes() -> anyhow::Result<()> {
        let fake = Arc::new(FakeDownloader::new("qb", BackendKind::Qbittorrent));
        let state = state(vec![Arc::clone(&fake)])?;
        let request = AddTorrentRequest {
            client_id: "qb".to_string(),
            torrent_file: Some(general_purpose::STANDARD.encode(b"d4:infod4:name1:xee")),
            options: TorrentOptions::from_url(magnet("aa")),
        };

        let (status, Json(response)) = add_torrent(state, Json(request)).await?;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(response.data.operation, "add_torrent");
        let added = fake.added().await;
        assert_eq!(added[0].torrent_file, b"d4:infod4:name1:xee".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn add_rejects_invalid_base64() -> anyhow::Result<()> {
        let state = state(vec![Arc::new(FakeDownloader::new(
            "qb",
            BackendKind::Qbittorrent,
        ))])?;
        let request = AddTorrentRequest {
            client_id: "qb".to_string(),
            torrent_file: Some("***".to_string()),
            options: TorrentOptions::default(),
        };
        let err = add_torrent(state, Json(request))
            .await
            .expect_err("invalid base64");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn batch_requires_hashes_and_surfaces_first_failure() -> anyhow::Result<()> {
        let fake = Arc::new(
            FakeDownloader::new("qb", BackendKind::Qbittorrent)
                .with_torrents(vec![torrent("qb", "h1"), torrent("qb", "h2")])
                .failing_hash("h2"),
        );
        let state = state(vec![Arc::clone(&fake)])?;

        let empty = pause_torrents(
            state.clone(),
            Json(BatchRequest {
                client_id: "qb".to_string(),
                hashes: Vec::new(),
                delete_files: false,
            }),
        )
        .await
        .expect_err("empty batch");
        assert_eq!(empty.status, StatusCode::BAD_REQUEST);
        assert!(fake.calls().await.is_empty());

        let failed = pause_torrents(
            state,
            Json(BatchRequest {
                client_id: "qb".to_string(),
                hashes: vec!["h1".to_string(), "h2".to_string()],
                delete_files: false,
            }),
        )
        .await
        .expect_err("h2 fails");
        assert_eq!(failed.status, StatusCode::BAD_GATEWAY);
        assert_eq!(fake.get_torrents().await?[0].state, "paused");
        Ok(())
    }

    #[tokio::test]
    async fn per_torrent_routes_map_errors() -> anyhow::Result<()> {
        let state = state(vec![Arc::new(
            FakeDownloader::new("tr", BackendKind::Transmission)
                .with_torrents(vec![torrent("tr", "aa")]),
        )])?;

        let Json(found) = get_torrent(state.clone(), path("tr", "AA")).await?;
        assert_eq!(found.data.hash, "aa");

        let missing = get_torrent(state.clone(), path("tr", "zz"))
            .await
            .expect_err("missing hash");
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let unsupported = torrent_pieces(state, path("tr", "aa"))
            .await
            .expect_err("pieces unsupported");
        assert_eq!(unsupported.status, StatusCode::NOT_IMPLEMENTED);
        Ok(())
    }

    #[tokio::test]
    async fn limits_round_trip_and_reject_below_unlimited() -> anyhow::Result<()> {
        let state = state(vec![Arc::new(
            FakeDownloader::new("qb", BackendKind::Qbittorrent)
                .with_torrents(vec![torrent("qb", "aa")]),
        )])?;

        let _ = set_limits(
            state.clone(),
            path("qb", "aa"),
            Json(LimitsRequest {
                download_limit: Some(2048),
                upload_limit: Some(-1),
            }),
        )
        .await?;
        let Json(limits) = torrent_limits(state.clone(), path("qb", "aa")).await?;
        assert_eq!(
            limits.data,
            LimitsView {
                download_limit: 2048,
                upload_limit: -1,
            }
        );

        let err = set_limits(
            state,
            path("qb", "aa"),
            Json(LimitsRequest {
                download_limit: Some(-7),
                upload_limit: None,
            }),
        )
        .await
        .expect_err("below unlimited");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn category_and_tags_are_routed() -> anyhow::Result<()> {
        let fake = Arc::new(
            FakeDownloader::new("qb", BackendKind::Qbittorrent)
                .with_torrents(vec![torrent("qb", "aa")]),
        );
        let state = state(vec![Arc::clone(&fake)])?;

        let _ = set_category(
            state.clone(),
            path("qb", "aa"),
            Json(CategoryRequest {
                category: "movies".to_string(),
            }),
        )
        .await?;
        let Json(ack) = set_tags(
            state,
            path("qb", "aa"),
            Json(TagsRequest {
                tags: vec!["hd".to_string()],
            }),
        )
        .await?;

        assert_eq!(ack.data.operation, "set_torrent_tags");
        let torrents = fake.get_torrents().await?;
        assert_eq!(torrents[0].category, "movies");
        assert_eq!(torrents[0].tags, vec!["hd".to_string()]);
        Ok(())
    }
}

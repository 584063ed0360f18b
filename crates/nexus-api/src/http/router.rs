//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    handler::Handler,
    http::{Method, Request, header::CONTENT_TYPE},
    routing::{get, post},
};
use nexus_orchestrator::TorrentService;
use nexus_telemetry::build_sha;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::admin;
use crate::http::clients::{list_clients, test_client};
use crate::http::health::health;
use crate::http::torrents;
use crate::state::ApiState;

const HEADER_REQUEST_ID: &str = "x-request-id";

/// Axum router wrapper that hosts the torrent API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct the server around a torrent service.
    #[must_use]
    pub fn new(service: TorrentService) -> Self {
        let state = Arc::new(ApiState::new(service));
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([CONTENT_TYPE]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();

                tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(nexus_telemetry::propagate_request_id_layer())
            .layer(nexus_telemetry::set_request_id_layer())
            .layer(trace_layer);

        let router = Self::public_routes()
            .merge(Self::torrent_routes())
            .merge(Self::client_routes())
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    fn public_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route("/health", get(health))
            .route("/api/v1/clients", get(list_clients))
            .route("/api/v1/clients/{client_id}/test", post(test_client))
    }

    fn torrent_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route(
                "/api/v1/torrents",
                get(torrents::list_torrents)
                    .post(
                        torrents::add_torrent
                            .layer(DefaultBodyLimit::max(torrents::MAX_ADD_BODY_BYTES)),
                    )
                    .delete(torrents::delete_torrents),
            )
            .route("/api/v1/torrents/pause", post(torrents::pause_torrents))
            .route("/api/v1/torrents/resume", post(torrents::resume_torrents))
            .route("/api/v1/torrents/recheck", post(torrents::recheck_torrents))
            .route(
                "/api/v1/torrents/reannounce",
                post(torrents::reannounce_torrents),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}",
                get(torrents::get_torrent),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/files",
                get(torrents::torrent_files),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/files/priority",
                post(torrents::set_file_priority),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/files/rename",
                post(torrents::rename_file),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/folders/rename",
                post(torrents::rename_folder),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/trackers",
                get(torrents::torrent_trackers).put(torrents::replace_trackers),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/trackers/add",
                post(torrents::add_trackers),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/trackers/remove",
                post(torrents::remove_trackers),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/peers",
                get(torrents::torrent_peers),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/properties",
                get(torrents::torrent_properties),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/pieces",
                get(torrents::torrent_pieces),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/location",
                post(torrents::set_location),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/name",
                post(torrents::set_name),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/force-start",
                post(torrents::set_force_start),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/auto-management",
                post(torrents::set_auto_management),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/sequential",
                post(torrents::set_sequential),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/first-last",
                post(torrents::set_first_last),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/super-seeding",
                post(torrents::set_super_seeding),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/share-limit",
                post(torrents::set_share_limit),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/category",
                post(torrents::set_category),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/tags",
                post(torrents::set_tags),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/tags/add",
                post(torrents::add_tags),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/tags/remove",
                post(torrents::remove_tags),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/limits",
                get(torrents::torrent_limits).post(torrents::set_limits),
            )
            .route(
                "/api/v1/clients/{client_id}/torrents/{hash}/priority",
                post(torrents::set_priority),
            )
    }

    fn client_routes() -> Router<Arc<ApiState>> {
        Router::new()
            .route(
                "/api/v1/clients/{client_id}/categories",
                get(admin::list_categories)
                    .post(admin::create_category)
                    .put(admin::edit_category)
                    .delete(admin::remove_categories),
            )
            .route(
                "/api/v1/clients/{client_id}/tags",
                get(admin::list_tags)
                    .post(admin::create_tags)
                    .delete(admin::delete_tags),
            )
            .route(
                "/api/v1/clients/{client_id}/limits",
                get(admin::global_limits).post(admin::set_global_limits),
            )
            .route("/api/v1/clients/{client_id}/alt-speed", get(admin::alt_speed))
            .route(
                "/api/v1/clients/{client_id}/alt-speed/toggle",
                post(admin::toggle_alt_speed),
            )
            .route(
                "/api/v1/clients/{client_id}/transfer",
                get(admin::transfer_info),
            )
            .route(
                "/api/v1/clients/{client_id}/free-space",
                get(admin::free_space),
            )
            .route("/api/v1/clients/{client_id}/server", get(admin::server_info))
            .route(
                "/api/v1/clients/{client_id}/default-save-path",
                get(admin::default_save_path),
            )
            .route("/api/v1/clients/{client_id}/shutdown", post(admin::shutdown))
            .route("/api/v1/clients/{client_id}/logs", get(admin::logs))
    }

    /// Bind `addr` and serve until the server stops.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        tracing::info!(%addr, "starting api");
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the server terminates unexpectedly.
    pub async fn serve_on(self, listener: TcpListener) -> ApiServerResult<()> {
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_orchestrator::{ClientRegistry, Registration};
    use nexus_test_support::{FakeDownloader, torrent};
    use nexus_torrent_core::{BackendKind, DownloaderClient};
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde_json::{Value, json};
    use std::net::Ipv4Addr;

    async fn spawn_server() -> anyhow::Result<String> {
        let fake: Arc<dyn DownloaderClient> = Arc::new(
            FakeDownloader::new("qb", BackendKind::Qbittorrent)
                .with_torrents(vec![torrent("qb", "aa")]),
        );
        let registry = ClientRegistry::new(vec![
            Registration::new(fake).with_display_name("Living room"),
        ])?;
        let server = ApiServer::new(TorrentService::new(Arc::new(registry)));
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await?;
        let addr = listener.local_addr()?;
        let _server = tokio::spawn(server.serve_on(listener));
        Ok(format!("http://{addr}"))
    }

    #[tokio::test]
    async fn health_and_listing_are_served() -> anyhow::Result<()> {
        let base = spawn_server().await?;
        let http = reqwest::Client::new();

        let health = http.get(format!("{base}/health")).send().await?;
        assert_eq!(health.status(), reqwest::StatusCode::OK);
        assert!(health.headers().contains_key(HEADER_REQUEST_ID));
        let body: Value = health.json().await?;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["clients"], 1);

        let clients: Value = http
            .get(format!("{base}/api/v1/clients"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(clients["data"][0]["type"], "qbittorrent");
        assert_eq!(clients["data"][0]["display_name"], "Living room");

        let listing: Value = http
            .get(format!("{base}/api/v1/torrents?client_id=qb"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(listing["success"], true);
        assert_eq!(listing["count"], 1);
        assert_eq!(listing["data"]["torrents"][0]["hash"], "aa");
        assert_eq!(listing["data"]["failures"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn errors_render_as_problem_details() -> anyhow::Result<()> {
        let base = spawn_server().await?;
        let http = reqwest::Client::new();

        let missing = http
            .get(format!("{base}/api/v1/clients/ghost/torrents/aa"))
            .send()
            .await?;
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        let problem: Value = missing.json().await?;
        assert_eq!(problem["type"], "https://down-nexus.dev/problems/not-found");
        assert_eq!(problem["status"], 404);

        let unsupported = http
            .get(format!("{base}/api/v1/clients/qb/torrents/aa/pieces"))
            .send()
            .await?;
        assert_eq!(unsupported.status(), reqwest::StatusCode::NOT_IMPLEMENTED);

        let empty_batch = http
            .post(format!("{base}/api/v1/torrents/pause"))
            .json(&json!({"client_id": "qb", "hashes": []}))
            .send()
            .await?;
        assert_eq!(empty_batch.status(), reqwest::StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn large_metainfo_within_cap_is_accepted() -> anyhow::Result<()> {
        let base = spawn_server().await?;
        let http = reqwest::Client::new();

        let within = STANDARD.encode(vec![7_u8; 3 * 1024 * 1024]);
        let accepted = http
            .post(format!("{base}/api/v1/torrents"))
            .json(&json!({"client_id": "qb", "torrent_file": within, "category": "iso"}))
            .send()
            .await?;
        assert_eq!(accepted.status(), reqwest::StatusCode::ACCEPTED);

        let over = STANDARD.encode(vec![7_u8; torrents::MAX_METAINFO_BYTES + 3]);
        let rejected = http
            .post(format!("{base}/api/v1/torrents"))
            .json(&json!({"client_id": "qb", "torrent_file": over}))
            .send()
            .await?;
        assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);
        Ok(())
    }
}

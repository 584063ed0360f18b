//! Startup sequence.
//!
//! # Design
//! - Configuration is loaded and validated before anything connects.
//! - A client that fails to connect is logged and skipped; startup only fails when none connect.
//! - Configured global limits are applied once after connecting; `0` leaves the backend as is.

use std::net::SocketAddr;
use std::sync::Arc;

use nexus_api::ApiServer;
use nexus_config::{AppConfig, ClientConfig, LogStyle, LoggingSettings};
use nexus_orchestrator::{AddDefaults, ClientRegistry, Registration, TorrentService};
use nexus_qbittorrent::QbitAdapter;
use nexus_telemetry::{LogFormat, LoggingConfig};
use nexus_torrent_core::{BackendKind, DownloaderClient, DownloaderResult};
use nexus_transmission::TransmissionAdapter;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

const BUILD_SHA: &str = match option_env!("NEXUS_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Entry point for the application boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging, client connection or the API server fails.
pub async fn run_app() -> AppResult<()> {
    let config = nexus_config::load().map_err(|err| AppError::config("config.load", err))?;
    run_app_with(config).await
}

/// Boot sequence over an already loaded configuration.
pub(crate) async fn run_app_with(config: AppConfig) -> AppResult<()> {
    init_telemetry(&config.logging)?;
    info!(build_sha = BUILD_SHA, "down-nexus bootstrap starting");

    let registrations = connect_clients(&config.clients).await?;
    let service = build_service(registrations)?;

    let addr = SocketAddr::new(config.server.bind_addr, config.server.port);
    info!(addr = %addr, "launching api listener");
    ApiServer::new(service)
        .serve(addr)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))
}

fn init_telemetry(settings: &LoggingSettings) -> AppResult<()> {
    let logging = LoggingConfig {
        level: &settings.level,
        format: log_format(settings.format),
        build_sha: BUILD_SHA,
    };
    nexus_telemetry::init_logging(&logging).map_err(|err| AppError::telemetry("telemetry.init", err))
}

const fn log_format(style: Option<LogStyle>) -> LogFormat {
    match style {
        Some(LogStyle::Json) => LogFormat::Json,
        Some(LogStyle::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    }
}

/// Connect every enabled client marked for startup, skipping the ones that fail.
pub(crate) async fn connect_clients(clients: &[ClientConfig]) -> AppResult<Vec<Registration>> {
    let eligible: Vec<&ClientConfig> = clients
        .iter()
        .filter(|client| client.connects_on_start())
        .collect();
    let mut registrations = Vec::with_capacity(eligible.len());
    for client in &eligible {
        let backend = client
            .backend()
            .map_err(|err| AppError::config("config.client_backend", err))?;
        match connect(client, backend).await {
            Ok(adapter) => {
                info!(client_id = %client.client_id, backend = %backend, "client connected");
                apply_global_limits(adapter.as_ref(), client).await;
                registrations.push(registration(adapter, client));
            }
            Err(err) => {
                warn!(
                    client_id = %client.client_id,
                    backend = %backend,
                    error = %err,
                    "client connection failed; skipping"
                );
            }
        }
    }
    if registrations.is_empty() {
        return Err(AppError::NoClients {
            attempted: eligible.len(),
        });
    }
    Ok(registrations)
}

async fn connect(
    client: &ClientConfig,
    backend: BackendKind,
) -> DownloaderResult<Arc<dyn DownloaderClient>> {
    Ok(match backend {
        BackendKind::Qbittorrent => Arc::new(
            QbitAdapter::connect(
                client.client_id.clone(),
                &client.host,
                &client.username,
                &client.password,
            )
            .await?,
        ),
        BackendKind::Transmission => Arc::new(
            TransmissionAdapter::connect(
                client.client_id.clone(),
                &client.host,
                &client.username,
                &client.password,
            )
            .await?,
        ),
    })
}

/// Push non-zero configured global limits to the backend; failures are logged only.
pub(crate) async fn apply_global_limits(adapter: &dyn DownloaderClient, client: &ClientConfig) {
    if client.global_download_limit != 0
        && let Err(err) = adapter
            .set_global_download_limit(client.global_download_limit)
            .await
    {
        warn!(
            client_id = %client.client_id,
            limit = client.global_download_limit,
            error = %err,
            "failed to apply global download limit"
        );
    }
    if client.global_upload_limit != 0
        && let Err(err) = adapter
            .set_global_upload_limit(client.global_upload_limit)
            .await
    {
        warn!(
            client_id = %client.client_id,
            limit = client.global_upload_limit,
            error = %err,
            "failed to apply global upload limit"
        );
    }
}

/// Registration carrying the client's display name and add defaults.
pub(crate) fn registration(adapter: Arc<dyn DownloaderClient>, client: &ClientConfig) -> Registration {
    let registration = Registration::new(adapter).with_defaults(AddDefaults {
        save_path: client.default_save_path.clone(),
        category: client.default_category.clone(),
        tags: client.default_tags.clone(),
    });
    if client.display_name.is_empty() {
        registration
    } else {
        registration.with_display_name(client.display_name.clone())
    }
}

pub(crate) fn build_service(registrations: Vec<Registration>) -> AppResult<TorrentService> {
    let registry = ClientRegistry::new(registrations)
        .map_err(|err| AppError::downloader("registry.new", err))?;
    info!(clients = registry.len(), "client registry ready");
    Ok(TorrentService::new(Arc::new(registry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_test_support::{FakeDownloader, torrent};

    fn client_config(client_id: &str, kind: &str, host: &str) -> anyhow::Result<ClientConfig> {
        let document = format!(
            r#"{{"clients": [{{"client_id": "{client_id}", "type": "{kind}", "host": "{host}"}}]}}"#
        );
        let mut config = nexus_config::parse_document(&document)?;
        Ok(config.clients.remove(0))
    }

    #[test]
    fn log_style_maps_to_format() {
        assert_eq!(log_format(Some(LogStyle::Json)), LogFormat::Json);
        assert_eq!(log_format(Some(LogStyle::Pretty)), LogFormat::Pretty);
        assert_eq!(log_format(None), LogFormat::infer());
    }

    #[tokio::test]
    async fn non_zero_limits_are_applied_and_zero_is_left_alone() -> anyhow::Result<()> {
        let fake = FakeDownloader::new("qb", BackendKind::Qbittorrent);
        let mut config = client_config("qb", "qbittorrent", "http://qb:8080")?;
        config.global_download_limit = 1_048_576;
        config.global_upload_limit = 0;

        apply_global_limits(&fake, &config).await;

        assert_eq!(fake.global_limits().await, (1_048_576, -1));
        let calls = fake.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, "set_global_download_limit");
        Ok(())
    }

    #[tokio::test]
    async fn registration_carries_display_name_and_defaults() -> anyhow::Result<()> {
        let fake: Arc<dyn DownloaderClient> = Arc::new(
            FakeDownloader::new("tr", BackendKind::Transmission)
                .with_torrents(vec![torrent("tr", "aa")]),
        );
        let mut config = client_config("tr", "transmission", "tr:9091")?;
        config.display_name = "Seedbox".to_string();
        config.default_category = "linux".to_string();

        let service = build_service(vec![registration(fake, &config)])?;

        let summaries = service.clients();
        assert_eq!(summaries[0].display_name, "Seedbox");
        assert_eq!(summaries[0].kind, BackendKind::Transmission);
        assert_eq!(service.test_connection("tr").await?, 1);
        Ok(())
    }

    #[test]
    fn duplicate_registrations_are_rejected() -> anyhow::Result<()> {
        let config = client_config("qb", "qbittorrent", "http://qb:8080")?;
        let first: Arc<dyn DownloaderClient> =
            Arc::new(FakeDownloader::new("qb", BackendKind::Qbittorrent));
        let second: Arc<dyn DownloaderClient> =
            Arc::new(FakeDownloader::new("qb", BackendKind::Qbittorrent));
        let err = build_service(vec![
            registration(first, &config),
            registration(second, &config),
        ])
        .err();
        assert!(matches!(
            err,
            Some(AppError::Downloader {
                operation: "registry.new",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_clients_are_skipped_until_none_remain() -> anyhow::Result<()> {
        let mut disabled = client_config("off", "transmission", "127.0.0.1:1")?;
        disabled.enabled = false;
        let unreachable = client_config("qb", "qbittorrent", "http://127.0.0.1:1")?;

        let err = connect_clients(&[disabled, unreachable]).await.err();

        assert!(matches!(err, Some(AppError::NoClients { attempted: 1 })));
        Ok(())
    }
}

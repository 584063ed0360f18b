//! Torrent service: routing, scatter-gather listing and filtering over the registry.
//!
//! # Design
//! - Stateless beyond the registry; every read goes live to the backends.
//! - Single-target operations resolve the client id first, so an unknown id never reaches a
//!   backend.
//! - Listing spawns one task per adapter and collects results in the awaiting task. Failed
//!   adapters are reported as [`ClientFailure`] entries instead of failing the whole call.
//! - No timeout is imposed on adapter calls: one hung backend holds the listing open until it
//!   returns, though it never blocks the other adapters' calls.

use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use nexus_torrent_core::{
    Category, DownloaderClient, DownloaderError, DownloaderResult, LogEntry, PeerInfo, ServerInfo,
    TorrentFile, TorrentOptions, TorrentProperties, TrackerInfo, TransferInfo, UnifiedTorrent,
    find_by_hash,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::registry::{ClientRegistry, ClientSummary, Registration};

/// Optional exact-match predicates; empty fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TorrentFilter {
    /// Restrict dispatch to one client.
    pub client_id: String,
    /// Required category.
    pub category: String,
    /// Required state.
    pub state: String,
    /// Tag the torrent must carry.
    pub tag: String,
}

impl TorrentFilter {
    fn matches(&self, torrent: &UnifiedTorrent) -> bool {
        (self.category.is_empty() || torrent.category == self.category)
            && (self.state.is_empty() || torrent.state == self.state)
            && (self.tag.is_empty() || torrent.tags.iter().any(|tag| tag == &self.tag))
    }
}

/// An adapter that failed during a multi-client listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientFailure {
    /// Client whose listing failed.
    pub client_id: String,
    /// Rendered error chain.
    pub message: String,
}

/// Merged listing with the clients that could not contribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedTorrents {
    /// Torrents from every successful client; each client's native order is preserved.
    pub torrents: Vec<UnifiedTorrent>,
    /// Clients excluded from `torrents`.
    pub failures: Vec<ClientFailure>,
}

/// Routing and aggregation facade over a [`ClientRegistry`].
#[derive(Clone)]
pub struct TorrentService {
    registry: Arc<ClientRegistry>,
}

impl TorrentService {
    /// Wrap a registry.
    #[must_use]
    pub const fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Registered clients in registration order.
    #[must_use]
    pub fn clients(&self) -> Vec<ClientSummary> {
        self.registry.iter().map(Registration::summary).collect()
    }

    /// Adapter registered under `client_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::ClientNotFound`] for unknown ids.
    pub fn client(&self, client_id: &str) -> DownloaderResult<Arc<dyn DownloaderClient>> {
        Ok(Arc::clone(self.registry.get(client_id)?.client()))
    }

    /// List torrents from every registered client.
    pub async fn list_all_torrents(&self) -> AggregatedTorrents {
        let clients = self
            .registry
            .iter()
            .map(|registration| Arc::clone(registration.client()))
            .collect();
        gather(clients).await
    }

    /// List torrents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::ClientNotFound`] when `filter.client_id` names no client.
    pub async fn list_filtered_torrents(
        &self,
        filter: &TorrentFilter,
    ) -> DownloaderResult<AggregatedTorrents> {
        let mut aggregated = if filter.client_id.is_empty() {
            self.list_all_torrents().await
        } else {
            gather(vec![self.client(&filter.client_id)?]).await
        };
        aggregated.torrents.retain(|torrent| filter.matches(torrent));
        Ok(aggregated)
    }

    /// Live listing against one client, used to check connectivity.
    ///
    /// # Errors
    ///
    /// Returns the routing or backend error.
    pub async fn test_connection(&self, client_id: &str) -> DownloaderResult<usize> {
        let torrents = self.client(client_id)?.get_torrents().await?;
        debug!(client_id, count = torrents.len(), "connection test succeeded");
        Ok(torrents.len())
    }

    /// One torrent resolved by hash after a fresh listing.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::NotFound`] when the listing lacks `hash`.
    pub async fn torrent_details(
        &self,
        client_id: &str,
        hash: &str,
    ) -> DownloaderResult<UnifiedTorrent> {
        let torrents = self.client(client_id)?.get_torrents().await?;
        find_by_hash(torrents, hash)
    }

    /// Add a torrent, filling empty save path, category and tags from the client's defaults.
    ///
    /// # Errors
    ///
    /// Returns the routing or backend error.
    pub async fn add_torrent(
        &self,
        client_id: &str,
        mut options: TorrentOptions,
    ) -> DownloaderResult<()> {
        let registration = self.registry.get(client_id)?;
        let defaults = registration.defaults();
        if options.save_path.is_empty() {
            options.save_path.clone_from(&defaults.save_path);
        }
        if options.category.is_empty() {
            options.category.clone_from(&defaults.category);
        }
        if options.tags.is_empty() {
            options.tags.clone_from(&defaults.tags);
        }
        registration.client().add_torrent_with_options(options).await
    }

    /// Add a torrent from a local metainfo file; defaults are applied like [`Self::add_torrent`].
    ///
    /// # Errors
    ///
    /// Returns the routing, IO or backend error.
    pub async fn add_torrent_from_file(
        &self,
        client_id: &str,
        path: &Path,
        options: TorrentOptions,
    ) -> DownloaderResult<()> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| DownloaderError::Io {
                operation: "add_torrent_from_file.read",
                path: path.to_path_buf(),
                source,
            })?;
        self.add_torrent(
            client_id,
            TorrentOptions {
                torrent_file: bytes,
                ..options
            },
        )
        .await
    }

    // ---- lifecycle ----

    /// Pause torrents on one client; stops at the first failing hash.
    ///
    /// # Errors
    ///
    /// Returns the routing error or the first per-item error.
    pub async fn pause_torrents(&self, client_id: &str, hashes: &[String]) -> DownloaderResult<()> {
        self.client(client_id)?.pause_torrents(hashes).await
    }

    /// Resume torrents on one client.
    ///
    /// # Errors
    ///
    /// Returns the routing error or the first per-item error.
    pub async fn resume_torrents(
        &self,
        client_id: &str,
        hashes: &[String],
    ) -> DownloaderResult<()> {
        self.client(client_id)?.resume_torrents(hashes).await
    }

    /// Remove torrents on one client.
    ///
    /// # Errors
    ///
    /// Returns the routing error or the first per-item error.
    pub async fn delete_torrents(
        &self,
        client_id: &str,
        hashes: &[String],
        delete_files: bool,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .delete_torrents(hashes, delete_files)
            .await
    }

    /// Recheck torrents on one client.
    ///
    /// # Errors
    ///
    /// Returns the routing error or the first per-item error.
    pub async fn recheck_torrents(
        &self,
        client_id: &str,
        hashes: &[String],
    ) -> DownloaderResult<()> {
        self.client(client_id)?.recheck_torrents(hashes).await
    }

    /// Reannounce torrents on one client.
    ///
    /// # Errors
    ///
    /// Returns the routing error or the first per-item error.
    pub async fn reannounce_torrents(
        &self,
        client_id: &str,
        hashes: &[String],
    ) -> DownloaderResult<()> {
        self.client(client_id)?.reannounce_torrents(hashes).await
    }

    // ---- mutation ----

    /// Move torrent data.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_torrent_location(
        &self,
        client_id: &str,
        hash: &str,
        location: &str,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .set_torrent_location(hash, location)
            .await
    }

    /// Rename a torrent.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_torrent_name(
        &self,
        client_id: &str,
        hash: &str,
        name: &str,
    ) -> DownloaderResult<()> {
        self.client(client_id)?.set_torrent_name(hash, name).await
    }

    /// Toggle force start.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_force_start(
        &self,
        client_id: &str,
        hash: &str,
        enabled: bool,
    ) -> DownloaderResult<()> {
        self.client(client_id)?.set_force_start(hash, enabled).await
    }

    /// Toggle automatic management.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_auto_management(
        &self,
        client_id: &str,
        hash: &str,
        enabled: bool,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .set_auto_management(hash, enabled)
            .await
    }

    /// Toggle sequential download.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_sequential_download(
        &self,
        client_id: &str,
        hash: &str,
        enabled: bool,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .set_sequential_download(hash, enabled)
            .await
    }

    /// Toggle first/last piece priority.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_first_last_piece_priority(
        &self,
        client_id: &str,
        hash: &str,
        enabled: bool,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .set_first_last_piece_priority(hash, enabled)
            .await
    }

    /// Toggle super-seeding.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_super_seeding(
        &self,
        client_id: &str,
        hash: &str,
        enabled: bool,
    ) -> DownloaderResult<()> {
        self.client(client_id)?.set_super_seeding(hash, enabled).await
    }

    /// Set ratio and seeding time limits.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_share_limit(
        &self,
        client_id: &str,
        hash: &str,
        ratio_limit: f64,
        seeding_time_limit: i64,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .set_share_limit(hash, ratio_limit, seeding_time_limit)
            .await
    }

    // ---- properties ----

    /// Replace the category.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_torrent_category(
        &self,
        client_id: &str,
        hash: &str,
        category: &str,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .set_torrent_category(hash, category)
            .await
    }

    /// Replace the tags.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_torrent_tags(
        &self,
        client_id: &str,
        hash: &str,
        tags: &[String],
    ) -> DownloaderResult<()> {
        self.client(client_id)?.set_torrent_tags(hash, tags).await
    }

    /// Add tags.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn add_torrent_tags(
        &self,
        client_id: &str,
        hash: &str,
        tags: &[String],
    ) -> DownloaderResult<()> {
        self.client(client_id)?.add_torrent_tags(hash, tags).await
    }

    /// Remove tags.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn remove_torrent_tags(
        &self,
        client_id: &str,
        hash: &str,
        tags: &[String],
    ) -> DownloaderResult<()> {
        self.client(client_id)?.remove_torrent_tags(hash, tags).await
    }

    /// Replace the tracker list.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_torrent_trackers(
        &self,
        client_id: &str,
        hash: &str,
        trackers: &[String],
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .set_torrent_trackers(hash, trackers)
            .await
    }

    /// Append trackers.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn add_torrent_trackers(
        &self,
        client_id: &str,
        hash: &str,
        trackers: &[String],
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .add_torrent_trackers(hash, trackers)
            .await
    }

    /// Remove trackers.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn remove_torrent_trackers(
        &self,
        client_id: &str,
        hash: &str,
        urls: &[String],
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .remove_torrent_trackers(hash, urls)
            .await
    }

    /// Set per-torrent download and upload limits; `None` leaves a direction unchanged.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_torrent_limits(
        &self,
        client_id: &str,
        hash: &str,
        download: Option<i64>,
        upload: Option<i64>,
    ) -> DownloaderResult<()> {
        let client = self.client(client_id)?;
        if let Some(limit) = download {
            client.set_torrent_download_limit(hash, limit).await?;
        }
        if let Some(limit) = upload {
            client.set_torrent_upload_limit(hash, limit).await?;
        }
        Ok(())
    }

    /// Per-torrent `(download, upload)` limits.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn torrent_limits(&self, client_id: &str, hash: &str) -> DownloaderResult<(i64, i64)> {
        let client = self.client(client_id)?;
        let download = client.get_torrent_download_limit(hash).await?;
        let upload = client.get_torrent_upload_limit(hash).await?;
        Ok((download, upload))
    }

    /// Set the backend-specific priority.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_torrent_priority(
        &self,
        client_id: &str,
        hash: &str,
        priority: i64,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .set_torrent_priority(hash, priority)
            .await
    }

    // ---- files ----

    /// Files inside a torrent.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn torrent_files(
        &self,
        client_id: &str,
        hash: &str,
    ) -> DownloaderResult<Vec<TorrentFile>> {
        self.client(client_id)?.get_torrent_files(hash).await
    }

    /// Set file priorities.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_file_priority(
        &self,
        client_id: &str,
        hash: &str,
        file_ids: &[i64],
        priority: i64,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .set_file_priority(hash, file_ids, priority)
            .await
    }

    /// Rename a file.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn rename_file(
        &self,
        client_id: &str,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .rename_file(hash, old_path, new_path)
            .await
    }

    /// Rename a folder.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn rename_folder(
        &self,
        client_id: &str,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .rename_folder(hash, old_path, new_path)
            .await
    }

    // ---- introspection ----

    /// Tracker state.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn torrent_trackers(
        &self,
        client_id: &str,
        hash: &str,
    ) -> DownloaderResult<Vec<TrackerInfo>> {
        self.client(client_id)?.get_torrent_trackers(hash).await
    }

    /// Connected peers.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn torrent_peers(
        &self,
        client_id: &str,
        hash: &str,
    ) -> DownloaderResult<Vec<PeerInfo>> {
        self.client(client_id)?.get_torrent_peers(hash).await
    }

    /// Detailed properties.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn torrent_properties(
        &self,
        client_id: &str,
        hash: &str,
    ) -> DownloaderResult<TorrentProperties> {
        self.client(client_id)?.get_torrent_properties(hash).await
    }

    /// Piece states.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn torrent_piece_states(
        &self,
        client_id: &str,
        hash: &str,
    ) -> DownloaderResult<Vec<i64>> {
        self.client(client_id)?.get_torrent_piece_states(hash).await
    }

    // ---- categories and tags ----

    /// Categories keyed by name.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn categories(&self, client_id: &str) -> DownloaderResult<BTreeMap<String, Category>> {
        self.client(client_id)?.get_categories().await
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn create_category(
        &self,
        client_id: &str,
        name: &str,
        save_path: &str,
    ) -> DownloaderResult<()> {
        self.client(client_id)?
            .create_category(name, save_path)
            .await
    }

    /// Change a category's save path.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn edit_category(
        &self,
        client_id: &str,
        name: &str,
        save_path: &str,
    ) -> DownloaderResult<()> {
        self.client(client_id)?.edit_category(name, save_path).await
    }

    /// Delete categories.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn remove_categories(&self, client_id: &str, names: &[String]) -> DownloaderResult<()> {
        self.client(client_id)?.remove_categories(names).await
    }

    /// Known tags.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn tags(&self, client_id: &str) -> DownloaderResult<Vec<String>> {
        self.client(client_id)?.get_tags().await
    }

    /// Register tags.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn create_tags(&self, client_id: &str, tags: &[String]) -> DownloaderResult<()> {
        self.client(client_id)?.create_tags(tags).await
    }

    /// Delete tags.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn delete_tags(&self, client_id: &str, tags: &[String]) -> DownloaderResult<()> {
        self.client(client_id)?.delete_tags(tags).await
    }

    // ---- global limits ----

    /// Global `(download, upload)` limits.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn global_limits(&self, client_id: &str) -> DownloaderResult<(i64, i64)> {
        let client = self.client(client_id)?;
        let download = client.get_global_download_limit().await?;
        let upload = client.get_global_upload_limit().await?;
        Ok((download, upload))
    }

    /// Set global limits; `None` leaves a direction unchanged.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn set_global_limits(
        &self,
        client_id: &str,
        download: Option<i64>,
        upload: Option<i64>,
    ) -> DownloaderResult<()> {
        let client = self.client(client_id)?;
        if let Some(limit) = download {
            client.set_global_download_limit(limit).await?;
        }
        if let Some(limit) = upload {
            client.set_global_upload_limit(limit).await?;
        }
        Ok(())
    }

    /// Whether alternative speed limits are active.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn alternative_speed_limits_enabled(&self, client_id: &str) -> DownloaderResult<bool> {
        self.client(client_id)?
            .get_alternative_speed_limits_enabled()
            .await
    }

    /// Flip alternative speed limits.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn toggle_alternative_speed_limits(&self, client_id: &str) -> DownloaderResult<()> {
        self.client(client_id)?
            .toggle_alternative_speed_limits()
            .await
    }

    // ---- transfer and server ----

    /// Transfer statistics.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn transfer_info(&self, client_id: &str) -> DownloaderResult<TransferInfo> {
        self.client(client_id)?.get_transfer_info().await
    }

    /// Free bytes at `path`.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn free_space(&self, client_id: &str, path: &str) -> DownloaderResult<i64> {
        self.client(client_id)?.get_free_space(path).await
    }

    /// Backend identification.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn server_info(&self, client_id: &str) -> DownloaderResult<ServerInfo> {
        self.client(client_id)?.get_server_info().await
    }

    /// Default download directory.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn default_save_path(&self, client_id: &str) -> DownloaderResult<String> {
        self.client(client_id)?.get_default_save_path().await
    }

    /// Stop the backend daemon.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn shutdown(&self, client_id: &str) -> DownloaderResult<()> {
        self.client(client_id)?.shutdown().await
    }

    /// Backend log lines newer than `last_known_id`.
    ///
    /// # Errors
    ///
    /// Returns the routing or adapter error.
    pub async fn logs(
        &self,
        client_id: &str,
        normal: bool,
        warning: bool,
        critical: bool,
        last_known_id: i64,
    ) -> DownloaderResult<Vec<LogEntry>> {
        self.client(client_id)?
            .get_logs(normal, warning, critical, last_known_id)
            .await
    }
}

/// List every client concurrently and merge in completion order.
async fn gather(clients: Vec<Arc<dyn DownloaderClient>>) -> AggregatedTorrents {
    let mut pending: Vec<String> = clients
        .iter()
        .map(|client| client.client_id().to_string())
        .collect();
    let mut tasks = JoinSet::new();
    for client in clients {
        tasks.spawn(async move {
            let result = client.get_torrents().await;
            (client.client_id().to_string(), result)
        });
    }

    let mut aggregated = AggregatedTorrents::default();
    while let Some(joined) = tasks.join_next().await {
        let Ok((client_id, result)) = joined else {
            continue;
        };
        pending.retain(|id| id != &client_id);
        match result {
            Ok(mut torrents) => aggregated.torrents.append(&mut torrents),
            Err(err) => {
                warn!(client_id = %client_id, error = %err, "client listing failed");
                aggregated.failures.push(ClientFailure {
                    client_id,
                    message: describe(&err),
                });
            }
        }
    }

    // Tasks that panicked never reported back.
    for client_id in pending {
        warn!(client_id = %client_id, "client listing task aborted");
        aggregated.failures.push(ClientFailure {
            client_id,
            message: "listing task aborted".to_string(),
        });
    }
    aggregated
}

/// Render an error and its sources as `outer: inner: ...`.
fn describe(err: &DownloaderError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

//! `DownloaderClient` implementation over the qBittorrent WebAPI.
//!
//! # Design
//! - Hash lists are joined with `|`; qBittorrent applies them natively, so batch methods are a
//!   single request each.
//! - A `404` on a hash-targeted call is reported as `NotFound`; every other transport failure
//!   becomes `Backend` carrying the client id and operation.
//! - Limits: unified `-1` (or any value `<= 0`) is written as qBittorrent's `0`; native `0` reads
//!   back as `-1`.
//! - Sequential download and first/last piece priority are toggles natively; setters read the
//!   current flag first so they are idempotent.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nexus_torrent_core::{
    BackendKind, Category, DownloaderClient, DownloaderError, DownloaderResult, LogEntry, PeerInfo,
    ServerInfo, TorrentFile, TorrentOptions, TorrentProperties, TrackerInfo, TransferInfo,
    UnifiedTorrent, unified_limit,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TransportError;
use crate::models::{
    CategoryEntry, FileEntry, LogLine, MainData, PeersResponse, PropertiesResponse, TorrentInfo,
    TrackerEntry, TransferInfoResponse,
};
use crate::transport::{HttpQbitTransport, MetainfoUpload, QbitTransport};

type Params = Vec<(&'static str, String)>;

/// qBittorrent backend adapter.
pub struct QbitAdapter {
    client_id: String,
    transport: Arc<dyn QbitTransport>,
}

impl QbitAdapter {
    /// Wrap an existing transport.
    #[must_use]
    pub fn new(client_id: impl Into<String>, transport: Arc<dyn QbitTransport>) -> Self {
        Self {
            client_id: client_id.into(),
            transport,
        }
    }

    /// Build an HTTP transport for `host` and authenticate.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the client cannot be built or the login is refused.
    pub async fn connect(
        client_id: impl Into<String>,
        host: &str,
        username: &str,
        password: &str,
    ) -> DownloaderResult<Self> {
        let client_id = client_id.into();
        let transport = HttpQbitTransport::new(host, username, password)
            .map_err(|err| DownloaderError::backend(client_id.clone(), "connect", None, err))?;
        let adapter = Self::new(client_id, Arc::new(transport));
        adapter.login().await?;
        Ok(adapter)
    }

    fn fail(&self, operation: &'static str, hash: Option<&str>, err: TransportError) -> DownloaderError {
        if let (Some(hash), Some(404)) = (hash, err.status()) {
            return DownloaderError::not_found(hash);
        }
        DownloaderError::backend(self.client_id.clone(), operation, hash, err)
    }

    async fn get_text(
        &self,
        operation: &'static str,
        hash: Option<&str>,
        endpoint: &str,
        query: &[(&'static str, String)],
    ) -> DownloaderResult<String> {
        self.transport
            .get(endpoint, query)
            .await
            .map_err(|err| self.fail(operation, hash, err))
    }

    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        operation: &'static str,
        hash: Option<&str>,
        endpoint: &str,
        query: &[(&'static str, String)],
    ) -> DownloaderResult<T> {
        let body = self.get_text(operation, hash, endpoint, query).await?;
        serde_json::from_str(&body).map_err(|source| {
            self.fail(
                operation,
                hash,
                TransportError::Decode {
                    endpoint: endpoint.to_string(),
                    source: Box::new(source),
                },
            )
        })
    }

    async fn get_number(&self, operation: &'static str, endpoint: &str) -> DownloaderResult<i64> {
        let body = self.get_text(operation, None, endpoint, &[]).await?;
        body.trim().parse::<i64>().map_err(|source| {
            self.fail(
                operation,
                None,
                TransportError::Decode {
                    endpoint: endpoint.to_string(),
                    source: Box::new(source),
                },
            )
        })
    }

    async fn post(
        &self,
        operation: &'static str,
        hash: Option<&str>,
        endpoint: &str,
        form: &[(&'static str, String)],
    ) -> DownloaderResult<()> {
        let body = self
            .transport
            .post(endpoint, form)
            .await
            .map_err(|err| self.fail(operation, hash, err))?;
        if body.trim() == "Fails." {
            return Err(self.fail(
                operation,
                hash,
                TransportError::Rejected {
                    endpoint: endpoint.to_string(),
                },
            ));
        }
        Ok(())
    }

    async fn post_hashes(
        &self,
        operation: &'static str,
        endpoint: &str,
        hashes: &[String],
        extra: Params,
    ) -> DownloaderResult<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let mut form = vec![("hashes", join_hashes(hashes))];
        form.extend(extra);
        let context = single(hashes);
        self.post(operation, context, endpoint, &form).await
    }

    /// Newer daemons renamed pause/resume to stop/start; fall back on `404`.
    async fn post_lifecycle(
        &self,
        operation: &'static str,
        endpoint: &str,
        legacy_endpoint: &str,
        hashes: &[String],
    ) -> DownloaderResult<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let form = vec![("hashes", join_hashes(hashes))];
        match self.transport.post(endpoint, &form).await {
            Ok(_) => Ok(()),
            Err(err) if err.status() == Some(404) => {
                debug!(
                    client_id = %self.client_id,
                    endpoint,
                    legacy_endpoint,
                    "endpoint missing; using legacy name"
                );
                self.post(operation, single(hashes), legacy_endpoint, &form)
                    .await
            }
            Err(err) => Err(self.fail(operation, single(hashes), err)),
        }
    }

    async fn info(&self, operation: &'static str, hash: &str) -> DownloaderResult<TorrentInfo> {
        let list: Vec<TorrentInfo> = self
            .get_json(
                operation,
                Some(hash),
                "torrents/info",
                &[("hashes", hash.to_ascii_lowercase())],
            )
            .await?;
        list.into_iter()
            .next()
            .ok_or_else(|| DownloaderError::not_found(hash))
    }

    async fn toggle_to(
        &self,
        operation: &'static str,
        hash: &str,
        current: bool,
        enabled: bool,
        endpoint: &str,
    ) -> DownloaderResult<()> {
        if current == enabled {
            return Ok(());
        }
        self.post_hashes(operation, endpoint, &[hash.to_string()], Vec::new())
            .await
    }

    async fn tracker_entries(
        &self,
        operation: &'static str,
        hash: &str,
    ) -> DownloaderResult<Vec<TrackerEntry>> {
        self.get_json(
            operation,
            Some(hash),
            "torrents/trackers",
            &[("hash", hash.to_ascii_lowercase())],
        )
        .await
    }

    async fn limit_for(
        &self,
        operation: &'static str,
        endpoint: &str,
        hash: &str,
    ) -> DownloaderResult<i64> {
        let key = hash.to_ascii_lowercase();
        let limits: BTreeMap<String, i64> = self
            .get_json(operation, Some(hash), endpoint, &[("hashes", key.clone())])
            .await?;
        limits
            .get(&key)
            .copied()
            .map(unified_limit)
            .ok_or_else(|| DownloaderError::not_found(hash))
    }

    async fn main_data(&self, operation: &'static str) -> DownloaderResult<MainData> {
        self.get_json(operation, None, "sync/maindata", &[("rid", "0".to_string())])
            .await
    }
}

#[async_trait]
impl DownloaderClient for QbitAdapter {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Qbittorrent
    }

    async fn login(&self) -> DownloaderResult<()> {
        self.transport
            .login()
            .await
            .map_err(|err| self.fail("login", None, err))
    }

    async fn get_torrents(&self) -> DownloaderResult<Vec<UnifiedTorrent>> {
        let list: Vec<TorrentInfo> = self
            .get_json("get_torrents", None, "torrents/info", &[])
            .await?;
        Ok(list
            .into_iter()
            .map(|info| info.into_unified(&self.client_id))
            .collect())
    }

    async fn get_torrent_details(&self, hash: &str) -> DownloaderResult<UnifiedTorrent> {
        let info = self.info("get_torrent_details", hash).await?;
        Ok(info.into_unified(&self.client_id))
    }

    async fn add_torrent_with_options(&self, options: TorrentOptions) -> DownloaderResult<()> {
        let (fields, upload) = add_request(&options)?;
        let body = self
            .transport
            .add(&fields, upload)
            .await
            .map_err(|err| self.fail("add_torrent", None, err))?;
        if body.trim() == "Fails." {
            return Err(self.fail(
                "add_torrent",
                None,
                TransportError::Rejected {
                    endpoint: "torrents/add".to_string(),
                },
            ));
        }
        Ok(())
    }

    async fn pause_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.pause_torrents(&[hash.to_string()]).await
    }

    async fn pause_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        self.post_lifecycle("pause_torrents", "torrents/stop", "torrents/pause", hashes)
            .await
    }

    async fn resume_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.resume_torrents(&[hash.to_string()]).await
    }

    async fn resume_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        self.post_lifecycle("resume_torrents", "torrents/start", "torrents/resume", hashes)
            .await
    }

    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> DownloaderResult<()> {
        self.delete_torrents(&[hash.to_string()], delete_files)
            .await
    }

    async fn delete_torrents(&self, hashes: &[String], delete_files: bool) -> DownloaderResult<()> {
        self.post_hashes(
            "delete_torrents",
            "torrents/delete",
            hashes,
            vec![("deleteFiles", delete_files.to_string())],
        )
        .await
    }

    async fn recheck_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.recheck_torrents(&[hash.to_string()]).await
    }

    async fn recheck_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        self.post_hashes("recheck_torrents", "torrents/recheck", hashes, Vec::new())
            .await
    }

    async fn reannounce_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.reannounce_torrents(&[hash.to_string()]).await
    }

    async fn reannounce_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        self.post_hashes(
            "reannounce_torrents",
            "torrents/reannounce",
            hashes,
            Vec::new(),
        )
        .await
    }

    async fn set_torrent_location(&self, hash: &str, location: &str) -> DownloaderResult<()> {
        self.post_hashes(
            "set_torrent_location",
            "torrents/setLocation",
            &[hash.to_string()],
            vec![("location", location.to_string())],
        )
        .await
    }

    async fn set_torrent_name(&self, hash: &str, name: &str) -> DownloaderResult<()> {
        self.post(
            "set_torrent_name",
            Some(hash),
            "torrents/rename",
            &[
                ("hash", hash.to_ascii_lowercase()),
                ("name", name.to_string()),
            ],
        )
        .await
    }

    async fn set_force_start(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        self.post_hashes(
            "set_force_start",
            "torrents/setForceStart",
            &[hash.to_string()],
            vec![("value", enabled.to_string())],
        )
        .await
    }

    async fn set_auto_management(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        self.post_hashes(
            "set_auto_management",
            "torrents/setAutoManagement",
            &[hash.to_string()],
            vec![("enable", enabled.to_string())],
        )
        .await
    }

    async fn set_sequential_download(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        let info = self.info("set_sequential_download", hash).await?;
        self.toggle_to(
            "set_sequential_download",
            hash,
            info.seq_dl,
            enabled,
            "torrents/toggleSequentialDownload",
        )
        .await
    }

    async fn set_first_last_piece_priority(
        &self,
        hash: &str,
        enabled: bool,
    ) -> DownloaderResult<()> {
        let info = self.info("set_first_last_piece_priority", hash).await?;
        self.toggle_to(
            "set_first_last_piece_priority",
            hash,
            info.f_l_piece_prio,
            enabled,
            "torrents/toggleFirstLastPiecePrio",
        )
        .await
    }

    async fn set_super_seeding(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        self.post_hashes(
            "set_super_seeding",
            "torrents/setSuperSeeding",
            &[hash.to_string()],
            vec![("value", enabled.to_string())],
        )
        .await
    }

    async fn set_share_limit(
        &self,
        hash: &str,
        ratio_limit: f64,
        seeding_time_limit: i64,
    ) -> DownloaderResult<()> {
        self.post_hashes(
            "set_share_limit",
            "torrents/setShareLimits",
            &[hash.to_string()],
            vec![
                ("ratioLimit", ratio_limit.to_string()),
                ("seedingTimeLimit", seeding_time_limit.to_string()),
                ("inactiveSeedingTimeLimit", "-2".to_string()),
            ],
        )
        .await
    }

    async fn set_torrent_category(&self, hash: &str, category: &str) -> DownloaderResult<()> {
        self.post_hashes(
            "set_torrent_category",
            "torrents/setCategory",
            &[hash.to_string()],
            vec![("category", category.to_string())],
        )
        .await
    }

    async fn set_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        // An empty tag list removes every tag.
        self.post_hashes(
            "set_torrent_tags",
            "torrents/removeTags",
            &[hash.to_string()],
            vec![("tags", String::new())],
        )
        .await?;
        self.add_torrent_tags(hash, tags).await
    }

    async fn add_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.post_hashes(
            "add_torrent_tags",
            "torrents/addTags",
            &[hash.to_string()],
            vec![("tags", tags.join(","))],
        )
        .await
    }

    async fn remove_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.post_hashes(
            "remove_torrent_tags",
            "torrents/removeTags",
            &[hash.to_string()],
            vec![("tags", tags.join(","))],
        )
        .await
    }

    async fn set_torrent_trackers(&self, hash: &str, trackers: &[String]) -> DownloaderResult<()> {
        let existing: Vec<String> = self
            .tracker_entries("set_torrent_trackers", hash)
            .await?
            .into_iter()
            .filter(|entry| !entry.is_pseudo())
            .map(|entry| entry.url)
            .collect();
        let stale: Vec<String> = existing
            .iter()
            .filter(|url| !trackers.contains(url))
            .cloned()
            .collect();
        let fresh: Vec<String> = trackers
            .iter()
            .filter(|url| !existing.contains(url))
            .cloned()
            .collect();
        self.remove_torrent_trackers(hash, &stale).await?;
        self.add_torrent_trackers(hash, &fresh).await
    }

    async fn add_torrent_trackers(&self, hash: &str, trackers: &[String]) -> DownloaderResult<()> {
        if trackers.is_empty() {
            return Ok(());
        }
        self.post(
            "add_torrent_trackers",
            Some(hash),
            "torrents/addTrackers",
            &[
                ("hash", hash.to_ascii_lowercase()),
                ("urls", trackers.join("\n")),
            ],
        )
        .await
    }

    async fn remove_torrent_trackers(&self, hash: &str, urls: &[String]) -> DownloaderResult<()> {
        if urls.is_empty() {
            return Ok(());
        }
        self.post(
            "remove_torrent_trackers",
            Some(hash),
            "torrents/removeTrackers",
            &[("hash", hash.to_ascii_lowercase()), ("urls", urls.join("|"))],
        )
        .await
    }

    async fn set_torrent_download_limit(&self, hash: &str, limit: i64) -> DownloaderResult<()> {
        self.post_hashes(
            "set_torrent_download_limit",
            "torrents/setDownloadLimit",
            &[hash.to_string()],
            vec![("limit", native_limit(limit).to_string())],
        )
        .await
    }

    async fn set_torrent_upload_limit(&self, hash: &str, limit: i64) -> DownloaderResult<()> {
        self.post_hashes(
            "set_torrent_upload_limit",
            "torrents/setUploadLimit",
            &[hash.to_string()],
            vec![("limit", native_limit(limit).to_string())],
        )
        .await
    }

    async fn get_torrent_download_limit(&self, hash: &str) -> DownloaderResult<i64> {
        self.limit_for("get_torrent_download_limit", "torrents/downloadLimit", hash)
            .await
    }

    async fn get_torrent_upload_limit(&self, hash: &str) -> DownloaderResult<i64> {
        self.limit_for("get_torrent_upload_limit", "torrents/uploadLimit", hash)
            .await
    }

    async fn set_torrent_priority(&self, hash: &str, priority: i64) -> DownloaderResult<()> {
        let Some(endpoint) = priority_endpoint(priority) else {
            return Ok(());
        };
        self.post_hashes(
            "set_torrent_priority",
            endpoint,
            &[hash.to_string()],
            Vec::new(),
        )
        .await
    }

    async fn get_torrent_files(&self, hash: &str) -> DownloaderResult<Vec<TorrentFile>> {
        let files: Vec<FileEntry> = self
            .get_json(
                "get_torrent_files",
                Some(hash),
                "torrents/files",
                &[("hash", hash.to_ascii_lowercase())],
            )
            .await?;
        Ok(files
            .into_iter()
            .enumerate()
            .map(|(position, file)| file.into_unified(position))
            .collect())
    }

    async fn set_file_priority(
        &self,
        hash: &str,
        file_ids: &[i64],
        priority: i64,
    ) -> DownloaderResult<()> {
        if file_ids.is_empty() {
            return Ok(());
        }
        let ids = file_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("|");
        self.post(
            "set_file_priority",
            Some(hash),
            "torrents/filePrio",
            &[
                ("hash", hash.to_ascii_lowercase()),
                ("id", ids),
                ("priority", priority.to_string()),
            ],
        )
        .await
    }

    async fn rename_file(&self, hash: &str, old_path: &str, new_path: &str) -> DownloaderResult<()> {
        self.post(
            "rename_file",
            Some(hash),
            "torrents/renameFile",
            &[
                ("hash", hash.to_ascii_lowercase()),
                ("oldPath", old_path.to_string()),
                ("newPath", new_path.to_string()),
            ],
        )
        .await
    }

    async fn rename_folder(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> DownloaderResult<()> {
        self.post(
            "rename_folder",
            Some(hash),
            "torrents/renameFolder",
            &[
                ("hash", hash.to_ascii_lowercase()),
                ("oldPath", old_path.to_string()),
                ("newPath", new_path.to_string()),
            ],
        )
        .await
    }

    async fn get_torrent_trackers(&self, hash: &str) -> DownloaderResult<Vec<TrackerInfo>> {
        Ok(self
            .tracker_entries("get_torrent_trackers", hash)
            .await?
            .into_iter()
            .filter(|entry| !entry.is_pseudo())
            .map(TrackerEntry::into_unified)
            .collect())
    }

    async fn get_torrent_peers(&self, hash: &str) -> DownloaderResult<Vec<PeerInfo>> {
        let response: PeersResponse = self
            .get_json(
                "get_torrent_peers",
                Some(hash),
                "sync/torrentPeers",
                &[("hash", hash.to_ascii_lowercase()), ("rid", "0".to_string())],
            )
            .await?;
        Ok(response.peers.into_values().map(PeerInfo::from).collect())
    }

    async fn get_torrent_properties(&self, hash: &str) -> DownloaderResult<TorrentProperties> {
        let response: PropertiesResponse = self
            .get_json(
                "get_torrent_properties",
                Some(hash),
                "torrents/properties",
                &[("hash", hash.to_ascii_lowercase())],
            )
            .await?;
        Ok(response.into_unified(hash))
    }

    async fn get_torrent_piece_states(&self, hash: &str) -> DownloaderResult<Vec<i64>> {
        self.get_json(
            "get_torrent_piece_states",
            Some(hash),
            "torrents/pieceStates",
            &[("hash", hash.to_ascii_lowercase())],
        )
        .await
    }

    async fn get_categories(&self) -> DownloaderResult<BTreeMap<String, Category>> {
        let native: BTreeMap<String, CategoryEntry> = self
            .get_json("get_categories", None, "torrents/categories", &[])
            .await?;
        Ok(native
            .into_iter()
            .map(|(key, entry)| {
                let mut category = Category::from(entry);
                if category.name.is_empty() {
                    category.name.clone_from(&key);
                }
                (key, category)
            })
            .collect())
    }

    async fn create_category(&self, name: &str, save_path: &str) -> DownloaderResult<()> {
        self.post(
            "create_category",
            None,
            "torrents/createCategory",
            &[
                ("category", name.to_string()),
                ("savePath", save_path.to_string()),
            ],
        )
        .await
    }

    async fn edit_category(&self, name: &str, save_path: &str) -> DownloaderResult<()> {
        self.post(
            "edit_category",
            None,
            "torrents/editCategory",
            &[
                ("category", name.to_string()),
                ("savePath", save_path.to_string()),
            ],
        )
        .await
    }

    async fn remove_categories(&self, names: &[String]) -> DownloaderResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        self.post(
            "remove_categories",
            None,
            "torrents/removeCategories",
            &[("categories", names.join("\n"))],
        )
        .await
    }

    async fn get_tags(&self) -> DownloaderResult<Vec<String>> {
        self.get_json("get_tags", None, "torrents/tags", &[]).await
    }

    async fn create_tags(&self, tags: &[String]) -> DownloaderResult<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.post(
            "create_tags",
            None,
            "torrents/createTags",
            &[("tags", tags.join(","))],
        )
        .await
    }

    async fn delete_tags(&self, tags: &[String]) -> DownloaderResult<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.post(
            "delete_tags",
            None,
            "torrents/deleteTags",
            &[("tags", tags.join(","))],
        )
        .await
    }

    async fn get_global_download_limit(&self) -> DownloaderResult<i64> {
        self.get_number("get_global_download_limit", "transfer/downloadLimit")
            .await
            .map(unified_limit)
    }

    async fn get_global_upload_limit(&self) -> DownloaderResult<i64> {
        self.get_number("get_global_upload_limit", "transfer/uploadLimit")
            .await
            .map(unified_limit)
    }

    async fn set_global_download_limit(&self, limit: i64) -> DownloaderResult<()> {
        self.post(
            "set_global_download_limit",
            None,
            "transfer/setDownloadLimit",
            &[("limit", native_limit(limit).to_string())],
        )
        .await
    }

    async fn set_global_upload_limit(&self, limit: i64) -> DownloaderResult<()> {
        self.post(
            "set_global_upload_limit",
            None,
            "transfer/setUploadLimit",
            &[("limit", native_limit(limit).to_string())],
        )
        .await
    }

    async fn get_alternative_speed_limits_enabled(&self) -> DownloaderResult<bool> {
        let mode = self
            .get_number(
                "get_alternative_speed_limits_enabled",
                "transfer/speedLimitsMode",
            )
            .await?;
        Ok(mode == 1)
    }

    async fn toggle_alternative_speed_limits(&self) -> DownloaderResult<()> {
        self.post(
            "toggle_alternative_speed_limits",
            None,
            "transfer/toggleSpeedLimitsMode",
            &[],
        )
        .await
    }

    async fn get_transfer_info(&self) -> DownloaderResult<TransferInfo> {
        let info: TransferInfoResponse = self
            .get_json("get_transfer_info", None, "transfer/info", &[])
            .await?;
        let state = self.main_data("get_transfer_info").await?.server_state;
        Ok(TransferInfo {
            download_speed: info.dl_info_speed,
            upload_speed: info.up_info_speed,
            downloaded_bytes: info.dl_info_data,
            uploaded_bytes: info.up_info_data,
            download_speed_limit: unified_limit(info.dl_rate_limit),
            upload_speed_limit: unified_limit(info.up_rate_limit),
            dht: info.dht_nodes,
            connection_status: info.connection_status,
            total_peers_connected: state.total_peer_connections,
            total_buffers_size: state.total_buffers_size,
            total_wasted: state.total_wasted_session,
            alternative_speed_limits: state.use_alt_speed_limits,
            free_space_on_disk: state.free_space_on_disk,
        })
    }

    /// qBittorrent only reports free space for its default download disk; `path` is ignored.
    async fn get_free_space(&self, path: &str) -> DownloaderResult<i64> {
        let _ = path;
        Ok(self
            .main_data("get_free_space")
            .await?
            .server_state
            .free_space_on_disk)
    }

    async fn get_server_info(&self) -> DownloaderResult<ServerInfo> {
        let version = self
            .get_text("get_server_info", None, "app/version", &[])
            .await?;
        let api_version = self
            .get_text("get_server_info", None, "app/webapiVersion", &[])
            .await?;
        let default_save_path = self.get_default_save_path().await?;
        let build_info: Value = self
            .get_json("get_server_info", None, "app/buildInfo", &[])
            .await?;
        let mut extra = Map::new();
        extra.insert("build_info".to_string(), build_info);
        Ok(ServerInfo {
            backend: BackendKind::Qbittorrent,
            version: version.trim().to_string(),
            api_version: api_version.trim().to_string(),
            default_save_path,
            extra,
        })
    }

    async fn get_default_save_path(&self) -> DownloaderResult<String> {
        let path = self
            .get_text("get_default_save_path", None, "app/defaultSavePath", &[])
            .await?;
        Ok(path.trim().to_string())
    }

    async fn shutdown(&self) -> DownloaderResult<()> {
        self.post("shutdown", None, "app/shutdown", &[]).await
    }

    async fn get_logs(
        &self,
        normal: bool,
        warning: bool,
        critical: bool,
        last_known_id: i64,
    ) -> DownloaderResult<Vec<LogEntry>> {
        let lines: Vec<LogLine> = self
            .get_json(
                "get_logs",
                None,
                "log/main",
                &[
                    ("normal", normal.to_string()),
                    ("info", normal.to_string()),
                    ("warning", warning.to_string()),
                    ("critical", critical.to_string()),
                    ("last_known_id", last_known_id.to_string()),
                ],
            )
            .await?;
        Ok(lines
            .into_iter()
            .filter(|line| line.id > last_known_id)
            .map(LogEntry::from)
            .collect())
    }
}

fn join_hashes(hashes: &[String]) -> String {
    hashes
        .iter()
        .map(|hash| hash.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("|")
}

fn single(hashes: &[String]) -> Option<&str> {
    match hashes {
        [only] => Some(only.as_str()),
        _ => None,
    }
}

const fn native_limit(limit: i64) -> i64 {
    if limit <= 0 { 0 } else { limit }
}

/// qBittorrent only moves torrents within the queue; map the requested level to a move.
///
/// Reads report the queue position, and `0` means the torrent is not queued, so writing it
/// back leaves the queue alone.
const fn priority_endpoint(priority: i64) -> Option<&'static str> {
    match priority {
        i64::MIN..=0 | 5 => None,
        1 => Some("torrents/topPrio"),
        2..=4 => Some("torrents/increasePrio"),
        6..=8 => Some("torrents/decreasePrio"),
        _ => Some("torrents/bottomPrio"),
    }
}

fn add_request(options: &TorrentOptions) -> DownloaderResult<(Params, Option<MetainfoUpload>)> {
    let mut fields: Params = Vec::new();
    let upload = if options.has_torrent_file() {
        Some(MetainfoUpload {
            file_name: "upload.torrent".to_string(),
            bytes: options.torrent_file.clone(),
        })
    } else if options.url.trim().is_empty() {
        return Err(DownloaderError::InvalidInput {
            field: "url",
            reason: "url_or_file_required",
        });
    } else {
        fields.push(("urls", options.url.trim().to_string()));
        None
    };

    let text = |fields: &mut Params, name: &'static str, value: &str| {
        if !value.is_empty() {
            fields.push((name, value.to_string()));
        }
    };
    text(&mut fields, "savepath", &options.save_path);
    text(&mut fields, "category", &options.category);
    text(&mut fields, "tags", &options.tags.join(","));
    text(&mut fields, "rename", &options.rename);
    text(&mut fields, "contentLayout", &options.content_layout);

    let flags = [
        ("sequentialDownload", options.sequential),
        ("firstLastPiecePrio", options.first_last_piece),
        ("skip_checking", options.skip_checking),
        ("paused", options.paused),
        ("stopped", options.paused),
        ("autoTMM", options.auto_management),
        ("root_folder", options.root_folder),
    ];
    for (name, enabled) in flags {
        if enabled {
            fields.push((name, "true".to_string()));
        }
    }

    if options.download_limit > 0 {
        fields.push(("dlLimit", options.download_limit.to_string()));
    }
    if options.upload_limit > 0 {
        fields.push(("upLimit", options.upload_limit.to_string()));
    }
    if options.ratio_limit > 0.0 {
        fields.push(("ratioLimit", options.ratio_limit.to_string()));
    }
    if options.seeding_time_limit > 0 {
        fields.push(("seedingTimeLimit", options.seeding_time_limit.to_string()));
    }
    Ok((fields, upload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportResult;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Call {
        method: &'static str,
        endpoint: String,
        params: Params,
    }

    #[derive(Default)]
    struct ScriptedTransport {
        calls: Mutex<Vec<Call>>,
        responses: Mutex<HashMap<String, String>>,
        missing: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn respond(self, endpoint: &str, body: &str) -> Self {
            self.responses
                .lock()
                .expect("lock")
                .insert(endpoint.to_string(), body.to_string());
            self
        }

        fn missing(self, endpoint: &str) -> Self {
            self.missing
                .lock()
                .expect("lock")
                .push(endpoint.to_string());
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("lock").clone()
        }

        fn endpoints(&self) -> Vec<String> {
            self.calls().into_iter().map(|call| call.endpoint).collect()
        }

        fn reply(
            &self,
            method: &'static str,
            endpoint: &str,
            params: Params,
        ) -> TransportResult<String> {
            self.calls.lock().expect("lock").push(Call {
                method,
                endpoint: endpoint.to_string(),
                params,
            });
            if self
                .missing
                .lock()
                .expect("lock")
                .iter()
                .any(|entry| entry == endpoint)
            {
                return Err(TransportError::Status {
                    endpoint: endpoint.to_string(),
                    status: 404,
                    body: String::new(),
                });
            }
            Ok(self
                .responses
                .lock()
                .expect("lock")
                .get(endpoint)
                .cloned()
                .unwrap_or_else(|| "Ok.".to_string()))
        }
    }

    #[async_trait]
    impl QbitTransport for ScriptedTransport {
        async fn login(&self) -> TransportResult<()> {
            self.reply("POST", "auth/login", Vec::new()).map(|_| ())
        }

        async fn get(
            &self,
            endpoint: &str,
            query: &[(&'static str, String)],
        ) -> TransportResult<String> {
            self.reply("GET", endpoint, query.to_vec())
        }

        async fn post(
            &self,
            endpoint: &str,
            form: &[(&'static str, String)],
        ) -> TransportResult<String> {
            self.reply("POST", endpoint, form.to_vec())
        }

        async fn add(
            &self,
            fields: &[(&'static str, String)],
            torrent: Option<MetainfoUpload>,
        ) -> TransportResult<String> {
            let mut params = fields.to_vec();
            if let Some(upload) = torrent {
                params.push(("torrents", format!("{} bytes", upload.bytes.len())));
            }
            self.reply("MULTIPART", "torrents/add", params)
        }
    }

    fn adapter(transport: ScriptedTransport) -> (QbitAdapter, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (QbitAdapter::new("qb-main", transport.clone()), transport)
    }

    fn param<'a>(call: &'a Call, name: &str) -> Option<&'a str> {
        call.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    #[tokio::test]
    async fn get_torrents_tags_client_and_lowercases_hash() -> anyhow::Result<()> {
        let (adapter, _) = adapter(ScriptedTransport::default().respond(
            "torrents/info",
            r#"[{"hash":"AAAA","name":"one","category":"movies","tags":"a,b"},
                {"hash":"bbbb","name":"two"}]"#,
        ));
        let torrents = adapter.get_torrents().await?;
        assert_eq!(torrents.len(), 2);
        assert_eq!(torrents[0].hash, "aaaa");
        assert_eq!(torrents[0].client_id, "qb-main");
        assert_eq!(torrents[0].category, "movies");
        assert_eq!(torrents[1].name, "two");
        Ok(())
    }

    #[tokio::test]
    async fn unqueued_priority_writes_back_without_moving() -> anyhow::Result<()> {
        let (adapter, transport) = adapter(ScriptedTransport::default().respond(
            "torrents/info",
            r#"[{"hash":"aaaa","name":"one","priority":0}]"#,
        ));
        let read = adapter.get_torrents().await?[0].priority;
        adapter.set_torrent_priority("aaaa", read).await?;
        assert_eq!(transport.endpoints(), vec!["torrents/info".to_string()]);

        adapter.set_torrent_priority("aaaa", 1).await?;
        assert_eq!(transport.endpoints()[1], "torrents/topPrio");
        Ok(())
    }

    #[tokio::test]
    async fn pause_falls_back_to_legacy_endpoint() -> anyhow::Result<()> {
        let (adapter, transport) = adapter(ScriptedTransport::default().missing("torrents/stop"));
        adapter
            .pause_torrents(&["AA".to_string(), "bb".to_string()])
            .await?;
        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].endpoint, "torrents/pause");
        assert_eq!(param(&calls[1], "hashes"), Some("aa|bb"));
        Ok(())
    }

    #[tokio::test]
    async fn limit_round_trip_uses_unlimited_sentinel() -> anyhow::Result<()> {
        let (adapter, transport) = adapter(
            ScriptedTransport::default()
                .respond("torrents/downloadLimit", r#"{"abc":2048}"#)
                .respond("torrents/uploadLimit", r#"{"abc":0}"#),
        );
        adapter.set_torrent_download_limit("abc", 2048).await?;
        adapter.set_torrent_upload_limit("abc", -1).await?;
        assert_eq!(adapter.get_torrent_download_limit("abc").await?, 2048);
        assert_eq!(adapter.get_torrent_upload_limit("abc").await?, -1);

        let calls = transport.calls();
        assert_eq!(param(&calls[0], "limit"), Some("2048"));
        assert_eq!(param(&calls[1], "limit"), Some("0"));
        Ok(())
    }

    #[tokio::test]
    async fn sequential_setter_only_toggles_on_mismatch() -> anyhow::Result<()> {
        let (adapter, transport) = adapter(
            ScriptedTransport::default()
                .respond("torrents/info", r#"[{"hash":"abc","seq_dl":true}]"#),
        );
        adapter.set_sequential_download("abc", true).await?;
        assert!(
            !transport
                .endpoints()
                .contains(&"torrents/toggleSequentialDownload".to_string())
        );
        adapter.set_sequential_download("abc", false).await?;
        assert!(
            transport
                .endpoints()
                .contains(&"torrents/toggleSequentialDownload".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn sequential_setter_reports_missing_torrent() {
        let (adapter, _) =
            adapter(ScriptedTransport::default().respond("torrents/info", "[]"));
        let err = adapter
            .set_sequential_download("ffff", true)
            .await
            .expect_err("missing");
        assert!(matches!(err, DownloaderError::NotFound { ref hash } if hash == "ffff"));
    }

    #[test]
    fn priority_levels_map_to_queue_moves() {
        assert_eq!(priority_endpoint(0), None);
        assert_eq!(priority_endpoint(1), Some("torrents/topPrio"));
        assert_eq!(priority_endpoint(3), Some("torrents/increasePrio"));
        assert_eq!(priority_endpoint(5), None);
        assert_eq!(priority_endpoint(7), Some("torrents/decreasePrio"));
        assert_eq!(priority_endpoint(12), Some("torrents/bottomPrio"));
    }

    #[tokio::test]
    async fn metainfo_bytes_take_precedence_over_url() -> anyhow::Result<()> {
        let (adapter, transport) = adapter(ScriptedTransport::default());
        adapter
            .add_torrent_with_options(TorrentOptions {
                url: "magnet:?xt=urn:btih:aa".into(),
                torrent_file: vec![1, 2, 3],
                category: "tv".into(),
                tags: vec!["x".into(), "y".into()],
                paused: true,
                ..TorrentOptions::default()
            })
            .await?;
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(param(call, "urls"), None);
        assert_eq!(param(call, "torrents"), Some("3 bytes"));
        assert_eq!(param(call, "category"), Some("tv"));
        assert_eq!(param(call, "tags"), Some("x,y"));
        assert_eq!(param(call, "stopped"), Some("true"));
        Ok(())
    }

    #[tokio::test]
    async fn add_without_source_is_rejected_locally() {
        let (adapter, transport) = adapter(ScriptedTransport::default());
        let err = adapter
            .add_torrent_with_options(TorrentOptions::default())
            .await
            .expect_err("no source");
        assert!(matches!(err, DownloaderError::InvalidInput { field: "url", .. }));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn add_rejected_by_daemon_is_backend_error() {
        let (adapter, _) = adapter(ScriptedTransport::default().respond("torrents/add", "Fails."));
        let err = adapter
            .add_torrent("magnet:?xt=urn:btih:aa")
            .await
            .expect_err("rejected");
        assert!(matches!(err, DownloaderError::Backend { operation: "add_torrent", .. }));
    }

    #[tokio::test]
    async fn missing_hash_on_properties_is_not_found() {
        let (adapter, _) = adapter(ScriptedTransport::default().missing("torrents/properties"));
        let err = adapter
            .get_torrent_properties("dead")
            .await
            .expect_err("404");
        assert!(matches!(err, DownloaderError::NotFound { ref hash } if hash == "dead"));
    }

    #[tokio::test]
    async fn set_trackers_replaces_without_touching_pseudo_entries() -> anyhow::Result<()> {
        let (adapter, transport) = adapter(ScriptedTransport::default().respond(
            "torrents/trackers",
            r#"[{"url":"** [DHT] **","tier":""},
                {"url":"udp://old.example:80","tier":0},
                {"url":"udp://keep.example:80","tier":1}]"#,
        ));
        adapter
            .set_torrent_trackers(
                "abc",
                &[
                    "udp://keep.example:80".to_string(),
                    "udp://new.example:80".to_string(),
                ],
            )
            .await?;
        let calls = transport.calls();
        let removed = calls
            .iter()
            .find(|call| call.endpoint == "torrents/removeTrackers")
            .expect("remove call");
        assert_eq!(param(removed, "urls"), Some("udp://old.example:80"));
        let added = calls
            .iter()
            .find(|call| call.endpoint == "torrents/addTrackers")
            .expect("add call");
        assert_eq!(param(added, "urls"), Some("udp://new.example:80"));
        Ok(())
    }

    #[tokio::test]
    async fn logs_are_filtered_past_last_known_id() -> anyhow::Result<()> {
        let (adapter, _) = adapter(ScriptedTransport::default().respond(
            "log/main",
            r#"[{"id":4,"message":"old","timestamp":1,"type":1},
                {"id":5,"message":"new","timestamp":2,"type":4}]"#,
        ));
        let logs = adapter.get_logs(true, true, true, 4).await?;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "new");
        assert_eq!(logs[0].kind, 4);
        Ok(())
    }

    #[tokio::test]
    async fn transfer_info_merges_server_state() -> anyhow::Result<()> {
        let (adapter, _) = adapter(
            ScriptedTransport::default()
                .respond(
                    "transfer/info",
                    r#"{"dl_info_speed":100,"up_info_speed":50,"dl_rate_limit":0,
                        "up_rate_limit":1024,"dht_nodes":12,"connection_status":"connected"}"#,
                )
                .respond(
                    "sync/maindata",
                    r#"{"server_state":{"free_space_on_disk":999,"use_alt_speed_limits":true}}"#,
                ),
        );
        let info = adapter.get_transfer_info().await?;
        assert_eq!(info.download_speed, 100);
        assert_eq!(info.download_speed_limit, -1);
        assert_eq!(info.upload_speed_limit, 1024);
        assert_eq!(info.free_space_on_disk, 999);
        assert!(info.alternative_speed_limits);
        Ok(())
    }

    #[tokio::test]
    async fn set_tags_clears_then_adds() -> anyhow::Result<()> {
        let (adapter, transport) = adapter(ScriptedTransport::default());
        adapter
            .set_torrent_tags("abc", &["one".to_string()])
            .await?;
        let calls = transport.calls();
        assert_eq!(calls[0].endpoint, "torrents/removeTags");
        assert_eq!(param(&calls[0], "tags"), Some(""));
        assert_eq!(calls[1].endpoint, "torrents/addTags");
        assert_eq!(calls[1].method, "POST");
        Ok(())
    }
}

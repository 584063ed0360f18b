//! `DownloaderClient` implementation over the Transmission RPC.
//!
//! # Design
//! - Transmission addresses torrents by numeric id. Every hash-targeted call resolves ids with
//!   a fresh `torrent-get`, so a hash missing from the listing is `NotFound`.
//! - Batches resolve all hashes first, apply the resolved prefix in one native call, then
//!   report the first missing hash.
//! - Categories do not exist natively; a `category:<name>` label carries them and every other
//!   label is a tag. Setters rewrite the full label list, preserving the other half.
//! - Sequential download, first/last piece priority, super-seeding and auto-management have
//!   no Transmission counterpart and succeed without effect.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use nexus_torrent_core::{
    BackendKind, Category, DownloaderClient, DownloaderError, DownloaderResult, PeerInfo,
    ServerInfo, TorrentFile, TorrentOptions, TorrentProperties, TrackerInfo, TransferInfo,
    UnifiedTorrent,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::convert::{
    CATEGORY_PREFIX, bandwidth_priority, category_of, compose_labels, file_priority_key,
    kbps_from_limit, limit_from_kbps, seed_limit, tags_of,
};
use crate::error::RpcError;
use crate::models::{
    FreeSpace, ID_FIELDS, LIST_FIELDS, PROPERTY_FIELDS, SessionArgs, SessionStats,
    TorrentAddResponse, TorrentGetResponse, TorrentRecord,
};
use crate::transport::{HttpRpcTransport, RpcTransport};

/// Transmission backend adapter.
pub struct TransmissionAdapter {
    client_id: String,
    transport: Arc<dyn RpcTransport>,
}

impl TransmissionAdapter {
    /// Wrap an existing transport.
    #[must_use]
    pub fn new(client_id: impl Into<String>, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            client_id: client_id.into(),
            transport,
        }
    }

    /// Build an HTTP transport for `host` and verify the session.
    ///
    /// # Errors
    ///
    /// Returns `Backend` if the client cannot be built or the daemon refuses the session.
    pub async fn connect(
        client_id: impl Into<String>,
        host: &str,
        username: &str,
        password: &str,
    ) -> DownloaderResult<Self> {
        let client_id = client_id.into();
        let transport = HttpRpcTransport::new(host, username, password)
            .map_err(|err| DownloaderError::backend(client_id.clone(), "connect", None, err))?;
        let adapter = Self::new(client_id, Arc::new(transport));
        adapter.login().await?;
        Ok(adapter)
    }

    fn fail(&self, operation: &'static str, hash: Option<&str>, err: RpcError) -> DownloaderError {
        DownloaderError::backend(self.client_id.clone(), operation, hash, err)
    }

    async fn rpc(
        &self,
        operation: &'static str,
        hash: Option<&str>,
        method: &str,
        arguments: Value,
    ) -> DownloaderResult<Value> {
        self.transport
            .call(method, arguments)
            .await
            .map_err(|err| self.fail(operation, hash, err))
    }

    fn decode<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: &str,
        value: Value,
    ) -> DownloaderResult<T> {
        serde_json::from_value(value).map_err(|source| {
            self.fail(
                operation,
                None,
                RpcError::Decode {
                    method: method.to_string(),
                    source,
                },
            )
        })
    }

    async fn torrents(
        &self,
        operation: &'static str,
        fields: &[&str],
    ) -> DownloaderResult<Vec<TorrentRecord>> {
        let value = self
            .rpc(operation, None, "torrent-get", json!({ "fields": fields }))
            .await?;
        let response: TorrentGetResponse = self.decode(operation, "torrent-get", value)?;
        Ok(response.torrents)
    }

    /// Fresh lookup of one torrent; `fields` must include `hashString`.
    async fn record(
        &self,
        operation: &'static str,
        hash: &str,
        fields: &[&str],
    ) -> DownloaderResult<TorrentRecord> {
        self.torrents(operation, fields)
            .await?
            .into_iter()
            .find(|record| record.matches(hash))
            .ok_or_else(|| DownloaderError::not_found(hash))
    }

    /// Resolve hashes in order, stopping at the first one missing.
    async fn resolve(
        &self,
        operation: &'static str,
        hashes: &[String],
    ) -> DownloaderResult<(Vec<i64>, Option<String>)> {
        let records = self.torrents(operation, ID_FIELDS).await?;
        let mut ids = Vec::with_capacity(hashes.len());
        for hash in hashes {
            match records.iter().find(|record| record.matches(hash)) {
                Some(record) => ids.push(record.id),
                None => return Ok((ids, Some(hash.clone()))),
            }
        }
        Ok((ids, None))
    }

    async fn apply(
        &self,
        operation: &'static str,
        hashes: &[String],
        method: &str,
        arguments: Value,
    ) -> DownloaderResult<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let (ids, missing) = self.resolve(operation, hashes).await?;
        if !ids.is_empty() {
            let context = match hashes {
                [only] => Some(only.as_str()),
                _ => None,
            };
            self.rpc(operation, context, method, with_ids(arguments, &ids))
                .await?;
        }
        missing.map_or(Ok(()), |hash| Err(DownloaderError::not_found(hash)))
    }

    async fn apply_one(
        &self,
        operation: &'static str,
        hash: &str,
        method: &str,
        arguments: Value,
    ) -> DownloaderResult<()> {
        self.apply(operation, &[hash.to_string()], method, arguments)
            .await
    }

    async fn set_by_id(
        &self,
        operation: &'static str,
        hash: &str,
        id: i64,
        arguments: Value,
    ) -> DownloaderResult<()> {
        self.rpc(operation, Some(hash), "torrent-set", with_ids(arguments, &[id]))
            .await
            .map(|_| ())
    }

    /// Read the torrent's labels, let `rewrite` produce the new list, and store it.
    async fn rewrite_labels<F>(
        &self,
        operation: &'static str,
        hash: &str,
        rewrite: F,
    ) -> DownloaderResult<()>
    where
        F: FnOnce(String, Vec<String>) -> Vec<String> + Send,
    {
        let record = self
            .record(operation, hash, &["id", "hashString", "labels"])
            .await?;
        let labels = rewrite(category_of(&record.labels), tags_of(&record.labels));
        self.set_by_id(operation, hash, record.id, json!({ "labels": labels }))
            .await
    }

    /// Rewrite labels on every torrent where `rewrite` reports a change.
    async fn rewrite_all_labels<F>(&self, operation: &'static str, rewrite: F) -> DownloaderResult<()>
    where
        F: Fn(String, Vec<String>) -> Option<Vec<String>> + Send + Sync,
    {
        let records = self
            .torrents(operation, &["id", "hashString", "labels"])
            .await?;
        for record in records {
            if let Some(labels) = rewrite(category_of(&record.labels), tags_of(&record.labels)) {
                self.set_by_id(
                    operation,
                    &record.hash_string,
                    record.id,
                    json!({ "labels": labels }),
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn session(&self, operation: &'static str) -> DownloaderResult<SessionArgs> {
        let value = self.rpc(operation, None, "session-get", json!({})).await?;
        self.decode(operation, "session-get", value)
    }

    async fn free_space_at(&self, operation: &'static str, path: &str) -> DownloaderResult<i64> {
        let value = self
            .rpc(operation, None, "free-space", json!({ "path": path }))
            .await?;
        let space: FreeSpace = self.decode(operation, "free-space", value)?;
        Ok(space.size_bytes)
    }

    async fn set_session_limit(
        &self,
        operation: &'static str,
        key: &str,
        limit: i64,
    ) -> DownloaderResult<()> {
        let mut arguments = Map::new();
        let enabled_key = format!("{key}-enabled");
        match kbps_from_limit(limit) {
            Some(kbps) => {
                arguments.insert(key.to_string(), json!(kbps));
                arguments.insert(enabled_key, json!(true));
            }
            None => {
                arguments.insert(enabled_key, json!(false));
            }
        }
        self.rpc(operation, None, "session-set", Value::Object(arguments))
            .await
            .map(|_| ())
    }

    async fn rename_path(
        &self,
        operation: &'static str,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> DownloaderResult<()> {
        let old = Path::new(old_path);
        let new = Path::new(new_path);
        if new.parent() != old.parent() {
            return Err(DownloaderError::InvalidInput {
                field: "new_path",
                reason: "parent_directory_must_match",
            });
        }
        let name = new
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(DownloaderError::InvalidInput {
                field: "new_path",
                reason: "missing_file_name",
            })?;
        self.apply_one(
            operation,
            hash,
            "torrent-rename-path",
            json!({ "path": old_path, "name": name }),
        )
        .await
    }
}

fn with_ids(mut arguments: Value, ids: &[i64]) -> Value {
    if let Value::Object(map) = &mut arguments {
        map.insert("ids".to_string(), json!(ids));
    }
    arguments
}

/// Tags may not carry the label prefix that stores the category.
fn check_tags(tags: &[String]) -> DownloaderResult<()> {
    if tags.iter().any(|tag| tag.starts_with(CATEGORY_PREFIX)) {
        return Err(DownloaderError::InvalidInput {
            field: "tags",
            reason: "reserved_prefix",
        });
    }
    Ok(())
}

fn torrent_limit_arguments(key: &str, limit: i64) -> Value {
    let limited_key = format!("{key}Limited");
    let mut arguments = Map::new();
    match kbps_from_limit(limit) {
        Some(kbps) => {
            arguments.insert(format!("{key}Limit"), json!(kbps));
            arguments.insert(limited_key, json!(true));
        }
        None => {
            arguments.insert(limited_key, json!(false));
        }
    }
    Value::Object(arguments)
}

#[async_trait]
impl DownloaderClient for TransmissionAdapter {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Transmission
    }

    /// The transport negotiates the session id lazily; probing `session-get` verifies
    /// reachability and credentials.
    async fn login(&self) -> DownloaderResult<()> {
        self.rpc("login", None, "session-get", json!({ "fields": ["version"] }))
            .await
            .map(|_| ())
    }

    async fn get_torrents(&self) -> DownloaderResult<Vec<UnifiedTorrent>> {
        Ok(self
            .torrents("get_torrents", LIST_FIELDS)
            .await?
            .into_iter()
            .map(|record| record.into_unified(&self.client_id))
            .collect())
    }

    async fn get_torrent_details(&self, hash: &str) -> DownloaderResult<UnifiedTorrent> {
        let record = self
            .record("get_torrent_details", hash, LIST_FIELDS)
            .await?;
        Ok(record.into_unified(&self.client_id))
    }

    async fn add_torrent_with_options(&self, options: TorrentOptions) -> DownloaderResult<()> {
        check_tags(&options.tags)?;
        let mut arguments = Map::new();
        if options.has_torrent_file() {
            arguments.insert(
                "metainfo".to_string(),
                json!(STANDARD.encode(&options.torrent_file)),
            );
        } else if options.url.trim().is_empty() {
            return Err(DownloaderError::InvalidInput {
                field: "url",
                reason: "url_or_file_required",
            });
        } else {
            arguments.insert("filename".to_string(), json!(options.url.trim()));
        }
        if !options.save_path.is_empty() {
            arguments.insert("download-dir".to_string(), json!(options.save_path));
        }
        if options.paused {
            arguments.insert("paused".to_string(), json!(true));
        }
        let labels = compose_labels(&options.category, &options.tags);
        if !labels.is_empty() {
            arguments.insert("labels".to_string(), json!(labels));
        }
        if options.priority != 0 {
            arguments.insert(
                "bandwidthPriority".to_string(),
                json!(bandwidth_priority(options.priority)),
            );
        }

        let value = self
            .rpc("add_torrent", None, "torrent-add", Value::Object(arguments))
            .await?;
        let response: TorrentAddResponse = self.decode("add_torrent", "torrent-add", value)?;
        let torrent = match (response.added, response.duplicate) {
            (Some(torrent), _) => torrent,
            (None, Some(torrent)) => {
                debug!(
                    client_id = %self.client_id,
                    hash = %torrent.hash_string,
                    "torrent already present"
                );
                torrent
            }
            (None, None) => return Ok(()),
        };
        debug!(
            client_id = %self.client_id,
            id = torrent.id,
            hash = %torrent.hash_string,
            name = %torrent.name,
            "torrent accepted"
        );

        let mut limits = Map::new();
        if let Some(kbps) = kbps_from_limit(options.download_limit) {
            limits.insert("downloadLimit".to_string(), json!(kbps));
            limits.insert("downloadLimited".to_string(), json!(true));
        }
        if let Some(kbps) = kbps_from_limit(options.upload_limit) {
            limits.insert("uploadLimit".to_string(), json!(kbps));
            limits.insert("uploadLimited".to_string(), json!(true));
        }
        if options.ratio_limit > 0.0 {
            limits.insert("seedRatioLimit".to_string(), json!(options.ratio_limit));
            limits.insert("seedRatioMode".to_string(), json!(1));
        }
        if options.seeding_time_limit > 0 {
            limits.insert("seedIdleLimit".to_string(), json!(options.seeding_time_limit));
            limits.insert("seedIdleMode".to_string(), json!(1));
        }
        if limits.is_empty() {
            return Ok(());
        }
        self.set_by_id(
            "add_torrent",
            &torrent.hash_string,
            torrent.id,
            Value::Object(limits),
        )
        .await
    }

    async fn pause_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.apply_one("pause_torrent", hash, "torrent-stop", json!({}))
            .await
    }

    async fn pause_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        self.apply("pause_torrents", hashes, "torrent-stop", json!({}))
            .await
    }

    async fn resume_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.apply_one("resume_torrent", hash, "torrent-start", json!({}))
            .await
    }

    async fn resume_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        self.apply("resume_torrents", hashes, "torrent-start", json!({}))
            .await
    }

    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> DownloaderResult<()> {
        self.delete_torrents(&[hash.to_string()], delete_files)
            .await
    }

    async fn delete_torrents(&self, hashes: &[String], delete_files: bool) -> DownloaderResult<()> {
        self.apply(
            "delete_torrents",
            hashes,
            "torrent-remove",
            json!({ "delete-local-data": delete_files }),
        )
        .await
    }

    async fn recheck_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.apply_one("recheck_torrent", hash, "torrent-verify", json!({}))
            .await
    }

    async fn recheck_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        self.apply("recheck_torrents", hashes, "torrent-verify", json!({}))
            .await
    }

    async fn reannounce_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.apply_one("reannounce_torrent", hash, "torrent-reannounce", json!({}))
            .await
    }

    async fn reannounce_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        self.apply("reannounce_torrents", hashes, "torrent-reannounce", json!({}))
            .await
    }

    async fn set_torrent_location(&self, hash: &str, location: &str) -> DownloaderResult<()> {
        self.apply_one(
            "set_torrent_location",
            hash,
            "torrent-set-location",
            json!({ "location": location, "move": true }),
        )
        .await
    }

    async fn set_torrent_name(&self, hash: &str, name: &str) -> DownloaderResult<()> {
        let record = self
            .record("set_torrent_name", hash, &["id", "hashString", "name"])
            .await?;
        self.rpc(
            "set_torrent_name",
            Some(hash),
            "torrent-rename-path",
            json!({ "ids": [record.id], "path": record.name, "name": name }),
        )
        .await
        .map(|_| ())
    }

    async fn set_force_start(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        let method = if enabled {
            "torrent-start-now"
        } else {
            "torrent-start"
        };
        self.apply_one("set_force_start", hash, method, json!({}))
            .await
    }

    async fn set_auto_management(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        let _ = (hash, enabled);
        Ok(())
    }

    async fn set_sequential_download(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        let _ = (hash, enabled);
        Ok(())
    }

    async fn set_first_last_piece_priority(
        &self,
        hash: &str,
        enabled: bool,
    ) -> DownloaderResult<()> {
        let _ = (hash, enabled);
        Ok(())
    }

    async fn set_super_seeding(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        let _ = (hash, enabled);
        Ok(())
    }

    /// Seeding time maps onto Transmission's idle-seeding limit (minutes).
    async fn set_share_limit(
        &self,
        hash: &str,
        ratio_limit: f64,
        seeding_time_limit: i64,
    ) -> DownloaderResult<()> {
        let (ratio, ratio_mode) = seed_limit(ratio_limit);
        let (idle, idle_mode) = seed_limit(seeding_time_limit);
        self.apply_one(
            "set_share_limit",
            hash,
            "torrent-set",
            json!({
                "seedRatioLimit": ratio,
                "seedRatioMode": ratio_mode,
                "seedIdleLimit": idle,
                "seedIdleMode": idle_mode,
            }),
        )
        .await
    }

    async fn set_torrent_category(&self, hash: &str, category: &str) -> DownloaderResult<()> {
        self.rewrite_labels("set_torrent_category", hash, |_, tags| {
            compose_labels(category, &tags)
        })
        .await
    }

    async fn set_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        check_tags(tags)?;
        self.rewrite_labels("set_torrent_tags", hash, |category, _| {
            compose_labels(&category, tags)
        })
        .await
    }

    async fn add_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        check_tags(tags)?;
        self.rewrite_labels("add_torrent_tags", hash, |category, mut existing| {
            existing.extend(tags.iter().cloned());
            compose_labels(&category, &existing)
        })
        .await
    }

    async fn remove_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        self.rewrite_labels("remove_torrent_tags", hash, |category, mut existing| {
            existing.retain(|tag| !tags.contains(tag));
            compose_labels(&category, &existing)
        })
        .await
    }

    async fn set_torrent_trackers(&self, hash: &str, trackers: &[String]) -> DownloaderResult<()> {
        let record = self
            .record("set_torrent_trackers", hash, &["id", "hashString", "trackers"])
            .await?;
        let stale: Vec<i64> = record
            .trackers
            .iter()
            .filter(|tracker| !trackers.contains(&tracker.announce))
            .map(|tracker| tracker.id)
            .collect();
        let fresh: Vec<&String> = trackers
            .iter()
            .filter(|url| !record.trackers.iter().any(|tracker| &tracker.announce == *url))
            .collect();
        if stale.is_empty() && fresh.is_empty() {
            return Ok(());
        }
        let mut arguments = Map::new();
        if !stale.is_empty() {
            arguments.insert("trackerRemove".to_string(), json!(stale));
        }
        if !fresh.is_empty() {
            arguments.insert("trackerAdd".to_string(), json!(fresh));
        }
        self.set_by_id(
            "set_torrent_trackers",
            hash,
            record.id,
            Value::Object(arguments),
        )
        .await
    }

    async fn add_torrent_trackers(&self, hash: &str, trackers: &[String]) -> DownloaderResult<()> {
        if trackers.is_empty() {
            return Ok(());
        }
        self.apply_one(
            "add_torrent_trackers",
            hash,
            "torrent-set",
            json!({ "trackerAdd": trackers }),
        )
        .await
    }

    async fn remove_torrent_trackers(&self, hash: &str, urls: &[String]) -> DownloaderResult<()> {
        let record = self
            .record(
                "remove_torrent_trackers",
                hash,
                &["id", "hashString", "trackers"],
            )
            .await?;
        let ids: Vec<i64> = record
            .trackers
            .iter()
            .filter(|tracker| urls.contains(&tracker.announce))
            .map(|tracker| tracker.id)
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.set_by_id(
            "remove_torrent_trackers",
            hash,
            record.id,
            json!({ "trackerRemove": ids }),
        )
        .await
    }

    async fn set_torrent_download_limit(&self, hash: &str, limit: i64) -> DownloaderResult<()> {
        self.apply_one(
            "set_torrent_download_limit",
            hash,
            "torrent-set",
            torrent_limit_arguments("download", limit),
        )
        .await
    }

    async fn set_torrent_upload_limit(&self, hash: &str, limit: i64) -> DownloaderResult<()> {
        self.apply_one(
            "set_torrent_upload_limit",
            hash,
            "torrent-set",
            torrent_limit_arguments("upload", limit),
        )
        .await
    }

    async fn get_torrent_download_limit(&self, hash: &str) -> DownloaderResult<i64> {
        let record = self
            .record(
                "get_torrent_download_limit",
                hash,
                &["id", "hashString", "downloadLimit", "downloadLimited"],
            )
            .await?;
        Ok(record.unified_download_limit())
    }

    async fn get_torrent_upload_limit(&self, hash: &str) -> DownloaderResult<i64> {
        let record = self
            .record(
                "get_torrent_upload_limit",
                hash,
                &["id", "hashString", "uploadLimit", "uploadLimited"],
            )
            .await?;
        Ok(record.unified_upload_limit())
    }

    async fn set_torrent_priority(&self, hash: &str, priority: i64) -> DownloaderResult<()> {
        self.apply_one(
            "set_torrent_priority",
            hash,
            "torrent-set",
            json!({ "bandwidthPriority": bandwidth_priority(priority) }),
        )
        .await
    }

    async fn get_torrent_files(&self, hash: &str) -> DownloaderResult<Vec<TorrentFile>> {
        let record = self
            .record(
                "get_torrent_files",
                hash,
                &["id", "hashString", "files", "fileStats"],
            )
            .await?;
        Ok(record.into_files())
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
        let key = file_priority_key(priority);
        let mut arguments = Map::new();
        arguments.insert(key.to_string(), json!(file_ids));
        if key != "files-unwanted" {
            arguments.insert("files-wanted".to_string(), json!(file_ids));
        }
        self.apply_one(
            "set_file_priority",
            hash,
            "torrent-set",
            Value::Object(arguments),
        )
        .await
    }

    /// Transmission renames only the last path component; the parent must stay the same.
    async fn rename_file(&self, hash: &str, old_path: &str, new_path: &str) -> DownloaderResult<()> {
        self.rename_path("rename_file", hash, old_path, new_path)
            .await
    }

    async fn rename_folder(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> DownloaderResult<()> {
        self.rename_path("rename_folder", hash, old_path, new_path)
            .await
    }

    async fn get_torrent_trackers(&self, hash: &str) -> DownloaderResult<Vec<TrackerInfo>> {
        let record = self
            .record(
                "get_torrent_trackers",
                hash,
                &["id", "hashString", "trackerStats"],
            )
            .await?;
        Ok(record.into_trackers())
    }

    async fn get_torrent_peers(&self, hash: &str) -> DownloaderResult<Vec<PeerInfo>> {
        let record = self
            .record("get_torrent_peers", hash, &["id", "hashString", "peers"])
            .await?;
        Ok(record.into_peers())
    }

    async fn get_torrent_properties(&self, hash: &str) -> DownloaderResult<TorrentProperties> {
        let record = self
            .record("get_torrent_properties", hash, PROPERTY_FIELDS)
            .await?;
        Ok(record.into_properties())
    }

    async fn get_categories(&self) -> DownloaderResult<BTreeMap<String, Category>> {
        let records = self
            .torrents("get_categories", &["id", "hashString", "labels"])
            .await?;
        Ok(records
            .iter()
            .map(|record| category_of(&record.labels))
            .filter(|name| !name.is_empty())
            .map(|name| {
                let category = Category {
                    name: name.clone(),
                    save_path: String::new(),
                };
                (name, category)
            })
            .collect())
    }

    /// Categories materialize when first assigned to a torrent.
    async fn create_category(&self, name: &str, save_path: &str) -> DownloaderResult<()> {
        let _ = (name, save_path);
        Ok(())
    }

    async fn remove_categories(&self, names: &[String]) -> DownloaderResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        self.rewrite_all_labels("remove_categories", |category, tags| {
            names
                .contains(&category)
                .then(|| compose_labels("", &tags))
        })
        .await
    }

    async fn get_tags(&self) -> DownloaderResult<Vec<String>> {
        let records = self
            .torrents("get_tags", &["id", "hashString", "labels"])
            .await?;
        let tags: BTreeSet<String> = records
            .iter()
            .flat_map(|record| tags_of(&record.labels))
            .collect();
        Ok(tags.into_iter().collect())
    }

    /// Tags materialize when first assigned to a torrent.
    async fn create_tags(&self, tags: &[String]) -> DownloaderResult<()> {
        let _ = tags;
        Ok(())
    }

    async fn delete_tags(&self, tags: &[String]) -> DownloaderResult<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.rewrite_all_labels("delete_tags", |category, existing| {
            existing.iter().any(|tag| tags.contains(tag)).then(|| {
                let kept: Vec<String> = existing
                    .iter()
                    .filter(|tag| !tags.contains(tag))
                    .cloned()
                    .collect();
                compose_labels(&category, &kept)
            })
        })
        .await
    }

    async fn get_global_download_limit(&self) -> DownloaderResult<i64> {
        let session = self.session("get_global_download_limit").await?;
        Ok(limit_from_kbps(
            session.speed_limit_down,
            session.speed_limit_down_enabled,
        ))
    }

    async fn get_global_upload_limit(&self) -> DownloaderResult<i64> {
        let session = self.session("get_global_upload_limit").await?;
        Ok(limit_from_kbps(
            session.speed_limit_up,
            session.speed_limit_up_enabled,
        ))
    }

    async fn set_global_download_limit(&self, limit: i64) -> DownloaderResult<()> {
        self.set_session_limit("set_global_download_limit", "speed-limit-down", limit)
            .await
    }

    async fn set_global_upload_limit(&self, limit: i64) -> DownloaderResult<()> {
        self.set_session_limit("set_global_upload_limit", "speed-limit-up", limit)
            .await
    }

    async fn get_alternative_speed_limits_enabled(&self) -> DownloaderResult<bool> {
        Ok(self
            .session("get_alternative_speed_limits_enabled")
            .await?
            .alt_speed_enabled)
    }

    async fn toggle_alternative_speed_limits(&self) -> DownloaderResult<()> {
        let current = self
            .session("toggle_alternative_speed_limits")
            .await?
            .alt_speed_enabled;
        self.rpc(
            "toggle_alternative_speed_limits",
            None,
            "session-set",
            json!({ "alt-speed-enabled": !current }),
        )
        .await
        .map(|_| ())
    }

    async fn get_transfer_info(&self) -> DownloaderResult<TransferInfo> {
        let value = self
            .rpc("get_transfer_info", None, "session-stats", json!({}))
            .await?;
        let stats: SessionStats = self.decode("get_transfer_info", "session-stats", value)?;
        let session = self.session("get_transfer_info").await?;
        let torrents = self
            .torrents(
                "get_transfer_info",
                &["id", "hashString", "peersConnected", "corruptEver"],
            )
            .await?;
        let free_space_on_disk = self
            .free_space_at("get_transfer_info", &session.download_dir)
            .await?;
        Ok(TransferInfo {
            download_speed: stats.download_speed,
            upload_speed: stats.upload_speed,
            downloaded_bytes: stats.current.downloaded_bytes,
            uploaded_bytes: stats.current.uploaded_bytes,
            download_speed_limit: limit_from_kbps(
                session.speed_limit_down,
                session.speed_limit_down_enabled,
            ),
            upload_speed_limit: limit_from_kbps(
                session.speed_limit_up,
                session.speed_limit_up_enabled,
            ),
            dht: 0,
            connection_status: "connected".to_string(),
            total_peers_connected: torrents.iter().map(|record| record.peers_connected).sum(),
            total_buffers_size: 0,
            total_wasted: torrents.iter().map(|record| record.corrupt_ever).sum(),
            alternative_speed_limits: session.alt_speed_enabled,
            free_space_on_disk,
        })
    }

    async fn get_free_space(&self, path: &str) -> DownloaderResult<i64> {
        if path.is_empty() {
            let session = self.session("get_free_space").await?;
            return self
                .free_space_at("get_free_space", &session.download_dir)
                .await;
        }
        self.free_space_at("get_free_space", path).await
    }

    async fn get_server_info(&self) -> DownloaderResult<ServerInfo> {
        let session = self.session("get_server_info").await?;
        let stats = self
            .rpc("get_server_info", None, "session-stats", json!({}))
            .await?;
        let mut extra = Map::new();
        extra.insert(
            "rpc_version_minimum".to_string(),
            json!(session.rpc_version_minimum),
        );
        extra.insert("session_stats".to_string(), stats);
        Ok(ServerInfo {
            backend: BackendKind::Transmission,
            version: session.version,
            api_version: session.rpc_version.to_string(),
            default_save_path: session.download_dir,
            extra,
        })
    }

    async fn get_default_save_path(&self) -> DownloaderResult<String> {
        Ok(self.session("get_default_save_path").await?.download_dir)
    }

    async fn shutdown(&self) -> DownloaderResult<()> {
        self.rpc("shutdown", None, "session-close", json!({}))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcResult;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedRpc {
        calls: Mutex<Vec<(String, Value)>>,
        responses: Mutex<HashMap<String, Value>>,
        failing: Mutex<Vec<String>>,
    }

    impl ScriptedRpc {
        fn respond(self, method: &str, arguments: Value) -> Self {
            self.responses
                .lock()
                .expect("lock")
                .insert(method.to_string(), arguments);
            self
        }

        fn failing(self, method: &str) -> Self {
            self.failing.lock().expect("lock").push(method.to_string());
            self
        }

        fn with_torrents(self, torrents: Value) -> Self {
            self.respond("torrent-get", json!({ "torrents": torrents }))
        }

        fn calls_to(&self, method: &str) -> Vec<Value> {
            self.calls
                .lock()
                .expect("lock")
                .iter()
                .filter(|(name, _)| name == method)
                .map(|(_, arguments)| arguments.clone())
                .collect()
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedRpc {
        async fn call(&self, method: &str, arguments: Value) -> RpcResult<Value> {
            self.calls
                .lock()
                .expect("lock")
                .push((method.to_string(), arguments));
            if self.failing.lock().expect("lock").iter().any(|m| m == method) {
                return Err(RpcError::Rejected {
                    method: method.to_string(),
                    result: "scripted failure".to_string(),
                });
            }
            Ok(self
                .responses
                .lock()
                .expect("lock")
                .get(method)
                .cloned()
                .unwrap_or_else(|| json!({})))
        }
    }

    fn adapter(rpc: ScriptedRpc) -> (TransmissionAdapter, Arc<ScriptedRpc>) {
        let rpc = Arc::new(rpc);
        (TransmissionAdapter::new("tr-box", rpc.clone()), rpc)
    }

    fn two_torrents() -> Value {
        json!([
            {"id": 1, "hashString": "AA", "name": "one", "labels": ["category:old", "x"]},
            {"id": 2, "hashString": "bb", "name": "two", "labels": ["y"]}
        ])
    }

    #[tokio::test]
    async fn listing_splits_labels_into_category_and_tags() -> anyhow::Result<()> {
        let (adapter, _) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        let torrents = adapter.get_torrents().await?;
        assert_eq!(torrents.len(), 2);
        assert_eq!(torrents[0].hash, "aa");
        assert_eq!(torrents[0].category, "old");
        assert_eq!(torrents[0].tags, vec!["x".to_string()]);
        assert_eq!(torrents[1].client_id, "tr-box");
        Ok(())
    }

    #[tokio::test]
    async fn batch_applies_resolved_prefix_then_reports_missing() {
        let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        let hashes = vec!["aa".to_string(), "zz".to_string(), "bb".to_string()];
        let err = adapter.pause_torrents(&hashes).await.expect_err("missing");
        assert!(matches!(err, DownloaderError::NotFound { ref hash } if hash == "zz"));
        let stops = rpc.calls_to("torrent-stop");
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0]["ids"], json!([1]));
    }

    #[tokio::test]
    async fn missing_single_hash_sends_nothing() {
        let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        let err = adapter.resume_torrent("ffff").await.expect_err("missing");
        assert!(matches!(err, DownloaderError::NotFound { .. }));
        assert!(rpc.calls_to("torrent-start").is_empty());
    }

    #[tokio::test]
    async fn category_setter_keeps_tags_and_tag_setter_keeps_category() -> anyhow::Result<()> {
        let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        adapter.set_torrent_category("aa", "new").await?;
        adapter
            .set_torrent_tags("aa", &["p".to_string(), "q".to_string()])
            .await?;
        let sets = rpc.calls_to("torrent-set");
        assert_eq!(sets[0]["labels"], json!(["category:new", "x"]));
        assert_eq!(sets[1]["labels"], json!(["category:old", "p", "q"]));
        assert_eq!(sets[1]["ids"], json!([1]));
        Ok(())
    }

    #[tokio::test]
    async fn limits_are_written_in_rounded_kilobytes() -> anyhow::Result<()> {
        let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        adapter.set_torrent_download_limit("bb", 2049).await?;
        adapter.set_torrent_upload_limit("bb", -1).await?;
        let sets = rpc.calls_to("torrent-set");
        assert_eq!(sets[0]["downloadLimit"], json!(3));
        assert_eq!(sets[0]["downloadLimited"], json!(true));
        assert_eq!(sets[1]["uploadLimited"], json!(false));
        assert!(sets[1].get("uploadLimit").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn disabled_limit_reads_as_unlimited() -> anyhow::Result<()> {
        let (adapter, _) = adapter(ScriptedRpc::default().with_torrents(json!([
            {"id": 3, "hashString": "cc", "downloadLimit": 100, "downloadLimited": false,
             "uploadLimit": 2, "uploadLimited": true}
        ])));
        assert_eq!(adapter.get_torrent_download_limit("cc").await?, -1);
        assert_eq!(adapter.get_torrent_upload_limit("cc").await?, 2048);
        Ok(())
    }

    #[tokio::test]
    async fn priority_is_bucketed() -> anyhow::Result<()> {
        let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        adapter.set_torrent_priority("aa", 8).await?;
        adapter.set_torrent_priority("aa", 2).await?;
        let sets = rpc.calls_to("torrent-set");
        assert_eq!(sets[0]["bandwidthPriority"], json!(-1));
        assert_eq!(sets[1]["bandwidthPriority"], json!(1));
        Ok(())
    }

    #[tokio::test]
    async fn read_priority_writes_back_unchanged() -> anyhow::Result<()> {
        for native in [1, 0, -1] {
            let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(json!([
                {"id": 1, "hashString": "aa", "name": "one", "bandwidthPriority": native}
            ])));
            let read = adapter.get_torrent_details("aa").await?.priority;
            adapter.set_torrent_priority("aa", read).await?;
            let sets = rpc.calls_to("torrent-set");
            assert_eq!(sets[0]["bandwidthPriority"], json!(native), "native {native}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn tags_with_category_prefix_are_rejected_before_any_call() {
        let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        let reserved = vec!["ok".to_string(), "category:sneaky".to_string()];
        for err in [
            adapter
                .set_torrent_tags("aa", &reserved)
                .await
                .expect_err("set"),
            adapter
                .add_torrent_tags("aa", &reserved)
                .await
                .expect_err("add"),
            adapter
                .add_torrent_with_options(TorrentOptions {
                    url: "magnet:?xt=urn:btih:dd".into(),
                    tags: reserved.clone(),
                    ..TorrentOptions::default()
                })
                .await
                .expect_err("add torrent"),
        ] {
            assert!(matches!(
                err,
                DownloaderError::InvalidInput {
                    field: "tags",
                    reason: "reserved_prefix"
                }
            ));
        }
        assert!(rpc.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn toggles_without_counterpart_succeed_without_calls() -> anyhow::Result<()> {
        let (adapter, rpc) = adapter(ScriptedRpc::default());
        adapter.set_sequential_download("aa", true).await?;
        adapter.set_super_seeding("aa", true).await?;
        assert!(rpc.calls.lock().expect("lock").is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn piece_states_logs_and_category_edit_are_unsupported() {
        let (adapter, _) = adapter(ScriptedRpc::default());
        for err in [
            adapter.get_torrent_piece_states("aa").await.expect_err("pieces"),
            adapter.get_logs(true, true, true, 0).await.expect_err("logs"),
            adapter.edit_category("tv", "/tv").await.expect_err("edit"),
        ] {
            assert!(matches!(
                err,
                DownloaderError::Unsupported {
                    backend: BackendKind::Transmission,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn add_uploads_metainfo_and_applies_limits_to_new_id() -> anyhow::Result<()> {
        let (adapter, rpc) = adapter(ScriptedRpc::default().respond(
            "torrent-add",
            json!({"torrent-added": {"id": 42, "hashString": "dd", "name": "new"}}),
        ));
        adapter
            .add_torrent_with_options(TorrentOptions {
                url: "magnet:?xt=urn:btih:dd".into(),
                torrent_file: b"d4:infoe".to_vec(),
                category: "tv".into(),
                download_limit: 1024,
                ..TorrentOptions::default()
            })
            .await?;
        let adds = rpc.calls_to("torrent-add");
        assert_eq!(adds[0]["metainfo"], json!(STANDARD.encode(b"d4:infoe")));
        assert!(adds[0].get("filename").is_none());
        assert_eq!(adds[0]["labels"], json!(["category:tv"]));
        let sets = rpc.calls_to("torrent-set");
        assert_eq!(sets[0]["ids"], json!([42]));
        assert_eq!(sets[0]["downloadLimit"], json!(1));
        Ok(())
    }

    #[tokio::test]
    async fn rpc_failure_carries_client_context() {
        let (adapter, _) = adapter(ScriptedRpc::default().failing("torrent-get"));
        let err = adapter.get_torrents().await.expect_err("rpc fails");
        assert!(matches!(
            err,
            DownloaderError::Backend { ref client_id, operation: "get_torrents", .. }
                if client_id == "tr-box"
        ));
    }

    #[tokio::test]
    async fn remove_categories_strips_only_matching_torrents() -> anyhow::Result<()> {
        let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        adapter.remove_categories(&["old".to_string()]).await?;
        let sets = rpc.calls_to("torrent-set");
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0]["ids"], json!([1]));
        assert_eq!(sets[0]["labels"], json!(["x"]));
        Ok(())
    }

    #[tokio::test]
    async fn categories_and_tags_are_collected_from_labels() -> anyhow::Result<()> {
        let (adapter, _) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        let categories = adapter.get_categories().await?;
        assert_eq!(categories.keys().collect::<Vec<_>>(), vec!["old"]);
        assert_eq!(adapter.get_tags().await?, vec!["x".to_string(), "y".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn rename_requires_same_parent() -> anyhow::Result<()> {
        let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(two_torrents()));
        let err = adapter
            .rename_file("aa", "dir/a.mkv", "other/b.mkv")
            .await
            .expect_err("parent differs");
        assert!(matches!(err, DownloaderError::InvalidInput { field: "new_path", .. }));
        adapter.rename_file("aa", "dir/a.mkv", "dir/b.mkv").await?;
        let renames = rpc.calls_to("torrent-rename-path");
        assert_eq!(renames[0]["name"], json!("b.mkv"));
        assert_eq!(renames[0]["path"], json!("dir/a.mkv"));
        Ok(())
    }

    #[tokio::test]
    async fn set_trackers_diffs_by_announce_url() -> anyhow::Result<()> {
        let (adapter, rpc) = adapter(ScriptedRpc::default().with_torrents(json!([
            {"id": 5, "hashString": "ee", "trackers": [
                {"announce": "udp://old:1", "id": 0, "tier": 0},
                {"announce": "udp://keep:1", "id": 1, "tier": 1}
            ]}
        ])));
        adapter
            .set_torrent_trackers("ee", &["udp://keep:1".to_string(), "udp://new:1".to_string()])
            .await?;
        let sets = rpc.calls_to("torrent-set");
        assert_eq!(sets[0]["trackerRemove"], json!([0]));
        assert_eq!(sets[0]["trackerAdd"], json!(["udp://new:1"]));
        Ok(())
    }
}

//! Recording fake downloader.
//!
//! # Design
//! - Holds an in-memory torrent list and records every routed call, so tests can assert which
//!   backend saw what and that nothing was dispatched on routing failures.
//! - Listing can be made to fail, and individual hashes can be made to fail with `Backend`.
//! - Operations it does not model keep the trait default and report `Unsupported`.

use std::collections::BTreeMap;
use std::io;

use async_trait::async_trait;
use nexus_torrent_core::{
    BackendKind, Category, DownloaderClient, DownloaderError, DownloaderResult, ServerInfo,
    TorrentOptions, UnifiedTorrent,
};
use serde_json::Map;
use tokio::sync::RwLock;

/// One call observed by [`FakeDownloader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Capability name.
    pub operation: &'static str,
    /// Hashes or other identifying arguments, in order.
    pub args: Vec<String>,
}

/// In-memory `DownloaderClient` that records calls.
pub struct FakeDownloader {
    client_id: String,
    kind: BackendKind,
    torrents: RwLock<Vec<UnifiedTorrent>>,
    calls: RwLock<Vec<Call>>,
    added: RwLock<Vec<TorrentOptions>>,
    global_limits: RwLock<(i64, i64)>,
    fail_listing: bool,
    panic_listing: bool,
    failing_hashes: Vec<String>,
}

impl FakeDownloader {
    /// Empty fake for `client_id`.
    #[must_use]
    pub fn new(client_id: &str, kind: BackendKind) -> Self {
        Self {
            client_id: client_id.to_string(),
            kind,
            torrents: RwLock::new(Vec::new()),
            calls: RwLock::new(Vec::new()),
            added: RwLock::new(Vec::new()),
            global_limits: RwLock::new((-1, -1)),
            fail_listing: false,
            panic_listing: false,
            failing_hashes: Vec::new(),
        }
    }

    /// Seed the torrent list.
    #[must_use]
    pub fn with_torrents(mut self, torrents: Vec<UnifiedTorrent>) -> Self {
        self.torrents = RwLock::new(torrents);
        self
    }

    /// Make `get_torrents` fail with a backend error.
    #[must_use]
    pub const fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Make `get_torrents` panic instead of returning.
    #[must_use]
    pub const fn panicking_listing(mut self) -> Self {
        self.panic_listing = true;
        self
    }

    /// Make hash-targeted calls for `hash` fail with a backend error.
    #[must_use]
    pub fn failing_hash(mut self, hash: &str) -> Self {
        self.failing_hashes.push(hash.to_string());
        self
    }

    /// Calls recorded so far.
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.read().await.clone()
    }

    /// Options passed to `add_torrent_with_options`.
    pub async fn added(&self) -> Vec<TorrentOptions> {
        self.added.read().await.clone()
    }

    /// Current `(download, upload)` global limits.
    pub async fn global_limits(&self) -> (i64, i64) {
        *self.global_limits.read().await
    }

    async fn record(&self, operation: &'static str, args: &[&str]) {
        self.calls.write().await.push(Call {
            operation,
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
        });
    }

    fn failure(&self, operation: &'static str, hash: Option<&str>) -> DownloaderError {
        DownloaderError::backend(
            self.client_id.clone(),
            operation,
            hash,
            io::Error::other("scripted failure"),
        )
    }

    /// Record the call, then check the hash is known and not scripted to fail.
    async fn touch(&self, operation: &'static str, hash: &str) -> DownloaderResult<()> {
        self.record(operation, &[hash]).await;
        if self.failing_hashes.iter().any(|failing| failing == hash) {
            return Err(self.failure(operation, Some(hash)));
        }
        if self
            .torrents
            .read()
            .await
            .iter()
            .any(|torrent| torrent.hash.eq_ignore_ascii_case(hash))
        {
            Ok(())
        } else {
            Err(DownloaderError::not_found(hash))
        }
    }

    async fn update<F>(&self, hash: &str, apply: F)
    where
        F: FnOnce(&mut UnifiedTorrent) + Send,
    {
        if let Some(torrent) = self
            .torrents
            .write()
            .await
            .iter_mut()
            .find(|torrent| torrent.hash.eq_ignore_ascii_case(hash))
        {
            apply(torrent);
        }
    }
}

#[async_trait]
impl DownloaderClient for FakeDownloader {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn get_torrents(&self) -> DownloaderResult<Vec<UnifiedTorrent>> {
        self.record("get_torrents", &[]).await;
        assert!(!self.panic_listing, "listing panicked for {}", self.client_id);
        if self.fail_listing {
            return Err(self.failure("get_torrents", None));
        }
        Ok(self.torrents.read().await.clone())
    }

    async fn add_torrent_with_options(&self, options: TorrentOptions) -> DownloaderResult<()> {
        self.record("add_torrent", &[options.url.as_str()]).await;
        self.added.write().await.push(options);
        Ok(())
    }

    async fn pause_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.touch("pause_torrent", hash).await?;
        self.update(hash, |torrent| torrent.state = "paused".to_string())
            .await;
        Ok(())
    }

    async fn resume_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.touch("resume_torrent", hash).await?;
        self.update(hash, |torrent| torrent.state = "downloading".to_string())
            .await;
        Ok(())
    }

    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> DownloaderResult<()> {
        self.touch("delete_torrent", hash).await?;
        let _ = delete_files;
        self.torrents
            .write()
            .await
            .retain(|torrent| !torrent.hash.eq_ignore_ascii_case(hash));
        Ok(())
    }

    async fn recheck_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.touch("recheck_torrent", hash).await
    }

    async fn reannounce_torrent(&self, hash: &str) -> DownloaderResult<()> {
        self.touch("reannounce_torrent", hash).await
    }

    async fn set_torrent_category(&self, hash: &str, category: &str) -> DownloaderResult<()> {
        self.touch("set_torrent_category", hash).await?;
        self.update(hash, |torrent| torrent.category = category.to_string())
            .await;
        Ok(())
    }

    async fn set_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        self.touch("set_torrent_tags", hash).await?;
        self.update(hash, |torrent| torrent.tags = tags.to_vec())
            .await;
        Ok(())
    }

    async fn set_torrent_download_limit(&self, hash: &str, limit: i64) -> DownloaderResult<()> {
        self.touch("set_torrent_download_limit", hash).await?;
        self.update(hash, |torrent| torrent.download_limit = limit.max(-1))
            .await;
        Ok(())
    }

    async fn get_torrent_download_limit(&self, hash: &str) -> DownloaderResult<i64> {
        self.touch("get_torrent_download_limit", hash).await?;
        let torrents = self.torrents.read().await;
        Ok(torrents
            .iter()
            .find(|torrent| torrent.hash.eq_ignore_ascii_case(hash))
            .map_or(-1, |torrent| torrent.download_limit))
    }

    async fn set_torrent_upload_limit(&self, hash: &str, limit: i64) -> DownloaderResult<()> {
        self.touch("set_torrent_upload_limit", hash).await?;
        self.update(hash, |torrent| torrent.upload_limit = limit.max(-1))
            .await;
        Ok(())
    }

    async fn get_torrent_upload_limit(&self, hash: &str) -> DownloaderResult<i64> {
        self.touch("get_torrent_upload_limit", hash).await?;
        let torrents = self.torrents.read().await;
        Ok(torrents
            .iter()
            .find(|torrent| torrent.hash.eq_ignore_ascii_case(hash))
            .map_or(-1, |torrent| torrent.upload_limit))
    }

    async fn get_categories(&self) -> DownloaderResult<BTreeMap<String, Category>> {
        self.record("get_categories", &[]).await;
        Ok(self
            .torrents
            .read()
            .await
            .iter()
            .filter(|torrent| !torrent.category.is_empty())
            .map(|torrent| {
                (
                    torrent.category.clone(),
                    Category {
                        name: torrent.category.clone(),
                        save_path: torrent.save_path.clone(),
                    },
                )
            })
            .collect())
    }

    async fn get_tags(&self) -> DownloaderResult<Vec<String>> {
        self.record("get_tags", &[]).await;
        let mut tags: Vec<String> = self
            .torrents
            .read()
            .await
            .iter()
            .flat_map(|torrent| torrent.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }

    async fn get_global_download_limit(&self) -> DownloaderResult<i64> {
        self.record("get_global_download_limit", &[]).await;
        Ok(self.global_limits.read().await.0)
    }

    async fn get_global_upload_limit(&self) -> DownloaderResult<i64> {
        self.record("get_global_upload_limit", &[]).await;
        Ok(self.global_limits.read().await.1)
    }

    async fn set_global_download_limit(&self, limit: i64) -> DownloaderResult<()> {
        let value = limit.to_string();
        self.record("set_global_download_limit", &[value.as_str()])
            .await;
        self.global_limits.write().await.0 = limit.max(-1);
        Ok(())
    }

    async fn set_global_upload_limit(&self, limit: i64) -> DownloaderResult<()> {
        let value = limit.to_string();
        self.record("set_global_upload_limit", &[value.as_str()])
            .await;
        self.global_limits.write().await.1 = limit.max(-1);
        Ok(())
    }

    async fn get_server_info(&self) -> DownloaderResult<ServerInfo> {
        self.record("get_server_info", &[]).await;
        Ok(ServerInfo {
            backend: self.kind,
            version: "fake-1.0".to_string(),
            api_version: "1".to_string(),
            default_save_path: "/downloads".to_string(),
            extra: Map::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::torrent;

    #[tokio::test]
    async fn records_calls_and_mutates_state() -> anyhow::Result<()> {
        let fake = FakeDownloader::new("qb", BackendKind::Qbittorrent)
            .with_torrents(vec![torrent("qb", "aa")]);
        fake.pause_torrent("AA").await?;
        let torrents = fake.get_torrents().await?;
        assert_eq!(torrents[0].state, "paused");
        assert_eq!(
            fake.calls().await[0],
            Call {
                operation: "pause_torrent",
                args: vec!["AA".to_string()],
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn scripted_failures_surface_as_backend_errors() {
        let fake = FakeDownloader::new("tr", BackendKind::Transmission)
            .with_torrents(vec![torrent("tr", "aa")])
            .failing_listing()
            .failing_hash("aa");
        assert!(matches!(
            fake.get_torrents().await,
            Err(DownloaderError::Backend { .. })
        ));
        assert!(matches!(
            fake.pause_torrent("aa").await,
            Err(DownloaderError::Backend { .. })
        ));
        assert!(matches!(
            fake.pause_torrent("zz").await,
            Err(DownloaderError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unmodelled_operations_are_unsupported() {
        let fake = FakeDownloader::new("tr", BackendKind::Transmission);
        assert!(matches!(
            fake.get_torrent_piece_states("aa").await,
            Err(DownloaderError::Unsupported { .. })
        ));
    }
}

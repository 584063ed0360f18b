//! Capability trait implemented by every backend adapter.
//!
//! # Design
//! - Every operation is declared for every backend. Adapters that cannot perform one return
//!   [`DownloaderError::Unsupported`] rather than omitting it.
//! - Batch operations are not transactional: items are applied in order and the first error
//!   is returned, leaving earlier items applied. Adapters with a native batch primitive
//!   override the defaults.
//! - Limits are bytes per second with `-1` meaning unlimited, on both reads and writes.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::{DownloaderError, DownloaderResult};
use crate::model::{
    BackendKind, Category, LogEntry, PeerInfo, ServerInfo, TorrentFile, TorrentOptions,
    TorrentProperties, TrackerInfo, TransferInfo, UnifiedTorrent,
};

/// Linear scan for a torrent by hash, case-insensitive.
///
/// # Errors
///
/// Returns [`DownloaderError::NotFound`] when no torrent matches.
pub fn find_by_hash(torrents: Vec<UnifiedTorrent>, hash: &str) -> DownloaderResult<UnifiedTorrent> {
    torrents
        .into_iter()
        .find(|torrent| torrent.hash.eq_ignore_ascii_case(hash))
        .ok_or_else(|| DownloaderError::not_found(hash))
}

/// Backend adapter contract consumed by the orchestrator.
///
/// Adapters override every operation their backend supports. The defaults that return
/// `Unsupported` stand in only for genuine backend gaps.
#[async_trait]
pub trait DownloaderClient: Send + Sync {
    /// Stable, configuration-assigned identifier.
    fn client_id(&self) -> &str;

    /// Backend implementation behind this adapter.
    fn kind(&self) -> BackendKind;

    /// Build an `Unsupported` error for this backend.
    fn unsupported(&self, operation: &'static str) -> DownloaderError {
        DownloaderError::Unsupported {
            operation,
            backend: self.kind(),
        }
    }

    /// Authenticate (or re-authenticate) against the backend.
    async fn login(&self) -> DownloaderResult<()> {
        Ok(())
    }

    // ---- lifecycle ----

    /// List every torrent on the backend in native order.
    async fn get_torrents(&self) -> DownloaderResult<Vec<UnifiedTorrent>>;

    /// Fetch one torrent by hash.
    async fn get_torrent_details(&self, hash: &str) -> DownloaderResult<UnifiedTorrent> {
        find_by_hash(self.get_torrents().await?, hash)
    }

    /// Add a torrent from a magnet link or URL with backend defaults.
    async fn add_torrent(&self, url: &str) -> DownloaderResult<()> {
        self.add_torrent_with_options(TorrentOptions::from_url(url))
            .await
    }

    /// Add a torrent with explicit options.
    async fn add_torrent_with_options(&self, options: TorrentOptions) -> DownloaderResult<()>;

    /// Add a torrent from a local `.torrent` file.
    async fn add_torrent_from_file(
        &self,
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
        self.add_torrent_with_options(TorrentOptions {
            torrent_file: bytes,
            ..options
        })
        .await
    }

    /// Pause one torrent.
    async fn pause_torrent(&self, hash: &str) -> DownloaderResult<()>;

    /// Pause several torrents.
    async fn pause_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        for hash in hashes {
            self.pause_torrent(hash).await?;
        }
        Ok(())
    }

    /// Resume one torrent.
    async fn resume_torrent(&self, hash: &str) -> DownloaderResult<()>;

    /// Resume several torrents.
    async fn resume_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        for hash in hashes {
            self.resume_torrent(hash).await?;
        }
        Ok(())
    }

    /// Remove one torrent, optionally deleting its data.
    async fn delete_torrent(&self, hash: &str, delete_files: bool) -> DownloaderResult<()>;

    /// Remove several torrents.
    async fn delete_torrents(&self, hashes: &[String], delete_files: bool) -> DownloaderResult<()> {
        for hash in hashes {
            self.delete_torrent(hash, delete_files).await?;
        }
        Ok(())
    }

    // ---- mutation ----

    /// Force a hash recheck.
    async fn recheck_torrent(&self, hash: &str) -> DownloaderResult<()> {
        let _ = hash;
        Err(self.unsupported("recheck_torrent"))
    }

    /// Recheck several torrents.
    async fn recheck_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        for hash in hashes {
            self.recheck_torrent(hash).await?;
        }
        Ok(())
    }

    /// Announce to trackers immediately.
    async fn reannounce_torrent(&self, hash: &str) -> DownloaderResult<()> {
        let _ = hash;
        Err(self.unsupported("reannounce_torrent"))
    }

    /// Reannounce several torrents.
    async fn reannounce_torrents(&self, hashes: &[String]) -> DownloaderResult<()> {
        for hash in hashes {
            self.reannounce_torrent(hash).await?;
        }
        Ok(())
    }

    /// Move torrent data to a new directory.
    async fn set_torrent_location(&self, hash: &str, location: &str) -> DownloaderResult<()> {
        let _ = (hash, location);
        Err(self.unsupported("set_torrent_location"))
    }

    /// Rename the torrent.
    async fn set_torrent_name(&self, hash: &str, name: &str) -> DownloaderResult<()> {
        let _ = (hash, name);
        Err(self.unsupported("set_torrent_name"))
    }

    /// Start regardless of queue limits.
    async fn set_force_start(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        let _ = (hash, enabled);
        Err(self.unsupported("set_force_start"))
    }

    /// Toggle automatic torrent management.
    async fn set_auto_management(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        let _ = (hash, enabled);
        Err(self.unsupported("set_auto_management"))
    }

    /// Toggle sequential piece download.
    async fn set_sequential_download(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        let _ = (hash, enabled);
        Err(self.unsupported("set_sequential_download"))
    }

    /// Toggle first/last piece priority.
    async fn set_first_last_piece_priority(
        &self,
        hash: &str,
        enabled: bool,
    ) -> DownloaderResult<()> {
        let _ = (hash, enabled);
        Err(self.unsupported("set_first_last_piece_priority"))
    }

    /// Toggle super-seeding.
    async fn set_super_seeding(&self, hash: &str, enabled: bool) -> DownloaderResult<()> {
        let _ = (hash, enabled);
        Err(self.unsupported("set_super_seeding"))
    }

    /// Set ratio and seeding time limits (`-1` for unlimited, `-2` for the global default).
    async fn set_share_limit(
        &self,
        hash: &str,
        ratio_limit: f64,
        seeding_time_limit: i64,
    ) -> DownloaderResult<()> {
        let _ = (hash, ratio_limit, seeding_time_limit);
        Err(self.unsupported("set_share_limit"))
    }

    // ---- properties ----

    /// Replace the torrent's category; empty clears it.
    async fn set_torrent_category(&self, hash: &str, category: &str) -> DownloaderResult<()> {
        let _ = (hash, category);
        Err(self.unsupported("set_torrent_category"))
    }

    /// Replace the torrent's tags.
    async fn set_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        let _ = (hash, tags);
        Err(self.unsupported("set_torrent_tags"))
    }

    /// Add tags, keeping existing ones.
    async fn add_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        let _ = (hash, tags);
        Err(self.unsupported("add_torrent_tags"))
    }

    /// Remove the given tags.
    async fn remove_torrent_tags(&self, hash: &str, tags: &[String]) -> DownloaderResult<()> {
        let _ = (hash, tags);
        Err(self.unsupported("remove_torrent_tags"))
    }

    /// Replace the tracker list.
    async fn set_torrent_trackers(&self, hash: &str, trackers: &[String]) -> DownloaderResult<()> {
        let _ = (hash, trackers);
        Err(self.unsupported("set_torrent_trackers"))
    }

    /// Append trackers.
    async fn add_torrent_trackers(&self, hash: &str, trackers: &[String]) -> DownloaderResult<()> {
        let _ = (hash, trackers);
        Err(self.unsupported("add_torrent_trackers"))
    }

    /// Remove trackers by announce URL.
    async fn remove_torrent_trackers(&self, hash: &str, urls: &[String]) -> DownloaderResult<()> {
        let _ = (hash, urls);
        Err(self.unsupported("remove_torrent_trackers"))
    }

    /// Set the per-torrent download limit.
    async fn set_torrent_download_limit(&self, hash: &str, limit: i64) -> DownloaderResult<()> {
        let _ = (hash, limit);
        Err(self.unsupported("set_torrent_download_limit"))
    }

    /// Set the per-torrent upload limit.
    async fn set_torrent_upload_limit(&self, hash: &str, limit: i64) -> DownloaderResult<()> {
        let _ = (hash, limit);
        Err(self.unsupported("set_torrent_upload_limit"))
    }

    /// Read the per-torrent download limit.
    async fn get_torrent_download_limit(&self, hash: &str) -> DownloaderResult<i64> {
        let _ = hash;
        Err(self.unsupported("get_torrent_download_limit"))
    }

    /// Read the per-torrent upload limit.
    async fn get_torrent_upload_limit(&self, hash: &str) -> DownloaderResult<i64> {
        let _ = hash;
        Err(self.unsupported("get_torrent_upload_limit"))
    }

    /// Set the backend-specific priority.
    async fn set_torrent_priority(&self, hash: &str, priority: i64) -> DownloaderResult<()> {
        let _ = (hash, priority);
        Err(self.unsupported("set_torrent_priority"))
    }

    // ---- files ----

    /// List files inside the torrent.
    async fn get_torrent_files(&self, hash: &str) -> DownloaderResult<Vec<TorrentFile>> {
        let _ = hash;
        Err(self.unsupported("get_torrent_files"))
    }

    /// Set priority for the given file indexes.
    async fn set_file_priority(
        &self,
        hash: &str,
        file_ids: &[i64],
        priority: i64,
    ) -> DownloaderResult<()> {
        let _ = (hash, file_ids, priority);
        Err(self.unsupported("set_file_priority"))
    }

    /// Rename a file inside the torrent.
    async fn rename_file(&self, hash: &str, old_path: &str, new_path: &str) -> DownloaderResult<()> {
        let _ = (hash, old_path, new_path);
        Err(self.unsupported("rename_file"))
    }

    /// Rename a folder inside the torrent.
    async fn rename_folder(
        &self,
        hash: &str,
        old_path: &str,
        new_path: &str,
    ) -> DownloaderResult<()> {
        let _ = (hash, old_path, new_path);
        Err(self.unsupported("rename_folder"))
    }

    // ---- introspection ----

    /// Tracker announce state.
    async fn get_torrent_trackers(&self, hash: &str) -> DownloaderResult<Vec<TrackerInfo>> {
        let _ = hash;
        Err(self.unsupported("get_torrent_trackers"))
    }

    /// Connected peers.
    async fn get_torrent_peers(&self, hash: &str) -> DownloaderResult<Vec<PeerInfo>> {
        let _ = hash;
        Err(self.unsupported("get_torrent_peers"))
    }

    /// Detailed properties.
    async fn get_torrent_properties(&self, hash: &str) -> DownloaderResult<TorrentProperties> {
        let _ = hash;
        Err(self.unsupported("get_torrent_properties"))
    }

    /// Per-piece state (0 missing, 1 downloading, 2 complete).
    async fn get_torrent_piece_states(&self, hash: &str) -> DownloaderResult<Vec<i64>> {
        let _ = hash;
        Err(self.unsupported("get_torrent_piece_states"))
    }

    // ---- categories and tags ----

    /// All categories keyed by name.
    async fn get_categories(&self) -> DownloaderResult<BTreeMap<String, Category>> {
        Err(self.unsupported("get_categories"))
    }

    /// Create a category.
    async fn create_category(&self, name: &str, save_path: &str) -> DownloaderResult<()> {
        let _ = (name, save_path);
        Err(self.unsupported("create_category"))
    }

    /// Change a category's save path.
    async fn edit_category(&self, name: &str, save_path: &str) -> DownloaderResult<()> {
        let _ = (name, save_path);
        Err(self.unsupported("edit_category"))
    }

    /// Delete categories.
    async fn remove_categories(&self, names: &[String]) -> DownloaderResult<()> {
        let _ = names;
        Err(self.unsupported("remove_categories"))
    }

    /// All known tags.
    async fn get_tags(&self) -> DownloaderResult<Vec<String>> {
        Err(self.unsupported("get_tags"))
    }

    /// Register tags.
    async fn create_tags(&self, tags: &[String]) -> DownloaderResult<()> {
        let _ = tags;
        Err(self.unsupported("create_tags"))
    }

    /// Delete tags everywhere.
    async fn delete_tags(&self, tags: &[String]) -> DownloaderResult<()> {
        let _ = tags;
        Err(self.unsupported("delete_tags"))
    }

    // ---- global limits ----

    /// Global download limit.
    async fn get_global_download_limit(&self) -> DownloaderResult<i64> {
        Err(self.unsupported("get_global_download_limit"))
    }

    /// Global upload limit.
    async fn get_global_upload_limit(&self) -> DownloaderResult<i64> {
        Err(self.unsupported("get_global_upload_limit"))
    }

    /// Set the global download limit.
    async fn set_global_download_limit(&self, limit: i64) -> DownloaderResult<()> {
        let _ = limit;
        Err(self.unsupported("set_global_download_limit"))
    }

    /// Set the global upload limit.
    async fn set_global_upload_limit(&self, limit: i64) -> DownloaderResult<()> {
        let _ = limit;
        Err(self.unsupported("set_global_upload_limit"))
    }

    /// Whether alternative speed limits are active.
    async fn get_alternative_speed_limits_enabled(&self) -> DownloaderResult<bool> {
        Err(self.unsupported("get_alternative_speed_limits_enabled"))
    }

    /// Flip alternative speed limits.
    async fn toggle_alternative_speed_limits(&self) -> DownloaderResult<()> {
        Err(self.unsupported("toggle_alternative_speed_limits"))
    }

    // ---- transfer and server ----

    /// Global transfer statistics.
    async fn get_transfer_info(&self) -> DownloaderResult<TransferInfo> {
        Err(self.unsupported("get_transfer_info"))
    }

    /// Free bytes at `path` (backend default directory when empty).
    async fn get_free_space(&self, path: &str) -> DownloaderResult<i64> {
        let _ = path;
        Err(self.unsupported("get_free_space"))
    }

    /// Backend identification.
    async fn get_server_info(&self) -> DownloaderResult<ServerInfo> {
        Err(self.unsupported("get_server_info"))
    }

    /// Default download directory.
    async fn get_default_save_path(&self) -> DownloaderResult<String> {
        Err(self.unsupported("get_default_save_path"))
    }

    /// Stop the backend daemon.
    async fn shutdown(&self) -> DownloaderResult<()> {
        Err(self.unsupported("shutdown"))
    }

    // ---- logs ----

    /// Backend log lines newer than `last_known_id`.
    async fn get_logs(
        &self,
        normal: bool,
        warning: bool,
        critical: bool,
        last_known_id: i64,
    ) -> DownloaderResult<Vec<LogEntry>> {
        let _ = (normal, warning, critical, last_known_id);
        Err(self.unsupported("get_logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubClient {
        added: Mutex<Vec<TorrentOptions>>,
        paused: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DownloaderClient for StubClient {
        fn client_id(&self) -> &str {
            "stub"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Transmission
        }

        async fn get_torrents(&self) -> DownloaderResult<Vec<UnifiedTorrent>> {
            Ok(vec![UnifiedTorrent {
                client_id: "stub".into(),
                hash: "abcdef".into(),
                ..UnifiedTorrent::default()
            }])
        }

        async fn add_torrent_with_options(&self, options: TorrentOptions) -> DownloaderResult<()> {
            self.added
                .lock()
                .map_err(|_| DownloaderError::InvalidInput {
                    field: "added",
                    reason: "poisoned",
                })?
                .push(options);
            Ok(())
        }

        async fn pause_torrent(&self, hash: &str) -> DownloaderResult<()> {
            if hash == "bad" {
                return Err(DownloaderError::not_found(hash));
            }
            self.paused
                .lock()
                .map_err(|_| DownloaderError::InvalidInput {
                    field: "paused",
                    reason: "poisoned",
                })?
                .push(hash.to_string());
            Ok(())
        }

        async fn resume_torrent(&self, _hash: &str) -> DownloaderResult<()> {
            Ok(())
        }

        async fn delete_torrent(&self, _hash: &str, _delete_files: bool) -> DownloaderResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_batch_stops_at_first_error() {
        let client = StubClient::default();
        let hashes = vec!["h1".to_string(), "bad".to_string(), "h3".to_string()];
        let err = client
            .pause_torrents(&hashes)
            .await
            .expect_err("second hash fails");
        assert!(matches!(err, DownloaderError::NotFound { ref hash } if hash == "bad"));
        let paused = client.paused.lock().expect("lock").clone();
        assert_eq!(paused, vec!["h1".to_string()]);
    }

    #[tokio::test]
    async fn default_operations_report_unsupported_with_backend() {
        let client = StubClient::default();
        let err = client
            .get_torrent_piece_states("abcdef")
            .await
            .expect_err("unsupported");
        assert!(matches!(
            err,
            DownloaderError::Unsupported {
                operation: "get_torrent_piece_states",
                backend: BackendKind::Transmission
            }
        ));
    }

    #[tokio::test]
    async fn details_scan_is_case_insensitive_and_reports_missing_hash() -> anyhow::Result<()> {
        let client = StubClient::default();
        let found = client.get_torrent_details("ABCDEF").await?;
        assert_eq!(found.hash, "abcdef");
        let err = client
            .get_torrent_details("ffff")
            .await
            .expect_err("missing");
        assert!(matches!(err, DownloaderError::NotFound { ref hash } if hash == "ffff"));
        Ok(())
    }

    #[tokio::test]
    async fn add_from_file_reads_bytes_and_keeps_options() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.torrent");
        std::fs::write(&path, b"d4:infod4:name3:fooee")?;
        let client = StubClient::default();
        client
            .add_torrent_from_file(
                &path,
                TorrentOptions {
                    category: "movies".into(),
                    ..TorrentOptions::default()
                },
            )
            .await?;
        let added = client.added.lock().expect("lock").clone();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].category, "movies");
        assert_eq!(added[0].torrent_file, b"d4:infod4:name3:fooee".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn add_from_missing_file_is_io_error() {
        let client = StubClient::default();
        let err = client
            .add_torrent_from_file(Path::new("/nonexistent/x.torrent"), TorrentOptions::default())
            .await
            .expect_err("missing file");
        assert!(matches!(err, DownloaderError::Io { .. }));
    }
}

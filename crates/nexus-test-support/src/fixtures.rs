//! Torrent fixtures.

use chrono::{TimeZone, Utc};
use nexus_torrent_core::UnifiedTorrent;

/// Downloading torrent owned by `client_id` with plausible defaults.
#[must_use]
pub fn torrent(client_id: &str, hash: &str) -> UnifiedTorrent {
    UnifiedTorrent {
        client_id: client_id.to_string(),
        hash: hash.to_string(),
        name: format!("fixture-{hash}"),
        size: 1_048_576,
        state: "downloading".to_string(),
        progress: 0.5,
        downloaded: 524_288,
        eta: 60,
        added_on: Utc.timestamp_opt(1_700_000_000, 0).single(),
        save_path: "/downloads".to_string(),
        download_limit: -1,
        upload_limit: -1,
        ..UnifiedTorrent::default()
    }
}

/// Magnet link for `hash`.
#[must_use]
pub fn magnet(hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{hash}")
}

//! Unified data model shared by every backend adapter and the orchestrator.
//!
//! Fields a backend cannot report stay at their zero value rather than being omitted, so the
//! serialized shape is identical regardless of which backend produced it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sentinel used for every unlimited rate in the unified model.
pub const UNLIMITED: i64 = -1;

/// Normalise a native limit where `0` or any negative value means "no limit".
#[must_use]
pub const fn unified_limit(native: i64) -> i64 {
    if native <= 0 { UNLIMITED } else { native }
}

/// Supported backend implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// qBittorrent WebAPI v2.
    Qbittorrent,
    /// Transmission RPC.
    Transmission,
}

impl BackendKind {
    /// Stable lowercase identifier used in configuration and responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qbittorrent => "qbittorrent",
            Self::Transmission => "transmission",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = UnknownBackendKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "qbittorrent" => Ok(Self::Qbittorrent),
            "transmission" => Ok(Self::Transmission),
            _ => Err(UnknownBackendKind {
                value: value.to_string(),
            }),
        }
    }
}

/// Returned when parsing an unrecognised backend identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend kind")]
pub struct UnknownBackendKind {
    /// Offending input.
    pub value: String,
}

/// Canonical view of one torrent on one backend.
///
/// Snapshots are read-through: nothing is cached, re-fetch to observe changes. `hash` is only
/// unique within a single `client_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedTorrent {
    /// Configured identifier of the backend that reported the torrent.
    pub client_id: String,
    /// Backend-native info hash, lowercase hex.
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Total selected size in bytes.
    pub size: i64,
    /// Backend-reported status string; vocabularies differ per backend.
    pub state: String,
    /// Completion ratio between `0.0` and `1.0`.
    pub progress: f64,
    /// Current download rate in bytes per second.
    pub download_speed: i64,
    /// Current upload rate in bytes per second.
    pub upload_speed: i64,
    /// Cumulative bytes downloaded.
    pub downloaded: i64,
    /// Cumulative bytes uploaded.
    pub uploaded: i64,
    /// Estimated seconds to completion; sentinel for "unknown" is backend defined.
    pub eta: i64,
    /// When the torrent was added, if reported.
    pub added_on: Option<DateTime<Utc>>,
    /// When the torrent completed, if it has.
    pub completed_on: Option<DateTime<Utc>>,
    /// Download directory.
    pub save_path: String,
    /// Category name; empty when unset.
    pub category: String,
    /// Tags in backend order.
    pub tags: Vec<String>,
    /// First announce URL, best effort.
    pub tracker: String,
    /// Per-torrent download limit in bytes per second, `-1` when unlimited.
    pub download_limit: i64,
    /// Per-torrent upload limit in bytes per second, `-1` when unlimited.
    pub upload_limit: i64,
    /// Share ratio.
    pub ratio: f64,
    /// Backend-specific priority; not comparable across clients.
    pub priority: i64,
}

/// Write-side request to add a torrent.
///
/// Zero values mean "let the backend decide". Non-empty `torrent_file` wins over `url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentOptions {
    /// Magnet link or HTTP(S) URL to a `.torrent`.
    pub url: String,
    /// Raw `.torrent` metainfo bytes.
    #[serde(skip)]
    pub torrent_file: Vec<u8>,
    /// Download directory.
    pub save_path: String,
    /// Category to assign.
    pub category: String,
    /// Tags to assign.
    pub tags: Vec<String>,
    /// Backend-specific priority.
    pub priority: i64,
    /// Download pieces sequentially.
    pub sequential: bool,
    /// Prioritise first and last pieces.
    pub first_last_piece: bool,
    /// Skip hash checking.
    pub skip_checking: bool,
    /// Add in paused state.
    pub paused: bool,
    /// Download limit in bytes per second.
    pub download_limit: i64,
    /// Upload limit in bytes per second.
    pub upload_limit: i64,
    /// Share ratio limit.
    pub ratio_limit: f64,
    /// Seeding time limit in seconds.
    pub seeding_time_limit: i64,
    /// Let the backend manage the torrent's location.
    pub auto_management: bool,
    /// Content layout hint (`Original`, `Subfolder`, `NoSubfolder`).
    pub content_layout: String,
    /// Create a root folder for multi-file torrents.
    pub root_folder: bool,
    /// Name override.
    pub rename: String,
}

impl TorrentOptions {
    /// Options that only carry a magnet or URL.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Whether metainfo bytes were supplied.
    #[must_use]
    pub const fn has_torrent_file(&self) -> bool {
        !self.torrent_file.is_empty()
    }
}

/// A category and its save path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category name.
    pub name: String,
    /// Associated save path; empty when the backend has none.
    pub save_path: String,
}

/// One file inside a torrent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// File index used by priority operations.
    pub index: i64,
    /// Path relative to the torrent root.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    /// Completion ratio.
    pub progress: f64,
    /// Backend priority (`0` means skipped).
    pub priority: i64,
    /// Bytes downloaded.
    pub downloaded: i64,
    /// Whether the file is selected for download.
    pub wanted: bool,
}

/// Announce state of one tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerInfo {
    /// Announce URL.
    pub url: String,
    /// Backend status code.
    pub status: i64,
    /// Human-readable status.
    pub status_message: String,
    /// Tracker tier.
    pub tier: i64,
    /// Peers reported.
    pub peers: i64,
    /// Seeders reported.
    pub seeds: i64,
    /// Leechers reported.
    pub leechers: i64,
    /// Completed downloads reported.
    pub downloaded: i64,
    /// Last announce message.
    pub message: String,
}

/// One connected peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Peer address.
    pub ip: String,
    /// Peer port.
    pub port: u16,
    /// Client software string.
    pub client: String,
    /// Peer completion ratio.
    pub progress: f64,
    /// Rate we download from the peer.
    pub download_speed: i64,
    /// Rate we upload to the peer.
    pub upload_speed: i64,
    /// Bytes downloaded from the peer.
    pub downloaded: i64,
    /// Bytes uploaded to the peer.
    pub uploaded: i64,
    /// Connection type.
    pub connection: String,
    /// Backend flag string.
    pub flags: String,
    /// Country code.
    pub country: String,
    /// Country name.
    pub country_name: String,
}

/// Detailed torrent properties. Timestamps are unix seconds, `0` when unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TorrentProperties {
    /// Torrent hash.
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Download directory.
    pub save_path: String,
    /// Metainfo creation time.
    pub creation_date: i64,
    /// Piece length in bytes.
    pub piece_size: i64,
    /// Metainfo comment.
    pub comment: String,
    /// Bytes discarded after failed checks.
    pub total_wasted: i64,
    /// All-time bytes uploaded.
    pub total_uploaded: i64,
    /// All-time bytes downloaded.
    pub total_downloaded: i64,
    /// Bytes uploaded this session.
    pub uploaded_session: i64,
    /// Bytes downloaded this session.
    pub downloaded_session: i64,
    /// Upload limit, `-1` when unlimited.
    pub upload_limit: i64,
    /// Download limit, `-1` when unlimited.
    pub download_limit: i64,
    /// Seconds the torrent has been active.
    pub time_elapsed: i64,
    /// Seconds spent seeding.
    pub seeding_time: i64,
    /// Open connections.
    pub connections_count: i64,
    /// Connection cap.
    pub connections_limit: i64,
    /// Share ratio.
    pub share_ratio: f64,
    /// When the torrent was added.
    pub addition_date: i64,
    /// When the torrent completed.
    pub completion_date: i64,
    /// Metainfo creator.
    pub created_by: String,
    /// Last transfer activity.
    pub last_activity: i64,
    /// Connected leechers.
    pub peers_count: i64,
    /// Connected seeders.
    pub seeds_count: i64,
    /// Leechers in the swarm.
    pub total_peers: i64,
    /// Seeders in the swarm.
    pub total_seeds: i64,
}

/// Global transfer statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInfo {
    /// Current download rate in bytes per second.
    pub download_speed: i64,
    /// Current upload rate in bytes per second.
    pub upload_speed: i64,
    /// Bytes downloaded this session.
    pub downloaded_bytes: i64,
    /// Bytes uploaded this session.
    pub uploaded_bytes: i64,
    /// Global download limit, `-1` when unlimited.
    pub download_speed_limit: i64,
    /// Global upload limit, `-1` when unlimited.
    pub upload_speed_limit: i64,
    /// DHT nodes known.
    #[serde(rename = "dht_nodes")]
    pub dht: i64,
    /// Backend connection status string.
    pub connection_status: String,
    /// Connected peers.
    pub total_peers_connected: i64,
    /// Buffer size in bytes.
    pub total_buffers_size: i64,
    /// Wasted bytes.
    pub total_wasted: i64,
    /// Whether alternative speed limits are active.
    pub alternative_speed_limits: bool,
    /// Free space on the default download disk.
    pub free_space_on_disk: i64,
}

/// One backend log line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic log id.
    pub id: i64,
    /// Message text.
    pub message: String,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Severity bit: 1 normal, 2 info, 4 warning, 8 critical.
    #[serde(rename = "type")]
    pub kind: i64,
}

/// Backend identification and raw preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Backend implementation.
    pub backend: BackendKind,
    /// Daemon version string.
    pub version: String,
    /// API or RPC version string.
    pub api_version: String,
    /// Default download directory.
    pub default_save_path: String,
    /// Backend-specific extras passed through verbatim.
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_limit_maps_zero_and_negative_to_unlimited() {
        assert_eq!(unified_limit(0), UNLIMITED);
        assert_eq!(unified_limit(-5), UNLIMITED);
        assert_eq!(unified_limit(2048), 2048);
    }

    #[test]
    fn backend_kind_round_trips_through_str() {
        assert_eq!(
            "Transmission".parse::<BackendKind>(),
            Ok(BackendKind::Transmission)
        );
        assert_eq!(BackendKind::Qbittorrent.to_string(), "qbittorrent");
        assert!("deluge".parse::<BackendKind>().is_err());
    }

    #[test]
    fn torrent_options_deserialize_with_defaults() -> anyhow::Result<()> {
        let options: TorrentOptions =
            serde_json::from_str(r#"{"url":"magnet:?xt=urn:btih:aa","paused":true}"#)?;
        assert_eq!(options.url, "magnet:?xt=urn:btih:aa");
        assert!(options.paused);
        assert!(options.tags.is_empty());
        assert!(!options.has_torrent_file());
        Ok(())
    }
}

#![allow(clippy::redundant_pub_crate)]

//! Native qBittorrent payloads and their projection into the unified model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use nexus_torrent_core::{
    Category, LogEntry, PeerInfo, TorrentFile, TorrentProperties, TrackerInfo, UnifiedTorrent,
    unified_limit,
};
use serde::Deserialize;
use serde_json::Value;

/// Entry of `torrents/info`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TorrentInfo {
    pub(crate) hash: String,
    pub(crate) name: String,
    pub(crate) size: i64,
    pub(crate) state: String,
    pub(crate) progress: f64,
    pub(crate) dlspeed: i64,
    pub(crate) upspeed: i64,
    pub(crate) downloaded: i64,
    pub(crate) uploaded: i64,
    pub(crate) eta: i64,
    pub(crate) added_on: i64,
    pub(crate) completion_on: i64,
    pub(crate) save_path: String,
    pub(crate) category: String,
    pub(crate) tags: String,
    pub(crate) tracker: String,
    pub(crate) dl_limit: i64,
    pub(crate) up_limit: i64,
    pub(crate) ratio: f64,
    pub(crate) priority: i64,
    pub(crate) seq_dl: bool,
    pub(crate) f_l_piece_prio: bool,
}

impl TorrentInfo {
    /// Project into the unified model for `client_id`.
    #[must_use]
    pub(crate) fn into_unified(self, client_id: &str) -> UnifiedTorrent {
        UnifiedTorrent {
            client_id: client_id.to_string(),
            hash: self.hash.to_ascii_lowercase(),
            name: self.name,
            size: self.size,
            state: self.state,
            progress: self.progress,
            download_speed: self.dlspeed,
            upload_speed: self.upspeed,
            downloaded: self.downloaded,
            uploaded: self.uploaded,
            eta: self.eta,
            added_on: timestamp(self.added_on),
            completed_on: timestamp(self.completion_on),
            save_path: self.save_path,
            category: self.category,
            tags: split_tags(&self.tags),
            tracker: self.tracker,
            download_limit: unified_limit(self.dl_limit),
            upload_limit: unified_limit(self.up_limit),
            ratio: self.ratio,
            priority: self.priority,
        }
    }
}

/// Entry of `torrents/files`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FileEntry {
    pub(crate) index: Option<i64>,
    pub(crate) name: String,
    pub(crate) size: i64,
    pub(crate) progress: f64,
    pub(crate) priority: i64,
}

impl FileEntry {
    /// Project into the unified model; `position` backs older daemons that omit `index`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub(crate) fn into_unified(self, position: usize) -> TorrentFile {
        let downloaded = (self.size as f64 * self.progress).round() as i64;
        TorrentFile {
            index: self
                .index
                .unwrap_or_else(|| i64::try_from(position).unwrap_or(i64::MAX)),
            name: self.name,
            size: self.size,
            progress: self.progress,
            priority: self.priority,
            downloaded,
            wanted: self.priority != 0,
        }
    }
}

/// Entry of `torrents/trackers`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TrackerEntry {
    pub(crate) url: String,
    pub(crate) status: i64,
    pub(crate) tier: Value,
    pub(crate) num_peers: i64,
    pub(crate) num_seeds: i64,
    pub(crate) num_leeches: i64,
    pub(crate) num_downloaded: i64,
    pub(crate) msg: String,
}

impl TrackerEntry {
    /// DHT, PeX and LSD appear as `** [DHT] **` pseudo trackers.
    #[must_use]
    pub(crate) fn is_pseudo(&self) -> bool {
        self.url.starts_with("**")
    }

    /// Project into the unified model.
    #[must_use]
    pub(crate) fn into_unified(self) -> TrackerInfo {
        let tier = match &self.tier {
            Value::Number(number) => number.as_i64().unwrap_or(-1),
            Value::String(text) => text.parse().unwrap_or(-1),
            _ => -1,
        };
        TrackerInfo {
            status_message: tracker_status_message(self.status).to_string(),
            url: self.url,
            status: self.status,
            tier,
            peers: self.num_peers,
            seeds: self.num_seeds,
            leechers: self.num_leeches,
            downloaded: self.num_downloaded,
            message: self.msg,
        }
    }
}

const fn tracker_status_message(status: i64) -> &'static str {
    match status {
        0 => "disabled",
        1 => "not contacted",
        2 => "working",
        3 => "updating",
        4 => "not working",
        _ => "unknown",
    }
}

/// Body of `sync/torrentPeers`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PeersResponse {
    pub(crate) peers: BTreeMap<String, PeerEntry>,
}

/// One peer keyed by `ip:port` in [`PeersResponse`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PeerEntry {
    pub(crate) ip: String,
    pub(crate) port: u16,
    pub(crate) client: String,
    pub(crate) progress: f64,
    pub(crate) dl_speed: i64,
    pub(crate) up_speed: i64,
    pub(crate) downloaded: i64,
    pub(crate) uploaded: i64,
    pub(crate) connection: String,
    pub(crate) flags: String,
    pub(crate) country_code: String,
    pub(crate) country: String,
}

impl From<PeerEntry> for PeerInfo {
    fn from(peer: PeerEntry) -> Self {
        Self {
            ip: peer.ip,
            port: peer.port,
            client: peer.client,
            progress: peer.progress,
            download_speed: peer.dl_speed,
            upload_speed: peer.up_speed,
            downloaded: peer.downloaded,
            uploaded: peer.uploaded,
            connection: peer.connection,
            flags: peer.flags,
            country: peer.country_code,
            country_name: peer.country,
        }
    }
}

/// Body of `torrents/properties`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PropertiesResponse {
    pub(crate) name: String,
    pub(crate) save_path: String,
    pub(crate) creation_date: i64,
    pub(crate) piece_size: i64,
    pub(crate) comment: String,
    pub(crate) total_wasted: i64,
    pub(crate) total_uploaded: i64,
    pub(crate) total_downloaded: i64,
    pub(crate) total_uploaded_session: i64,
    pub(crate) total_downloaded_session: i64,
    pub(crate) up_limit: i64,
    pub(crate) dl_limit: i64,
    pub(crate) time_elapsed: i64,
    pub(crate) seeding_time: i64,
    pub(crate) nb_connections: i64,
    pub(crate) nb_connections_limit: i64,
    pub(crate) share_ratio: f64,
    pub(crate) addition_date: i64,
    pub(crate) completion_date: i64,
    pub(crate) created_by: String,
    pub(crate) last_seen: i64,
    pub(crate) peers: i64,
    pub(crate) peers_total: i64,
    pub(crate) seeds: i64,
    pub(crate) seeds_total: i64,
}

impl PropertiesResponse {
    /// Project into the unified model.
    #[must_use]
    pub(crate) fn into_unified(self, hash: &str) -> TorrentProperties {
        TorrentProperties {
            hash: hash.to_ascii_lowercase(),
            name: self.name,
            save_path: self.save_path,
            creation_date: self.creation_date.max(0),
            piece_size: self.piece_size,
            comment: self.comment,
            total_wasted: self.total_wasted,
            total_uploaded: self.total_uploaded,
            total_downloaded: self.total_downloaded,
            uploaded_session: self.total_uploaded_session,
            downloaded_session: self.total_downloaded_session,
            upload_limit: unified_limit(self.up_limit),
            download_limit: unified_limit(self.dl_limit),
            time_elapsed: self.time_elapsed,
            seeding_time: self.seeding_time,
            connections_count: self.nb_connections,
            connections_limit: self.nb_connections_limit,
            share_ratio: self.share_ratio,
            addition_date: self.addition_date.max(0),
            completion_date: self.completion_date.max(0),
            created_by: self.created_by,
            last_activity: self.last_seen.max(0),
            peers_count: self.peers,
            seeds_count: self.seeds,
            total_peers: self.peers_total,
            total_seeds: self.seeds_total,
        }
    }
}

/// Value of the `torrents/categories` map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CategoryEntry {
    pub(crate) name: String,
    #[serde(rename = "savePath")]
    pub(crate) save_path: String,
}

impl From<CategoryEntry> for Category {
    fn from(entry: CategoryEntry) -> Self {
        Self {
            name: entry.name,
            save_path: entry.save_path,
        }
    }
}

/// Body of `transfer/info`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TransferInfoResponse {
    pub(crate) dl_info_speed: i64,
    pub(crate) dl_info_data: i64,
    pub(crate) up_info_speed: i64,
    pub(crate) up_info_data: i64,
    pub(crate) dl_rate_limit: i64,
    pub(crate) up_rate_limit: i64,
    pub(crate) dht_nodes: i64,
    pub(crate) connection_status: String,
}

/// Body of `sync/maindata`; only the server state is consumed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MainData {
    pub(crate) server_state: ServerState,
}

/// Global counters reported by `sync/maindata`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ServerState {
    pub(crate) free_space_on_disk: i64,
    pub(crate) total_buffers_size: i64,
    pub(crate) total_peer_connections: i64,
    pub(crate) total_wasted_session: i64,
    pub(crate) use_alt_speed_limits: bool,
}

/// Entry of `log/main`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LogLine {
    pub(crate) id: i64,
    pub(crate) message: String,
    pub(crate) timestamp: i64,
    #[serde(rename = "type")]
    pub(crate) kind: i64,
}

impl From<LogLine> for LogEntry {
    fn from(line: LogLine) -> Self {
        Self {
            id: line.id,
            message: line.message,
            timestamp: line.timestamp,
            kind: line.kind,
        }
    }
}

/// qBittorrent reports "never" as `-1` or `0`.
fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds <= 0 {
        None
    } else {
        DateTime::from_timestamp(seconds, 0)
    }
}

/// Split the comma-separated tag string, dropping blanks.
#[must_use]
pub(crate) fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torrent_info_maps_sentinels_and_tags() -> anyhow::Result<()> {
        let info: TorrentInfo = serde_json::from_str(
            r#"{"hash":"ABCDEF","name":"ubuntu","size":100,"state":"downloading",
                "progress":0.5,"dlspeed":10,"upspeed":2,"added_on":1700000000,
                "completion_on":-1,"tags":"linux, iso,","dl_limit":0,"up_limit":4096,
                "priority":3}"#,
        )?;
        let unified = info.into_unified("qb");
        assert_eq!(unified.hash, "abcdef");
        assert_eq!(unified.client_id, "qb");
        assert_eq!(unified.tags, vec!["linux".to_string(), "iso".to_string()]);
        assert_eq!(unified.download_limit, -1);
        assert_eq!(unified.upload_limit, 4096);
        assert!(unified.added_on.is_some());
        assert!(unified.completed_on.is_none());
        assert_eq!(unified.priority, 3);
        Ok(())
    }

    #[test]
    fn tracker_tier_accepts_strings_and_numbers() -> anyhow::Result<()> {
        let entries: Vec<TrackerEntry> = serde_json::from_str(
            r#"[{"url":"** [DHT] **","tier":""},
                {"url":"udp://t.example:80","tier":0,"status":2,"num_seeds":5}]"#,
        )?;
        assert!(entries[0].is_pseudo());
        let tracker = entries[1].clone().into_unified();
        assert_eq!(tracker.tier, 0);
        assert_eq!(tracker.status_message, "working");
        assert_eq!(tracker.seeds, 5);
        assert_eq!(entries[0].clone().into_unified().tier, -1);
        Ok(())
    }

    #[test]
    fn file_entry_derives_downloaded_and_wanted() {
        let file = FileEntry {
            index: None,
            name: "a.mkv".into(),
            size: 1000,
            progress: 0.25,
            priority: 0,
        }
        .into_unified(3);
        assert_eq!(file.index, 3);
        assert_eq!(file.downloaded, 250);
        assert!(!file.wanted);
    }
}

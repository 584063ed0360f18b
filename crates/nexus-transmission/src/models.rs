#![allow(clippy::redundant_pub_crate)]

//! Native Transmission RPC payloads and their projection into the unified model.
//!
//! # Design
//! - One `TorrentRecord` serves every `torrent-get`; each call requests only the fields it needs
//!   and the rest stay at their defaults.
//! - Rates and limits arrive in bytes/s and KB/s respectively; see `convert.rs`.

use chrono::{DateTime, Utc};
use nexus_torrent_core::{
    PeerInfo, TorrentFile, TorrentProperties, TrackerInfo, UnifiedTorrent,
};
use serde::Deserialize;

use crate::convert::{category_of, limit_from_kbps, state_name, tags_of, unified_priority};

/// Fields needed to resolve a hash to a numeric id.
pub(crate) const ID_FIELDS: &[&str] = &["id", "hashString"];

/// Fields backing [`TorrentRecord::into_unified`].
pub(crate) const LIST_FIELDS: &[&str] = &[
    "id",
    "hashString",
    "name",
    "totalSize",
    "status",
    "percentDone",
    "rateDownload",
    "rateUpload",
    "downloadedEver",
    "uploadedEver",
    "eta",
    "addedDate",
    "doneDate",
    "downloadDir",
    "labels",
    "trackers",
    "downloadLimit",
    "downloadLimited",
    "uploadLimit",
    "uploadLimited",
    "uploadRatio",
    "bandwidthPriority",
];

/// Fields backing [`TorrentRecord::into_properties`].
pub(crate) const PROPERTY_FIELDS: &[&str] = &[
    "id",
    "hashString",
    "name",
    "downloadDir",
    "dateCreated",
    "pieceSize",
    "comment",
    "corruptEver",
    "uploadedEver",
    "downloadedEver",
    "uploadLimit",
    "uploadLimited",
    "downloadLimit",
    "downloadLimited",
    "secondsDownloading",
    "secondsSeeding",
    "peersConnected",
    "peersSendingToUs",
    "peerLimit",
    "uploadRatio",
    "addedDate",
    "doneDate",
    "creator",
    "activityDate",
    "trackerStats",
];

/// Entry of the `torrents` array returned by `torrent-get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct TorrentRecord {
    pub(crate) id: i64,
    pub(crate) hash_string: String,
    pub(crate) name: String,
    pub(crate) total_size: i64,
    pub(crate) status: i64,
    pub(crate) percent_done: f64,
    pub(crate) rate_download: i64,
    pub(crate) rate_upload: i64,
    pub(crate) downloaded_ever: i64,
    pub(crate) uploaded_ever: i64,
    pub(crate) eta: i64,
    pub(crate) added_date: i64,
    pub(crate) done_date: i64,
    pub(crate) download_dir: String,
    pub(crate) labels: Vec<String>,
    pub(crate) trackers: Vec<TrackerRecord>,
    pub(crate) download_limit: i64,
    pub(crate) download_limited: bool,
    pub(crate) upload_limit: i64,
    pub(crate) upload_limited: bool,
    pub(crate) upload_ratio: f64,
    pub(crate) bandwidth_priority: i64,
    pub(crate) files: Vec<FileRecord>,
    pub(crate) file_stats: Vec<FileStatRecord>,
    pub(crate) tracker_stats: Vec<TrackerStatRecord>,
    pub(crate) peers: Vec<PeerRecord>,
    pub(crate) date_created: i64,
    pub(crate) piece_size: i64,
    pub(crate) comment: String,
    pub(crate) corrupt_ever: i64,
    pub(crate) seconds_downloading: i64,
    pub(crate) seconds_seeding: i64,
    pub(crate) peers_connected: i64,
    pub(crate) peers_sending_to_us: i64,
    pub(crate) peer_limit: i64,
    pub(crate) creator: String,
    pub(crate) activity_date: i64,
}

impl TorrentRecord {
    /// Whether this record carries `hash`, compared case-insensitively.
    pub(crate) fn matches(&self, hash: &str) -> bool {
        self.hash_string.eq_ignore_ascii_case(hash)
    }

    /// Effective download limit in unified bytes/s.
    pub(crate) const fn unified_download_limit(&self) -> i64 {
        limit_from_kbps(self.download_limit, self.download_limited)
    }

    /// Effective upload limit in unified bytes/s.
    pub(crate) const fn unified_upload_limit(&self) -> i64 {
        limit_from_kbps(self.upload_limit, self.upload_limited)
    }

    /// Project into the unified model for `client_id`.
    pub(crate) fn into_unified(self, client_id: &str) -> UnifiedTorrent {
        let download_limit = self.unified_download_limit();
        let upload_limit = self.unified_upload_limit();
        let tracker = self
            .trackers
            .iter()
            .min_by_key(|tracker| (tracker.tier, tracker.id))
            .map(|tracker| tracker.announce.clone())
            .unwrap_or_default();
        UnifiedTorrent {
            client_id: client_id.to_string(),
            hash: self.hash_string.to_ascii_lowercase(),
            name: self.name,
            size: self.total_size,
            state: state_name(self.status).to_string(),
            progress: self.percent_done,
            download_speed: self.rate_download,
            upload_speed: self.rate_upload,
            downloaded: self.downloaded_ever,
            uploaded: self.uploaded_ever,
            eta: self.eta,
            added_on: timestamp(self.added_date),
            completed_on: timestamp(self.done_date),
            save_path: self.download_dir,
            category: category_of(&self.labels),
            tags: tags_of(&self.labels),
            tracker,
            download_limit,
            upload_limit,
            ratio: self.upload_ratio,
            priority: unified_priority(self.bandwidth_priority),
        }
    }

    /// Merge `files` with `fileStats` by position.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn into_files(self) -> Vec<TorrentFile> {
        let stats = self.file_stats;
        self.files
            .into_iter()
            .enumerate()
            .map(|(position, file)| {
                let stat = stats.get(position);
                let downloaded = stat.map_or(file.bytes_completed, |stat| stat.bytes_completed);
                let progress = if file.length > 0 {
                    downloaded as f64 / file.length as f64
                } else {
                    0.0
                };
                TorrentFile {
                    index: i64::try_from(position).unwrap_or(i64::MAX),
                    name: file.name,
                    size: file.length,
                    progress,
                    priority: stat.map_or(0, |stat| stat.priority),
                    downloaded,
                    wanted: stat.is_none_or(|stat| stat.wanted),
                }
            })
            .collect()
    }

    /// Tracker announce state from `trackerStats`.
    pub(crate) fn into_trackers(self) -> Vec<TrackerInfo> {
        self.tracker_stats
            .into_iter()
            .map(TrackerStatRecord::into_unified)
            .collect()
    }

    /// Connected peers.
    pub(crate) fn into_peers(self) -> Vec<PeerInfo> {
        self.peers.into_iter().map(PeerInfo::from).collect()
    }

    /// Project into detailed properties. Session counters are not reported by Transmission.
    pub(crate) fn into_properties(self) -> TorrentProperties {
        let download_limit = self.unified_download_limit();
        let upload_limit = self.unified_upload_limit();
        let total_seeds = self
            .tracker_stats
            .iter()
            .map(|stat| stat.seeder_count)
            .max()
            .unwrap_or(0)
            .max(0);
        let total_peers = self
            .tracker_stats
            .iter()
            .map(|stat| stat.leecher_count)
            .max()
            .unwrap_or(0)
            .max(0);
        TorrentProperties {
            hash: self.hash_string.to_ascii_lowercase(),
            name: self.name,
            save_path: self.download_dir,
            creation_date: self.date_created.max(0),
            piece_size: self.piece_size,
            comment: self.comment,
            total_wasted: self.corrupt_ever,
            total_uploaded: self.uploaded_ever,
            total_downloaded: self.downloaded_ever,
            uploaded_session: 0,
            downloaded_session: 0,
            upload_limit,
            download_limit,
            time_elapsed: self.seconds_downloading + self.seconds_seeding,
            seeding_time: self.seconds_seeding,
            connections_count: self.peers_connected,
            connections_limit: self.peer_limit,
            share_ratio: self.upload_ratio,
            addition_date: self.added_date.max(0),
            completion_date: self.done_date.max(0),
            created_by: self.creator,
            last_activity: self.activity_date.max(0),
            peers_count: self.peers_connected,
            seeds_count: self.peers_sending_to_us,
            total_peers,
            total_seeds,
        }
    }
}

/// Entry of `trackers`; `id` is what `trackerRemove` expects.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TrackerRecord {
    pub(crate) announce: String,
    pub(crate) id: i64,
    pub(crate) tier: i64,
}

/// Entry of `files`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct FileRecord {
    pub(crate) name: String,
    pub(crate) length: i64,
    pub(crate) bytes_completed: i64,
}

/// Entry of `fileStats`, parallel to `files`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct FileStatRecord {
    pub(crate) wanted: bool,
    pub(crate) priority: i64,
    pub(crate) bytes_completed: i64,
}

/// Entry of `trackerStats`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct TrackerStatRecord {
    pub(crate) announce: String,
    pub(crate) tier: i64,
    pub(crate) announce_state: i64,
    pub(crate) last_announce_result: String,
    pub(crate) last_announce_peer_count: i64,
    pub(crate) seeder_count: i64,
    pub(crate) leecher_count: i64,
    pub(crate) download_count: i64,
}

impl TrackerStatRecord {
    fn into_unified(self) -> TrackerInfo {
        TrackerInfo {
            url: self.announce,
            status: self.announce_state,
            status_message: announce_state_name(self.announce_state).to_string(),
            tier: self.tier,
            peers: self.last_announce_peer_count,
            seeds: self.seeder_count,
            leechers: self.leecher_count,
            downloaded: self.download_count,
            message: self.last_announce_result,
        }
    }
}

const fn announce_state_name(state: i64) -> &'static str {
    match state {
        0 => "inactive",
        1 => "waiting",
        2 => "queued",
        3 => "active",
        _ => "unknown",
    }
}

/// Entry of `peers`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct PeerRecord {
    pub(crate) address: String,
    pub(crate) port: u16,
    pub(crate) client_name: String,
    pub(crate) progress: f64,
    pub(crate) rate_to_client: i64,
    pub(crate) rate_to_peer: i64,
    pub(crate) flag_str: String,
    #[serde(rename = "isUTP")]
    pub(crate) is_utp: bool,
}

impl From<PeerRecord> for PeerInfo {
    fn from(peer: PeerRecord) -> Self {
        Self {
            ip: peer.address,
            port: peer.port,
            client: peer.client_name,
            progress: peer.progress,
            download_speed: peer.rate_to_client,
            upload_speed: peer.rate_to_peer,
            connection: if peer.is_utp { "uTP" } else { "BT" }.to_string(),
            flags: peer.flag_str,
            ..Self::default()
        }
    }
}

/// Arguments of `torrent-get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TorrentGetResponse {
    pub(crate) torrents: Vec<TorrentRecord>,
}

/// Arguments of `torrent-add`: exactly one of the two keys is present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TorrentAddResponse {
    #[serde(rename = "torrent-added")]
    pub(crate) added: Option<AddedTorrent>,
    #[serde(rename = "torrent-duplicate")]
    pub(crate) duplicate: Option<AddedTorrent>,
}

/// Identity of a torrent reported by `torrent-add`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct AddedTorrent {
    pub(crate) id: i64,
    pub(crate) hash_string: String,
    pub(crate) name: String,
}

/// Arguments of `session-get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct SessionArgs {
    pub(crate) version: String,
    pub(crate) rpc_version: i64,
    pub(crate) rpc_version_minimum: i64,
    pub(crate) download_dir: String,
    pub(crate) speed_limit_down: i64,
    pub(crate) speed_limit_down_enabled: bool,
    pub(crate) speed_limit_up: i64,
    pub(crate) speed_limit_up_enabled: bool,
    pub(crate) alt_speed_enabled: bool,
}

/// Arguments of `session-stats`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SessionStats {
    pub(crate) download_speed: i64,
    pub(crate) upload_speed: i64,
    #[serde(rename = "current-stats")]
    pub(crate) current: StatsBlock,
}

/// Byte counters inside `session-stats`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct StatsBlock {
    pub(crate) downloaded_bytes: i64,
    pub(crate) uploaded_bytes: i64,
}

/// Arguments of `free-space`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct FreeSpace {
    #[serde(rename = "size-bytes")]
    pub(crate) size_bytes: i64,
}

/// Transmission reports "never" as `0`.
fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds <= 0 {
        None
    } else {
        DateTime::from_timestamp(seconds, 0)
    }
}

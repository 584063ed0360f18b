//! Request and response bodies for the REST surface.
//!
//! # Design
//! - Every success response is wrapped in [`ApiResponse`]; failures are [`ProblemDetails`].
//! - Requests carry only what the routed operation needs; the client id and hash come from
//!   the path except on the aggregate `/api/v1/torrents` routes.

use nexus_torrent_core::TorrentOptions;
use serde::{Deserialize, Serialize};

/// Success envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`; failures use problem details instead.
    pub success: bool,
    /// Operation payload.
    pub data: T,
    /// Item count for list payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> ApiResponse<T> {
    /// Wrap a single payload.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            count: None,
        }
    }

    /// Wrap a list payload with its length.
    #[must_use]
    pub const fn counted(data: T, count: usize) -> Self {
        Self {
            success: true,
            data,
            count: Some(count),
        }
    }
}

/// RFC9457-compatible problem document surfaced on errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary of the problem type.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Occurrence-specific explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Acknowledgement for mutations that return no data.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Ack {
    /// Client the operation was routed to.
    pub client_id: String,
    /// Operation that was applied.
    pub operation: &'static str,
}

/// Add a torrent by URL or base64 metainfo.
#[derive(Debug, Clone, Deserialize)]
pub struct AddTorrentRequest {
    /// Target client.
    pub client_id: String,
    /// Base64-encoded `.torrent` file; takes precedence over `url`.
    #[serde(default)]
    pub torrent_file: Option<String>,
    /// Add options (`url`, `save_path`, `category`, `tags`, limits, ...).
    #[serde(flatten)]
    pub options: TorrentOptions,
}

/// Batch action over hashes on one client.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    /// Target client.
    pub client_id: String,
    /// Torrent hashes, applied in order.
    pub hashes: Vec<String>,
    /// Delete downloaded data (removal only).
    #[serde(default)]
    pub delete_files: bool,
}

/// New data location.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRequest {
    /// Target directory.
    pub location: String,
}

/// New torrent name.
#[derive(Debug, Clone, Deserialize)]
pub struct NameRequest {
    /// Display name.
    pub name: String,
}

/// Boolean toggle.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ToggleRequest {
    /// Desired state.
    pub enabled: bool,
}

/// Share limits.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ShareLimitRequest {
    /// Ratio limit (`-1` unlimited, `-2` global default).
    pub ratio_limit: f64,
    /// Seeding time limit in minutes (`-1` unlimited, `-2` global default).
    pub seeding_time_limit: i64,
}

/// Category assignment; empty clears it.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRequest {
    /// Category name.
    #[serde(default)]
    pub category: String,
}

/// Tag list.
#[derive(Debug, Clone, Deserialize)]
pub struct TagsRequest {
    /// Tags.
    pub tags: Vec<String>,
}

/// Tracker URL list.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackersRequest {
    /// Announce URLs.
    pub trackers: Vec<String>,
}

/// Speed limits in bytes per second; absent directions are left unchanged.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitsRequest {
    /// Download limit, `-1` for unlimited.
    #[serde(default)]
    pub download_limit: Option<i64>,
    /// Upload limit, `-1` for unlimited.
    #[serde(default)]
    pub upload_limit: Option<i64>,
}

/// Current speed limits in bytes per second.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LimitsView {
    /// Download limit, `-1` when unlimited.
    pub download_limit: i64,
    /// Upload limit, `-1` when unlimited.
    pub upload_limit: i64,
}

/// Backend-specific priority.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PriorityRequest {
    /// Priority value.
    pub priority: i64,
}

/// File priority update.
#[derive(Debug, Clone, Deserialize)]
pub struct FilePriorityRequest {
    /// File indexes.
    pub file_ids: Vec<i64>,
    /// Priority (`0` skips the file).
    pub priority: i64,
}

/// Rename a file or folder inside a torrent.
#[derive(Debug, Clone, Deserialize)]
pub struct RenameRequest {
    /// Current relative path.
    pub old_path: String,
    /// New relative path.
    pub new_path: String,
}

/// Create or edit a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryUpsertRequest {
    /// Category name.
    pub name: String,
    /// Save path; empty uses the backend default.
    #[serde(default)]
    pub save_path: String,
}

/// Categories to delete.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRemoveRequest {
    /// Category names.
    pub names: Vec<String>,
}

/// Alternative speed limit state.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AltSpeedView {
    /// Whether alternative limits are active.
    pub enabled: bool,
}

/// Query for free disk space.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FreeSpaceQuery {
    /// Directory to inspect; empty uses the backend default.
    pub path: String,
}

/// Free disk space.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FreeSpaceView {
    /// Directory that was inspected.
    pub path: String,
    /// Free bytes.
    pub free_bytes: i64,
}

/// Default download directory.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SavePathView {
    /// Directory path.
    pub save_path: String,
}

/// Query for backend logs.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct LogsQuery {
    /// Include normal messages.
    pub normal: bool,
    /// Include warnings.
    pub warning: bool,
    /// Include critical messages.
    pub critical: bool,
    /// Only return entries with a greater id.
    pub last_known_id: i64,
}

impl Default for LogsQuery {
    fn default() -> Self {
        Self {
            normal: true,
            warning: true,
            critical: true,
            last_known_id: -1,
        }
    }
}

/// Result of a live connection test.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectionView {
    /// Tested client.
    pub client_id: String,
    /// Torrents visible on the backend.
    pub torrent_count: usize,
}

#![allow(clippy::redundant_pub_crate)]

//! Unit, label and priority conversions between the unified model and Transmission.

/// Labels carrying this prefix hold the torrent's category.
pub(crate) const CATEGORY_PREFIX: &str = "category:";

/// Category encoded in `labels`, or empty when none is set.
pub(crate) fn category_of(labels: &[String]) -> String {
    labels
        .iter()
        .find_map(|label| label.strip_prefix(CATEGORY_PREFIX))
        .unwrap_or_default()
        .to_string()
}

/// Labels that are plain tags.
pub(crate) fn tags_of(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .filter(|label| !label.starts_with(CATEGORY_PREFIX))
        .cloned()
        .collect()
}

/// Rebuild a label list from a category and tags; duplicates are dropped.
pub(crate) fn compose_labels(category: &str, tags: &[String]) -> Vec<String> {
    let mut labels = Vec::with_capacity(tags.len() + 1);
    if !category.is_empty() {
        labels.push(format!("{CATEGORY_PREFIX}{category}"));
    }
    for tag in tags {
        if !tag.is_empty() && !labels.contains(tag) {
            labels.push(tag.clone());
        }
    }
    labels
}

/// Native KB/s limit to unified bytes/s; a disabled limit is unlimited.
pub(crate) const fn limit_from_kbps(kbps: i64, enabled: bool) -> i64 {
    if enabled && kbps > 0 {
        kbps.saturating_mul(1024)
    } else {
        -1
    }
}

/// Unified bytes/s to native KB/s, rounding up; `None` disables the limit.
pub(crate) const fn kbps_from_limit(limit: i64) -> Option<i64> {
    if limit <= 0 {
        None
    } else {
        Some(limit.saturating_add(1023) / 1024)
    }
}

/// Bucket a unified priority into `bandwidthPriority` (1 high, 0 normal, -1 low).
///
/// Unified priorities run from 1 (highest) to 10: `<= 3` is high, `>= 7` is low.
pub(crate) const fn bandwidth_priority(priority: i64) -> i64 {
    if priority <= 3 {
        1
    } else if priority >= 7 {
        -1
    } else {
        0
    }
}

/// Project `bandwidthPriority` onto the unified scale: 1 high, 5 normal, 9 low.
///
/// Each projected value buckets back to the native value it came from.
pub(crate) const fn unified_priority(native: i64) -> i64 {
    match native {
        1.. => 1,
        ..=-1 => 9,
        0 => 5,
    }
}

/// Name of a `status` code.
pub(crate) const fn state_name(status: i64) -> &'static str {
    match status {
        0 => "stopped",
        1 => "check pending",
        2 => "checking",
        3 => "download pending",
        4 => "downloading",
        5 => "seed pending",
        6 => "seeding",
        _ => "unknown",
    }
}

/// `torrent-set` key for a file priority: qBittorrent-style `0` skips, `>= 6` is high,
/// negative is low, anything else normal.
pub(crate) const fn file_priority_key(priority: i64) -> &'static str {
    if priority == 0 {
        "files-unwanted"
    } else if priority >= 6 {
        "priority-high"
    } else if priority < 0 {
        "priority-low"
    } else {
        "priority-normal"
    }
}

/// Seed limit `(value, mode)` pair: `-2` follows the session default (mode 0), other negatives
/// disable the limit (mode 2), anything else is an explicit limit (mode 1).
pub(crate) fn seed_limit<T: Default + PartialOrd + From<i8>>(value: T) -> (T, i64) {
    if value == T::from(-2) {
        (T::default(), 0)
    } else if value < T::default() {
        (T::default(), 2)
    } else {
        (value, 1)
    }
}

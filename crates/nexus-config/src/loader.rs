//! Read the configuration file, apply environment overrides, validate.
//!
//! # Design
//! - The file path comes from `NEXUS_CONFIG`, falling back to `config/down-nexus.json`.
//! - Environment lookups go through a caller-supplied function so tests never touch the
//!   process environment.
//! - Configuration is read once; there is no reload.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppConfig, LogStyle};
use crate::validate::validate;

/// Load configuration using the process environment.
///
/// # Errors
///
/// Returns IO, parse or validation failures.
pub fn load() -> ConfigResult<AppConfig> {
    load_with(|name| std::env::var(name).ok())
}

/// Load configuration resolving environment variables through `lookup`.
///
/// # Errors
///
/// Returns IO, parse or validation failures.
pub fn load_with<F>(lookup: F) -> ConfigResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = lookup(defaults::CONFIG_PATH_ENV)
        .filter(|value| !value.trim().is_empty())
        .map_or_else(|| PathBuf::from(defaults::CONFIG_PATH), PathBuf::from);
    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.clone(),
        source,
    })?;
    let mut config = parse_at(&raw, &path)?;
    apply_overrides(&mut config, &lookup)?;
    validate(&config)?;
    info!(
        path = %path.display(),
        clients = config.clients.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Parse and validate an in-memory document without environment overrides.
///
/// # Errors
///
/// Returns parse or validation failures.
pub fn parse_document(raw: &str) -> ConfigResult<AppConfig> {
    let config = parse_at(raw, Path::new(""))?;
    validate(&config)?;
    Ok(config)
}

fn parse_at(raw: &str, path: &Path) -> ConfigResult<AppConfig> {
    serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_overrides<F>(config: &mut AppConfig, lookup: &F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(defaults::BIND_ADDR_ENV) {
        config.server.bind_addr = value.trim().parse::<IpAddr>().map_err(|_| {
            ConfigError::invalid("server", "bind_addr", Some(value.clone()), "invalid_ip")
        })?;
    }
    if let Some(value) = lookup(defaults::PORT_ENV) {
        config.server.port = value.trim().parse::<u16>().map_err(|_| {
            ConfigError::invalid("server", "port", Some(value.clone()), "invalid_port")
        })?;
    }
    if let Some(value) = lookup(defaults::LOG_LEVEL_ENV) {
        config.logging.level = value;
    }
    if let Some(value) = lookup(defaults::LOG_FORMAT_ENV) {
        config.logging.format = Some(LogStyle::parse(&value).ok_or_else(|| {
            ConfigError::invalid("logging", "format", Some(value.clone()), "unknown_format")
        })?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const DOCUMENT: &str = r#"{
        "server": {"port": 9000},
        "logging": {"level": "debug", "format": "json"},
        "clients": [
            {
                "client_id": "qb",
                "type": "qbittorrent",
                "host": "http://qb:8080",
                "username": "admin",
                "password": "secret",
                "default_category": "misc",
                "global_download_limit": 1048576
            },
            {
                "client_id": "tr",
                "type": "transmission",
                "host": "tr:9091",
                "enabled": false
            }
        ]
    }"#;

    fn write_document(contents: &str) -> anyhow::Result<(tempfile::TempDir, PathBuf)> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("down-nexus.json");
        fs::write(&path, contents)?;
        Ok((dir, path))
    }

    fn env(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn loads_file_named_by_environment() -> anyhow::Result<()> {
        let (_dir, path) = write_document(DOCUMENT)?;
        let config = load_with(env(&[(
            "NEXUS_CONFIG",
            path.display().to_string(),
        )]))?;

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, Some(LogStyle::Json));
        assert_eq!(config.clients.len(), 2);
        assert_eq!(config.clients[0].default_category, "misc");
        assert!(!config.clients[1].connects_on_start());
        Ok(())
    }

    #[test]
    fn environment_overrides_file_values() -> anyhow::Result<()> {
        let (_dir, path) = write_document(DOCUMENT)?;
        let config = load_with(env(&[
            ("NEXUS_CONFIG", path.display().to_string()),
            ("NEXUS_BIND_ADDR", "::1".to_string()),
            ("NEXUS_PORT", "7070".to_string()),
            ("NEXUS_LOG_LEVEL", "warn".to_string()),
            ("NEXUS_LOG_FORMAT", "pretty".to_string()),
        ]))?;

        assert_eq!(config.server.bind_addr, IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(config.server.port, 7070);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, Some(LogStyle::Pretty));
        Ok(())
    }

    #[test]
    fn invalid_override_is_a_field_error() -> anyhow::Result<()> {
        let (_dir, path) = write_document(DOCUMENT)?;
        let err = load_with(env(&[
            ("NEXUS_CONFIG", path.display().to_string()),
            ("NEXUS_PORT", "eighty".to_string()),
        ]))
        .expect_err("port must be numeric");
        assert!(matches!(
            err,
            ConfigError::InvalidField { ref field, reason: "invalid_port", .. } if field == "port"
        ));
        Ok(())
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_with(env(&[(
            "NEXUS_CONFIG",
            "/nonexistent/down-nexus.json".to_string(),
        )]))
        .expect_err("missing file");
        assert!(matches!(
            err,
            ConfigError::Io { operation: "config.read", ref path, .. }
                if path == Path::new("/nonexistent/down-nexus.json")
        ));
    }

    #[test]
    fn malformed_document_is_a_parse_error() -> anyhow::Result<()> {
        let (_dir, path) = write_document("{ not json")?;
        let err = load_with(env(&[("NEXUS_CONFIG", path.display().to_string())]))
            .expect_err("malformed");
        assert!(matches!(err, ConfigError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn empty_document_uses_defaults() -> anyhow::Result<()> {
        let config = parse_document("{}")?;
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.format.is_none());
        assert!(config.clients.is_empty());
        Ok(())
    }
}

//! Field checks applied after parsing and environment overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::model::{AppConfig, ClientConfig};

/// Validate a complete configuration document.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] naming the first offending field.
pub fn validate(config: &AppConfig) -> ConfigResult<()> {
    if config.server.port == 0 {
        return Err(ConfigError::invalid(
            "server",
            "port",
            Some("0".to_string()),
            "must_be_non_zero",
        ));
    }
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::invalid(
            "logging",
            "level",
            None,
            "must_not_be_empty",
        ));
    }
    for (index, client) in config.clients.iter().enumerate() {
        validate_client(client)?;
        if config.clients[..index]
            .iter()
            .any(|earlier| earlier.client_id == client.client_id)
        {
            return Err(ConfigError::invalid(
                "clients",
                "client_id",
                Some(client.client_id.clone()),
                "duplicate",
            ));
        }
    }
    Ok(())
}

fn validate_client(client: &ClientConfig) -> ConfigResult<()> {
    if client.client_id.trim().is_empty() {
        return Err(ConfigError::invalid(
            "clients",
            "client_id",
            None,
            "must_not_be_empty",
        ));
    }
    if client.host.trim().is_empty() {
        return Err(ConfigError::invalid(
            "clients",
            "host",
            Some(client.client_id.clone()),
            "must_not_be_empty",
        ));
    }
    client.backend()?;
    check_limit("global_download_limit", client.global_download_limit)?;
    check_limit("global_upload_limit", client.global_upload_limit)
}

fn check_limit(field: &'static str, limit: i64) -> ConfigResult<()> {
    if limit < -1 {
        return Err(ConfigError::invalid(
            "clients",
            field,
            Some(limit.to_string()),
            "must_be_at_least_minus_one",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(clients: serde_json::Value) -> anyhow::Result<AppConfig> {
        Ok(serde_json::from_value(json!({ "clients": clients }))?)
    }

    fn reason(result: ConfigResult<()>) -> Option<(String, &'static str)> {
        match result {
            Err(ConfigError::InvalidField { field, reason, .. }) => Some((field, reason)),
            _ => None,
        }
    }

    #[test]
    fn accepts_minimal_clients() -> anyhow::Result<()> {
        let config = config(json!([
            {"client_id": "qb", "type": "qbittorrent", "host": "http://qb:8080"},
            {"client_id": "tr", "type": "transmission", "host": "tr:9091", "global_upload_limit": -1},
        ]))?;
        validate(&config)?;
        Ok(())
    }

    #[test]
    fn rejects_duplicate_ids() -> anyhow::Result<()> {
        let config = config(json!([
            {"client_id": "qb", "type": "qbittorrent", "host": "a"},
            {"client_id": "qb", "type": "transmission", "host": "b"},
        ]))?;
        assert_eq!(
            reason(validate(&config)),
            Some(("client_id".to_string(), "duplicate"))
        );
        Ok(())
    }

    #[test]
    fn rejects_empty_host_and_bad_limits() -> anyhow::Result<()> {
        let empty_host = config(json!([
            {"client_id": "qb", "type": "qbittorrent", "host": " "},
        ]))?;
        assert_eq!(
            reason(validate(&empty_host)),
            Some(("host".to_string(), "must_not_be_empty"))
        );
        let bad_limit = config(json!([
            {"client_id": "qb", "type": "qbittorrent", "host": "a", "global_download_limit": -5},
        ]))?;
        assert_eq!(
            reason(validate(&bad_limit)),
            Some(("global_download_limit".to_string(), "must_be_at_least_minus_one"))
        );
        Ok(())
    }

    #[test]
    fn rejects_zero_port_and_unknown_kind() -> anyhow::Result<()> {
        let mut zero_port = AppConfig::default();
        zero_port.server.port = 0;
        assert_eq!(
            reason(validate(&zero_port)),
            Some(("port".to_string(), "must_be_non_zero"))
        );
        let unknown = config(json!([
            {"client_id": "d", "type": "deluge", "host": "a"},
        ]))?;
        assert_eq!(
            reason(validate(&unknown)),
            Some(("type".to_string(), "unknown_backend"))
        );
        Ok(())
    }
}

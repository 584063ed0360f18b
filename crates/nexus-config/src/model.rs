//! Typed configuration document.
//!
//! # Design
//! - Pure data carriers deserialized from JSON; missing sections fall back to defaults.
//! - Client kinds stay strings until validation so an unknown kind is reported as a field
//!   error instead of a parse error.

use std::fmt;
use std::net::IpAddr;

use nexus_torrent_core::BackendKind;
use serde::Deserialize;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Log output.
    pub logging: LoggingSettings,
    /// Downloader clients to connect.
    pub clients: Vec<ClientConfig>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: IpAddr,
    /// TCP port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::BIND_ADDR,
            port: defaults::PORT,
        }
    }
}

/// Log output selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStyle {
    /// Structured JSON lines.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl LogStyle {
    /// Parse `json` or `pretty`, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Output style; inferred from the build profile when absent.
    pub format: Option<LogStyle>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

/// One downloader connection.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Stable identifier used for routing.
    pub client_id: String,
    /// Backend kind (`qbittorrent` or `transmission`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Base URL or `host:port`.
    pub host: String,
    /// Login name; empty disables authentication where the backend allows it.
    #[serde(default)]
    pub username: String,
    /// Login secret.
    #[serde(default)]
    pub password: String,
    /// Whether the client participates at all.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    /// Name shown in client listings.
    #[serde(default)]
    pub display_name: String,
    /// Save path applied to add requests without one.
    #[serde(default)]
    pub default_save_path: String,
    /// Category applied to add requests without one.
    #[serde(default)]
    pub default_category: String,
    /// Tags applied to add requests without any.
    #[serde(default)]
    pub default_tags: Vec<String>,
    /// Global download limit applied at startup; `0` leaves the backend unchanged.
    #[serde(default)]
    pub global_download_limit: i64,
    /// Global upload limit applied at startup; `0` leaves the backend unchanged.
    #[serde(default)]
    pub global_upload_limit: i64,
    /// Connect during startup.
    #[serde(default = "defaults::enabled")]
    pub auto_connect_on_start: bool,
}

impl ClientConfig {
    /// Parsed backend kind.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for unknown kinds.
    pub fn backend(&self) -> ConfigResult<BackendKind> {
        self.kind.parse().map_err(|_| {
            ConfigError::invalid(
                "clients",
                "type",
                Some(self.kind.clone()),
                "unknown_backend",
            )
        })
    }

    /// Whether startup should connect this client.
    #[must_use]
    pub const fn connects_on_start(&self) -> bool {
        self.enabled && self.auto_connect_on_start
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("display_name", &self.display_name)
            .field("default_save_path", &self.default_save_path)
            .field("default_category", &self.default_category)
            .field("default_tags", &self.default_tags)
            .field("global_download_limit", &self.global_download_limit)
            .field("global_upload_limit", &self.global_upload_limit)
            .field("auto_connect_on_start", &self.auto_connect_on_start)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_defaults_enable_and_auto_connect() -> anyhow::Result<()> {
        let client: ClientConfig = serde_json::from_value(json!({
            "client_id": "qb",
            "type": "qbittorrent",
            "host": "http://localhost:8080",
        }))?;
        assert!(client.connects_on_start());
        assert_eq!(client.backend()?, BackendKind::Qbittorrent);
        assert_eq!(client.global_download_limit, 0);
        Ok(())
    }

    #[test]
    fn debug_output_hides_password() -> anyhow::Result<()> {
        let client: ClientConfig = serde_json::from_value(json!({
            "client_id": "tr",
            "type": "transmission",
            "host": "localhost:9091",
            "password": "hunter2",
        }))?;
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
        Ok(())
    }

    #[test]
    fn unknown_kind_is_a_field_error() -> anyhow::Result<()> {
        let client: ClientConfig = serde_json::from_value(json!({
            "client_id": "x",
            "type": "deluge",
            "host": "localhost",
        }))?;
        assert!(matches!(
            client.backend(),
            Err(ConfigError::InvalidField { ref field, .. }) if field == "type"
        ));
        Ok(())
    }

    #[test]
    fn log_style_parses_case_insensitively() {
        assert_eq!(LogStyle::parse("JSON"), Some(LogStyle::Json));
        assert_eq!(LogStyle::parse(" pretty "), Some(LogStyle::Pretty));
        assert_eq!(LogStyle::parse("xml"), None);
    }
}

//! # Design
//!
//! - Centralize application-level errors for bootstrap.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: nexus_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: nexus_telemetry::TelemetryError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: nexus_api::ApiServerError,
    },
    /// Downloader registry operations failed.
    #[error("downloader operation failed")]
    Downloader {
        /// Operation identifier.
        operation: &'static str,
        /// Source downloader error.
        source: nexus_torrent_core::DownloaderError,
    },
    /// No configured client could be connected.
    #[error("no downloader client connected")]
    NoClients {
        /// Clients eligible for connection at startup.
        attempted: usize,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: nexus_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: nexus_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: nexus_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn downloader(
        operation: &'static str,
        source: nexus_torrent_core::DownloaderError,
    ) -> Self {
        Self::Downloader { operation, source }
    }
}

//! Immutable set of registered downloader adapters.
//!
//! # Design
//! - Built once at startup from already-connected adapters and never mutated afterwards.
//! - Lookup is a linear scan; registries hold a handful of clients.
//! - Duplicate client ids are rejected at construction so routing stays unambiguous.

use std::sync::Arc;

use nexus_torrent_core::{BackendKind, DownloaderClient, DownloaderError, DownloaderResult};
use serde::Serialize;

/// Values applied to add requests that leave them empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddDefaults {
    /// Download directory.
    pub save_path: String,
    /// Category.
    pub category: String,
    /// Tags.
    pub tags: Vec<String>,
}

/// One adapter with its presentation metadata.
#[derive(Clone)]
pub struct Registration {
    client: Arc<dyn DownloaderClient>,
    display_name: String,
    defaults: AddDefaults,
}

impl Registration {
    /// Register `client` with no display name and empty defaults.
    #[must_use]
    pub fn new(client: Arc<dyn DownloaderClient>) -> Self {
        Self {
            client,
            display_name: String::new(),
            defaults: AddDefaults::default(),
        }
    }

    /// Set the human-readable name shown in client listings.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set the defaults applied to add requests.
    #[must_use]
    pub fn with_defaults(mut self, defaults: AddDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Client id of the wrapped adapter.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client.client_id()
    }

    /// Wrapped adapter.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn DownloaderClient> {
        &self.client
    }

    /// Add-request defaults.
    #[must_use]
    pub const fn defaults(&self) -> &AddDefaults {
        &self.defaults
    }

    /// Listing entry for this registration; the display name falls back to the client id.
    #[must_use]
    pub fn summary(&self) -> ClientSummary {
        let display_name = if self.display_name.is_empty() {
            self.client_id().to_string()
        } else {
            self.display_name.clone()
        };
        ClientSummary {
            client_id: self.client_id().to_string(),
            kind: self.client.kind(),
            display_name,
        }
    }
}

/// Public description of a registered client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSummary {
    /// Configuration-assigned identifier.
    pub client_id: String,
    /// Backend implementation.
    #[serde(rename = "type")]
    pub kind: BackendKind,
    /// Human-readable name.
    pub display_name: String,
}

/// Registered adapters in registration order.
pub struct ClientRegistry {
    registrations: Vec<Registration>,
}

impl ClientRegistry {
    /// Build a registry.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::DuplicateClientId`] when two registrations share an id.
    pub fn new(registrations: Vec<Registration>) -> DownloaderResult<Self> {
        for (index, registration) in registrations.iter().enumerate() {
            let client_id = registration.client_id();
            if registrations[..index]
                .iter()
                .any(|earlier| earlier.client_id() == client_id)
            {
                return Err(DownloaderError::DuplicateClientId {
                    client_id: client_id.to_string(),
                });
            }
        }
        Ok(Self { registrations })
    }

    /// Registration for `client_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::ClientNotFound`] when no adapter carries that id.
    pub fn get(&self, client_id: &str) -> DownloaderResult<&Registration> {
        self.registrations
            .iter()
            .find(|registration| registration.client_id() == client_id)
            .ok_or_else(|| DownloaderError::client_not_found(client_id))
    }

    /// Registrations in order.
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.iter()
    }

    /// Number of registered clients.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_test_support::FakeDownloader;

    fn registration(client_id: &str, kind: BackendKind) -> Registration {
        Registration::new(Arc::new(FakeDownloader::new(client_id, kind)))
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = ClientRegistry::new(vec![
            registration("qb", BackendKind::Qbittorrent),
            registration("tr", BackendKind::Transmission),
            registration("qb", BackendKind::Transmission),
        ]);
        assert!(matches!(
            result,
            Err(DownloaderError::DuplicateClientId { ref client_id }) if client_id == "qb"
        ));
    }

    #[test]
    fn lookup_finds_registered_and_reports_unknown() -> anyhow::Result<()> {
        let registry = ClientRegistry::new(vec![
            registration("qb", BackendKind::Qbittorrent),
            registration("tr", BackendKind::Transmission),
        ])?;
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
        assert_eq!(registry.get("tr")?.client().kind(), BackendKind::Transmission);
        assert!(matches!(
            registry.get("nope"),
            Err(DownloaderError::ClientNotFound { ref client_id }) if client_id == "nope"
        ));
        Ok(())
    }

    #[test]
    fn summary_falls_back_to_client_id() {
        let plain = registration("qb", BackendKind::Qbittorrent);
        assert_eq!(plain.summary().display_name, "qb");
        let named = registration("tr", BackendKind::Transmission).with_display_name("NAS");
        let summary = named.summary();
        assert_eq!(summary.display_name, "NAS");
        assert_eq!(summary.kind, BackendKind::Transmission);
    }
}

//! Shared handler state.

use nexus_orchestrator::TorrentService;

pub(crate) struct ApiState {
    pub(crate) service: TorrentService,
}

impl ApiState {
    pub(crate) const fn new(service: TorrentService) -> Self {
        Self { service }
    }
}

use reelpipe_core::{
    Authenticator, Config, IngestCoordinator, SanitizedConfig, StorageLayout, VideoCatalog,
};
use std::sync::Arc;

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    catalog: Arc<dyn VideoCatalog>,
    coordinator: Arc<IngestCoordinator>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        catalog: Arc<dyn VideoCatalog>,
        coordinator: Arc<IngestCoordinator>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            authenticator,
            catalog,
            coordinator,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn catalog(&self) -> &Arc<dyn VideoCatalog> {
        &self.catalog
    }

    pub fn coordinator(&self) -> &Arc<IngestCoordinator> {
        &self.coordinator
    }

    pub fn storage(&self) -> &StorageLayout {
        self.coordinator.storage()
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}

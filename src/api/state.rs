use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::coordinator::LocationCoordinator;
use crate::directory::GroupDirectory;

/// Handler state. Cloned per request, everything inside is shared.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: LocationCoordinator,
    /// Token auth and join-code lookups
    pub directory: Arc<dyn GroupDirectory>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(coordinator: LocationCoordinator, directory: Arc<dyn GroupDirectory>) -> Self {
        let started_at = coordinator.state().clock.now();
        Self {
            coordinator,
            directory,
            started_at,
        }
    }

    /// Seconds since startup, measured on the coordinator's clock
    pub fn uptime_seconds(&self) -> i64 {
        (self.coordinator.state().clock.now() - self.started_at).num_seconds()
    }
}

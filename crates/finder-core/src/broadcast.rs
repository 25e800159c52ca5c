//! Fans location changes out to the bus.
//!
//! Consumes the worker's change stream in order and, for each change,
//! publishes the badge's new location followed by the occupancy count of
//! the location it entered (and of the one it left).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{Bus, BusError};
use crate::models::BadgeId;
use crate::registry::BadgeRegistry;
use crate::utils::normalize_location;

/// A badge's resolved location differs from its last known one.
/// Emitted only after the registry reflects the new location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationChange {
    pub badge: BadgeId,
    pub location: String,
    pub previous: Option<String>,
}

pub struct BroadcastDispatcher<B> {
    registry: Arc<BadgeRegistry>,
    bus: Arc<B>,
    changes: mpsc::UnboundedReceiver<LocationChange>,
}

impl<B: Bus> BroadcastDispatcher<B> {
    pub fn new(
        registry: Arc<BadgeRegistry>,
        bus: Arc<B>,
        changes: mpsc::UnboundedReceiver<LocationChange>,
    ) -> Self {
        Self {
            registry,
            bus,
            changes,
        }
    }

    /// Dispatch changes until the stream ends or the bus disconnects
    pub async fn run(mut self) {
        info!("Broadcast dispatcher started");
        while let Some(change) = self.changes.recv().await {
            match self.dispatch(&change) {
                Ok(()) => {}
                Err(BusError::Disconnected) => {
                    warn!("Bus disconnected, stopping broadcast dispatcher");
                    break;
                }
                Err(e) => warn!(badge = %change.badge, error = %e, "Failed to publish location change"),
            }
        }
        info!("Broadcast dispatcher stopped");
    }

    pub fn dispatch(&self, change: &LocationChange) -> Result<(), BusError> {
        let location = normalize_location(&change.location);
        self.bus.publish_location(change.badge, &location)?;

        let count = self.registry.count_at(&location);
        self.bus.publish_occupancy(&location, count)?;
        debug!(badge = %change.badge, location = %location, count, "Published location update");

        if let Some(vacated) = change
            .previous
            .as_deref()
            .map(normalize_location)
            .filter(|p| *p != location)
        {
            self.bus.publish_occupancy(&vacated, self.registry.count_at(&vacated))?;
        }
        Ok(())
    }
}

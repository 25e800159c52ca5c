//! Periodic scan requests.
//!
//! A single loop walks every badge, asks the overdue ones to scan, and then
//! sleeps until the earliest upcoming deadline. A newly registered badge
//! cuts the sleep short so its first deadline is not overslept, though
//! passes never run closer together than [`MIN_SLEEP`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::bus::{Bus, BusError};
use crate::models::BadgeId;
use crate::registry::BadgeRegistry;

/// Shortest sleep between passes
pub const MIN_SLEEP: Duration = Duration::from_millis(100);

/// Outcome of one scheduler pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pass {
    pub requested: Vec<BadgeId>,
    pub next_deadline: Option<DateTime<Utc>>,
}

pub struct ScanScheduler<B> {
    registry: Arc<BadgeRegistry>,
    bus: Arc<B>,
}

impl<B: Bus> ScanScheduler<B> {
    pub fn new(registry: Arc<BadgeRegistry>, bus: Arc<B>) -> Self {
        Self { registry, bus }
    }

    fn scan_interval(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.registry.scan_interval())
            .unwrap_or_else(|_| chrono::Duration::seconds(60))
    }

    /// Decide which badges are due at `now` without publishing anything.
    /// Badges waiting for submission are skipped entirely.
    pub fn plan(&self, now: DateTime<Utc>) -> Pass {
        let interval = self.scan_interval();
        let mut pass = Pass::default();

        for badge in self.registry.all() {
            if badge.in_submission_queue {
                continue;
            }
            let deadline = badge.scan_deadline(interval);
            if deadline <= now {
                pass.requested.push(badge.id);
            } else if pass.next_deadline.map_or(true, |next| deadline < next) {
                pass.next_deadline = Some(deadline);
            }
        }
        pass
    }

    /// Run one pass: plan and send scan requests
    pub fn pass(&self, now: DateTime<Utc>) -> Result<Pass, BusError> {
        let pass = self.plan(now);
        for &badge in &pass.requested {
            match self.bus.request_scan(badge) {
                Ok(()) => {}
                Err(BusError::Disconnected) => return Err(BusError::Disconnected),
                Err(e) => warn!(badge = %badge, error = %e, "Failed to request scan"),
            }
        }
        if !pass.requested.is_empty() {
            debug!(count = pass.requested.len(), "Requested scans");
        }
        Ok(pass)
    }

    /// Time to sleep after `pass`: until the next deadline, bounded below by
    /// [`MIN_SLEEP`] and above by one scan interval
    pub fn sleep_after(&self, pass: &Pass, now: DateTime<Utc>) -> Duration {
        let interval = self.registry.scan_interval().max(MIN_SLEEP);
        match pass.next_deadline {
            Some(deadline) => (deadline - now)
                .to_std()
                .unwrap_or(MIN_SLEEP)
                .clamp(MIN_SLEEP, interval),
            None => interval,
        }
    }

    pub async fn run(self) {
        info!("Scan scheduler started");
        loop {
            let now = Utc::now();
            let pass = match self.pass(now) {
                Ok(pass) => pass,
                Err(_) => {
                    warn!("Bus disconnected, stopping scan scheduler");
                    break;
                }
            };

            // A new badge may cut the nap short, but never the first MIN_SLEEP of it
            let nap = self.sleep_after(&pass, now);
            tokio::time::sleep(MIN_SLEEP).await;
            tokio::select! {
                _ = tokio::time::sleep(nap.saturating_sub(MIN_SLEEP)) => {}
                _ = self.registry.badge_added() => {}
            }
        }
    }
}

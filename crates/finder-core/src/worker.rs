//! Submission worker: drains the queue and talks to the resolver.
//!
//! Runs on its own task so a slow or failing resolver never holds up scan
//! scheduling or fingerprint accumulation. Submissions are strictly one at
//! a time, which also keeps the load on the resolver bounded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{Resolver, Submission};
use crate::broadcast::LocationChange;
use crate::learn::LearnGroupManager;
use crate::models::{BadgeId, LOC_UNKNOWN};
use crate::queue::SubmissionQueue;
use crate::registry::BadgeRegistry;

/// How long the worker waits for work before checking the queue again
pub const IDLE_BACKOFF: Duration = Duration::from_millis(100);

pub struct Worker<R> {
    registry: Arc<BadgeRegistry>,
    queue: Arc<SubmissionQueue>,
    learn: Arc<LearnGroupManager>,
    resolver: R,
    group: String,
    changes: mpsc::UnboundedSender<LocationChange>,
}

impl<R: Resolver> Worker<R> {
    pub fn new(
        registry: Arc<BadgeRegistry>,
        queue: Arc<SubmissionQueue>,
        learn: Arc<LearnGroupManager>,
        resolver: R,
        group: impl Into<String>,
        changes: mpsc::UnboundedSender<LocationChange>,
    ) -> Self {
        Self {
            registry,
            queue,
            learn,
            resolver,
            group: group.into(),
            changes,
        }
    }

    /// Process submissions until the change stream's consumer goes away
    pub async fn run(self) {
        info!("Submission worker started");
        while !self.changes.is_closed() {
            let Some(id) = self.queue.pop(IDLE_BACKOFF).await else {
                continue;
            };

            if let Some(change) = self.process(id).await {
                if self.changes.send(change).is_err() {
                    debug!(badge = %id, "Change stream closed, dropping location change");
                }
            }
        }
        info!("Submission worker stopped");
    }

    /// Submit one badge's completed scan. Returns the location change, if any.
    ///
    /// Failures are logged and the scan is dropped; the badge is picked up
    /// again on its next scan round.
    pub async fn process(&self, id: BadgeId) -> Option<LocationChange> {
        // Take the scan and release the queue slot together, before the
        // resolver call, so a scan finishing mid-call can queue again.
        let taken = self.registry.update(id, |badge| {
            badge.in_submission_queue = false;
            (std::mem::take(&mut badge.pending_fingerprint), badge.last_scan_time)
        });
        let Some((readings, scanned_at)) = taken else {
            warn!(badge = %id, "Dequeued unknown badge");
            return None;
        };
        if readings.is_empty() {
            debug!(badge = %id, "Nothing to submit");
            return None;
        }

        let submission = Submission::new(id, &self.group, scanned_at, readings);

        if let Some(label) = self.learn.learn_label_for(id) {
            let submission = submission.with_location(label.as_str());
            match self.resolver.learn(&submission).await {
                Ok(()) => debug!(badge = %id, location = %label, "Learn submission accepted"),
                Err(e) => warn!(badge = %id, location = %label, error = %e, "Learn submission failed"),
            }
            return None;
        }

        match self.resolver.track(&submission).await {
            Ok(response) => {
                let location = response.location.unwrap_or_else(|| LOC_UNKNOWN.to_string());
                self.apply_location(id, location)
            }
            Err(e) => {
                warn!(badge = %id, error = %e, "Track submission failed");
                None
            }
        }
    }

    fn apply_location(&self, id: BadgeId, location: String) -> Option<LocationChange> {
        let previous = self
            .registry
            .update(id, |badge| {
                if badge.is_at(&location) {
                    None
                } else {
                    Some(badge.last_known_location.replace(location.clone()))
                }
            })
            .flatten()?;

        debug!(badge = %id, location = %location, ?previous, "Badge moved");
        Some(LocationChange {
            badge: id,
            location,
            previous,
        })
    }
}

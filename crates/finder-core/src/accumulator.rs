//! Buffers chunked fingerprint reports until a scan completes.
//!
//! A full scan does not fit in one badge message, so it arrives as several
//! non-empty chunks followed by an empty report marking the end of the scan.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use crate::models::{BadgeId, Reading};
use crate::queue::{EnqueueOutcome, SubmissionQueue};
use crate::registry::BadgeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk appended; total readings now pending
    Buffered(usize),
    /// Scan complete, badge handed to the submission queue
    Submitted,
    /// Scan complete but the badge is already waiting for submission
    AlreadyQueued,
    /// Terminator with no readings buffered
    Empty,
}

pub struct ScanAccumulator {
    registry: Arc<BadgeRegistry>,
    queue: Arc<SubmissionQueue>,
}

impl ScanAccumulator {
    pub fn new(registry: Arc<BadgeRegistry>, queue: Arc<SubmissionQueue>) -> Self {
        Self { registry, queue }
    }

    /// Handle one radio report from a badge. Unknown badges are registered first.
    pub fn add_fingerprint(&self, id: BadgeId, readings: Vec<Reading>) -> ChunkOutcome {
        self.registry.upsert(id);

        if !readings.is_empty() {
            let chunk_len = readings.len();
            let pending = self
                .registry
                .update(id, |badge| {
                    badge.pending_fingerprint.extend(readings);
                    badge.last_scan_time = Utc::now();
                    badge.pending_fingerprint.len()
                })
                .unwrap_or(0);
            trace!(badge = %id, chunk = chunk_len, pending, "Buffered fingerprint chunk");
            return ChunkOutcome::Buffered(pending);
        }

        match self.queue.enqueue(id) {
            EnqueueOutcome::Queued => {
                debug!(badge = %id, "Scan complete, queued for submission");
                ChunkOutcome::Submitted
            }
            EnqueueOutcome::AlreadyQueued => ChunkOutcome::AlreadyQueued,
            EnqueueOutcome::NothingPending | EnqueueOutcome::UnknownBadge => {
                debug!(badge = %id, "Scan terminator with nothing buffered");
                ChunkOutcome::Empty
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup() -> (Arc<BadgeRegistry>, Arc<SubmissionQueue>, ScanAccumulator) {
        let registry = Arc::new(BadgeRegistry::new(Duration::from_secs(60)));
        let queue = Arc::new(SubmissionQueue::new(Arc::clone(&registry)));
        let accumulator = ScanAccumulator::new(Arc::clone(&registry), Arc::clone(&queue));
        (registry, queue, accumulator)
    }

    #[test]
    fn test_chunks_concatenate_in_arrival_order() {
        let (registry, queue, accumulator) = setup();
        let id = BadgeId(42);

        let first = vec![Reading::new("AA:BB:CC:00:11:22", -40)];
        let second = vec![Reading::new("AA:BB:CC:00:11:23", -55)];

        assert_eq!(accumulator.add_fingerprint(id, first), ChunkOutcome::Buffered(1));
        assert_eq!(accumulator.add_fingerprint(id, second), ChunkOutcome::Buffered(2));
        assert!(queue.is_empty());

        assert_eq!(accumulator.add_fingerprint(id, vec![]), ChunkOutcome::Submitted);
        assert_eq!(queue.try_pop(), Some(id));

        let badge = registry.get(id).expect("badge registered");
        let macs: Vec<&str> = badge.pending_fingerprint.iter().map(|r| r.mac.as_str()).collect();
        assert_eq!(macs, vec!["AA:BB:CC:00:11:22", "AA:BB:CC:00:11:23"]);
        assert!(badge.in_submission_queue);
    }

    #[test]
    fn test_chunk_updates_last_scan_time() {
        let (registry, _queue, accumulator) = setup();
        let id = BadgeId(1);
        registry.upsert(id);
        registry.update(id, |b| b.last_scan_time = Utc::now() - chrono::Duration::hours(1));

        let before = Utc::now();
        accumulator.add_fingerprint(id, vec![Reading::new("AA:BB:CC:00:11:22", -60)]);
        let badge = registry.get(id).expect("badge");
        assert!(badge.last_scan_time >= before);
    }

    #[test]
    fn test_duplicate_terminator_is_idempotent() {
        let (_registry, queue, accumulator) = setup();
        let id = BadgeId(7);
        accumulator.add_fingerprint(id, vec![Reading::new("AA:BB:CC:00:11:22", -40)]);

        assert_eq!(accumulator.add_fingerprint(id, vec![]), ChunkOutcome::Submitted);
        assert_eq!(accumulator.add_fingerprint(id, vec![]), ChunkOutcome::AlreadyQueued);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_terminator_without_chunks_submits_nothing() {
        let (registry, queue, accumulator) = setup();
        assert_eq!(accumulator.add_fingerprint(BadgeId(3), vec![]), ChunkOutcome::Empty);
        assert!(queue.is_empty());
        // Still registered as a sighting
        assert!(registry.contains(BadgeId(3)));
    }
}

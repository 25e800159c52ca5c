//! FIFO work queue of badges with a completed scan awaiting submission.
//!
//! The badge's `in_submission_queue` flag is the uniqueness guard: a badge
//! is admitted only while the flag is clear, and the flag is set in the same
//! critical section that admits it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use crate::models::BadgeId;
use crate::registry::BadgeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    AlreadyQueued,
    /// Completed scan carried no readings
    NothingPending,
    UnknownBadge,
}

pub struct SubmissionQueue {
    registry: Arc<BadgeRegistry>,
    entries: Mutex<VecDeque<BadgeId>>,
    ready: Notify,
}

impl SubmissionQueue {
    pub fn new(registry: Arc<BadgeRegistry>) -> Self {
        Self {
            registry,
            entries: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<BadgeId>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, id: BadgeId) -> EnqueueOutcome {
        let outcome = self
            .registry
            .update(id, |badge| {
                if badge.in_submission_queue {
                    EnqueueOutcome::AlreadyQueued
                } else if badge.pending_fingerprint.is_empty() {
                    EnqueueOutcome::NothingPending
                } else {
                    badge.in_submission_queue = true;
                    EnqueueOutcome::Queued
                }
            })
            .unwrap_or(EnqueueOutcome::UnknownBadge);

        if outcome == EnqueueOutcome::Queued {
            self.entries().push_back(id);
            self.ready.notify_one();
        }
        outcome
    }

    pub fn try_pop(&self) -> Option<BadgeId> {
        self.entries().pop_front()
    }

    /// Pop the head of the queue, waiting at most `idle` for work to arrive.
    pub async fn pop(&self, idle: Duration) -> Option<BadgeId> {
        if let Some(id) = self.try_pop() {
            return Some(id);
        }
        let _ = tokio::time::timeout(idle, self.ready.notified()).await;
        self.try_pop()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

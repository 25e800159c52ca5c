//! Authoritative per-badge presence state.
//!
//! All reads hand out clones and all writes go through [`BadgeRegistry::update`],
//! so the map lock is never held across an await point.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::Notify;
use tracing::debug;

use crate::models::{Badge, BadgeId};

pub struct BadgeRegistry {
    badges: Mutex<HashMap<BadgeId, Badge>>,
    scan_interval: Duration,
    added: Notify,
}

impl BadgeRegistry {
    pub fn new(scan_interval: Duration) -> Self {
        Self {
            badges: Mutex::new(HashMap::new()),
            scan_interval,
            added: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BadgeId, Badge>> {
        self.badges.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    /// Create the badge if it is not known yet. Returns true if it was created.
    ///
    /// New badges get a last scan time somewhere within the past scan interval,
    /// spreading their first scan requests instead of asking everyone at once.
    pub fn upsert(&self, id: BadgeId) -> bool {
        let created = {
            let mut badges = self.lock();
            if badges.contains_key(&id) {
                false
            } else {
                let interval_ms = self.scan_interval.as_millis() as i64;
                let jitter_ms = rand::thread_rng().gen_range(0..=interval_ms);
                let last_scan_time = Utc::now() - chrono::Duration::milliseconds(jitter_ms);
                badges.insert(id, Badge::new(id, last_scan_time));
                true
            }
        };

        if created {
            debug!(badge = %id, "New badge registered");
            self.added.notify_one();
        }
        created
    }

    pub fn get(&self, id: BadgeId) -> Option<Badge> {
        self.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: BadgeId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Snapshot of all badges. Inserts made while the caller iterates are
    /// picked up by the next call.
    pub fn all(&self) -> impl Iterator<Item = Badge> {
        let snapshot: Vec<Badge> = self.lock().values().cloned().collect();
        snapshot.into_iter()
    }

    /// Mutate a badge under the registry lock. Returns None if the badge is unknown.
    pub fn update<T>(&self, id: BadgeId, f: impl FnOnce(&mut Badge) -> T) -> Option<T> {
        self.lock().get_mut(&id).map(f)
    }

    /// Number of badges whose last known location is `location`
    pub fn count_at(&self, location: &str) -> usize {
        self.lock().values().filter(|b| b.is_at(location)).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Resolves once a badge has been created since the last wait
    pub async fn badge_added(&self) {
        self.added.notified().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BadgeRegistry {
        BadgeRegistry::new(Duration::from_secs(60))
    }

    #[test]
    fn test_upsert_creates_once() {
        let registry = registry();
        assert!(registry.upsert(BadgeId(1)));
        assert!(!registry.upsert(BadgeId(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_upsert_jitters_last_scan_within_interval() {
        let registry = registry();
        let before = Utc::now();
        for id in 0..50 {
            registry.upsert(BadgeId(id));
        }
        let after = Utc::now();

        for badge in registry.all() {
            assert!(badge.last_scan_time <= after);
            assert!(badge.last_scan_time >= before - chrono::Duration::seconds(60));
            assert!(!badge.in_submission_queue);
            assert!(badge.last_known_location.is_none());
        }
    }

    #[test]
    fn test_upsert_does_not_reset_existing_state() {
        let registry = registry();
        registry.upsert(BadgeId(3));
        registry.update(BadgeId(3), |b| b.last_known_location = Some("arcade".to_string()));
        registry.upsert(BadgeId(3));
        assert_eq!(
            registry.get(BadgeId(3)).and_then(|b| b.last_known_location),
            Some("arcade".to_string())
        );
    }

    #[test]
    fn test_get_unknown_badge() {
        assert!(registry().get(BadgeId(99)).is_none());
        assert!(registry().update(BadgeId(99), |b| b.id).is_none());
    }

    #[test]
    fn test_all_tolerates_insert_during_iteration() {
        let registry = registry();
        registry.upsert(BadgeId(1));
        registry.upsert(BadgeId(2));

        let mut seen = 0;
        for badge in registry.all() {
            registry.upsert(BadgeId(badge.id.0 + 100));
            seen += 1;
        }
        assert_eq!(seen, 2);
        assert_eq!(registry.all().count(), 4);
    }

    #[test]
    fn test_count_at() {
        let registry = registry();
        for id in 1..=4 {
            registry.upsert(BadgeId(id));
        }
        registry.update(BadgeId(1), |b| b.last_known_location = Some("panels1".to_string()));
        registry.update(BadgeId(2), |b| b.last_known_location = Some("panels1".to_string()));
        registry.update(BadgeId(3), |b| b.last_known_location = Some("arcade".to_string()));

        assert_eq!(registry.count_at("panels1"), 2);
        assert_eq!(registry.count_at("arcade"), 1);
        assert_eq!(registry.count_at("lan"), 0);
    }

    #[tokio::test]
    async fn test_badge_added_wakes_after_upsert() {
        let registry = registry();
        registry.upsert(BadgeId(5));
        // Permit stored even though nobody was waiting yet
        tokio::time::timeout(Duration::from_secs(1), registry.badge_added())
            .await
            .expect("wake after new badge");
    }
}

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::normalize_location;

/// Externally assigned badge identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeId(pub u32);

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for BadgeId {
    fn from(id: u32) -> Self {
        BadgeId(id)
    }
}

/// A single access point observation: BSSID and signal strength in dBm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub mac: String,
    pub rssi: i32,
}

impl Reading {
    pub fn new(mac: impl Into<String>, rssi: i32) -> Self {
        Self {
            mac: mac.into(),
            rssi,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Badge {
    pub id: BadgeId,
    /// Readings accumulated since the last submission, in arrival order
    pub pending_fingerprint: Vec<Reading>,
    pub last_scan_time: DateTime<Utc>,
    pub last_known_location: Option<String>,
    pub in_submission_queue: bool,
}

impl Badge {
    pub fn new(id: BadgeId, last_scan_time: DateTime<Utc>) -> Self {
        Self {
            id,
            pending_fingerprint: Vec::new(),
            last_scan_time,
            last_known_location: None,
            in_submission_queue: false,
        }
    }

    /// When this badge should next be asked to scan
    pub fn scan_deadline(&self, scan_interval: Duration) -> DateTime<Utc> {
        self.last_scan_time + scan_interval
    }

    /// Whether the badge was last seen at `location`, comparing normalized ids
    pub fn is_at(&self, location: &str) -> bool {
        self.last_known_location
            .as_deref()
            .is_some_and(|known| normalize_location(known) == normalize_location(location))
    }
}

/// Learn-mode membership. Exists only while the badge is joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnBadge {
    pub id: BadgeId,
    pub group: Option<usize>,
}

impl LearnBadge {
    pub fn new(id: BadgeId) -> Self {
        Self { id, group: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_id_serializes_as_number() {
        let json = serde_json::to_string(&BadgeId(42)).expect("serialize");
        assert_eq!(json, "42");
        let back: BadgeId = serde_json::from_str("7").expect("deserialize");
        assert_eq!(back, BadgeId(7));
    }

    #[test]
    fn test_scan_deadline() {
        let now = Utc::now();
        let badge = Badge::new(BadgeId(1), now);
        assert_eq!(badge.scan_deadline(Duration::seconds(60)), now + Duration::seconds(60));
    }

    #[test]
    fn test_is_at() {
        let mut badge = Badge::new(BadgeId(1), Utc::now());
        assert!(!badge.is_at("panels1"));
        badge.last_known_location = Some("panels1".to_string());
        assert!(badge.is_at("panels1"));
        assert!(!badge.is_at("arcade"));

        badge.last_known_location = Some("Lego Room".to_string());
        assert!(badge.is_at("lego_room"));
        assert!(badge.is_at("Lego Room"));
    }
}

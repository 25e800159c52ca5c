//! Pub/sub boundary.
//!
//! The transport (and its authentication handshake) lives outside this
//! crate; it is reached through the [`Bus`] trait. Inbound traffic is
//! delivered to the tracker as [`Inbound`] values.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{BadgeId, Reading};

/// Tag attached to location updates so subscribers know who resolved them
pub const LOCATION_SOURCE: &str = "find";

#[derive(Error, Debug)]
pub enum BusError {
    #[error("Bus disconnected")]
    Disconnected,

    #[error("Call to {procedure} failed: {message}")]
    CallFailed { procedure: String, message: String },

    #[error("Malformed reply from {procedure}: {message}")]
    MalformedReply { procedure: String, message: String },
}

/// Topic names used on the bus
pub mod topics {
    use crate::models::BadgeId;

    pub const GAME_REGISTER: &str = "game.register";
    pub const BADGE_ROSTER: &str = "badge.list";

    pub fn scan_request(badge: BadgeId) -> String {
        format!("badge.{}.scan_request", badge)
    }

    pub fn lights(badge: BadgeId) -> String {
        format!("badge.{}.lights_static", badge)
    }

    pub fn location(badge: BadgeId) -> String {
        format!("badge.{}.location", badge)
    }

    pub fn occupancy(location: &str) -> String {
        format!("location.{}.occupancy", location)
    }
}

/// Events and procedure invocations arriving from the bus
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// One chunk of a fingerprint scan; empty readings end the scan
    Scan {
        badge_id: BadgeId,
        #[serde(default)]
        readings: Vec<Reading>,
    },
    PlayerJoin { badge_id: BadgeId },
    PlayerLeave { badge_id: BadgeId },
    NewBadge { badge_id: BadgeId },
    RequestRegister,
    Call {
        id: u64,
        #[serde(flatten)]
        procedure: Procedure,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "procedure", rename_all = "snake_case")]
pub enum Procedure {
    CreateGroup { label: String },
    SetGroupLabel { index: usize, label: String },
    AssignBadgeGroup { badge_id: BadgeId, group: Option<usize> },
    ListGroups,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameRegistration {
    pub game_id: String,
    pub sequence: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegistrationReply {
    #[serde(default)]
    pub error: Option<String>,
    /// Players already in the game, replayed through the join handler
    #[serde(default)]
    pub players: Vec<BadgeId>,
}

/// Connection to the pub/sub bus.
///
/// `publish` and `reply` must not block; transports queue the message and
/// report `Disconnected` once the connection is gone.
pub trait Bus: Send + Sync + 'static {
    fn publish(&self, topic: &str, args: Value) -> Result<(), BusError>;

    /// Answer an inbound procedure call
    fn reply(&self, call_id: u64, result: Value) -> Result<(), BusError>;

    /// Register this game with the game directory
    fn register_game(
        &self,
        registration: &GameRegistration,
    ) -> impl Future<Output = Result<RegistrationReply, BusError>> + Send;

    /// Badges currently known to the badge directory
    fn fetch_roster(&self) -> impl Future<Output = Result<Vec<BadgeId>, BusError>> + Send;

    fn request_scan(&self, badge: BadgeId) -> Result<(), BusError> {
        self.publish(&topics::scan_request(badge), json!([]))
    }

    fn publish_lights(&self, badge: BadgeId, lights: [u32; 4]) -> Result<(), BusError> {
        self.publish(&topics::lights(badge), json!(lights))
    }

    fn publish_location(&self, badge: BadgeId, location: &str) -> Result<(), BusError> {
        self.publish(&topics::location(badge), json!([location, LOCATION_SOURCE]))
    }

    fn publish_occupancy(&self, location: &str, count: usize) -> Result<(), BusError> {
        self.publish(&topics::occupancy(location), json!([count]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_event() {
        let inbound: Inbound = serde_json::from_str(
            r#"{"type":"scan","badge_id":42,"readings":[{"mac":"AA:BB:CC:00:11:22","rssi":-40}]}"#,
        )
        .expect("parse scan");
        assert_eq!(
            inbound,
            Inbound::Scan {
                badge_id: BadgeId(42),
                readings: vec![Reading::new("AA:BB:CC:00:11:22", -40)],
            }
        );

        let terminator: Inbound =
            serde_json::from_str(r#"{"type":"scan","badge_id":42}"#).expect("parse terminator");
        assert_eq!(
            terminator,
            Inbound::Scan {
                badge_id: BadgeId(42),
                readings: vec![],
            }
        );
    }

    #[test]
    fn test_parse_procedure_call() {
        let inbound: Inbound = serde_json::from_str(
            r#"{"type":"call","id":7,"procedure":"set_group_label","index":5,"label":"arcade"}"#,
        )
        .expect("parse call");
        assert_eq!(
            inbound,
            Inbound::Call {
                id: 7,
                procedure: Procedure::SetGroupLabel {
                    index: 5,
                    label: "arcade".to_string(),
                },
            }
        );

        let inbound: Inbound =
            serde_json::from_str(r#"{"type":"call","id":8,"procedure":"list_groups"}"#)
                .expect("parse list");
        assert!(matches!(inbound, Inbound::Call { id: 8, procedure: Procedure::ListGroups }));
    }

    #[test]
    fn test_parse_registration_reply() {
        let reply: RegistrationReply =
            serde_json::from_str(r#"{"players":[1,2]}"#).expect("parse reply");
        assert_eq!(reply.players, vec![BadgeId(1), BadgeId(2)]);
        assert!(reply.error.is_none());
    }

    #[test]
    fn test_topics() {
        assert_eq!(topics::location(BadgeId(42)), "badge.42.location");
        assert_eq!(topics::lights(BadgeId(1)), "badge.1.lights_static");
        assert_eq!(topics::occupancy("panels1"), "location.panels1.occupancy");
    }
}

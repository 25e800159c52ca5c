//! Learn mode: badges bound to ground-truth groups for resolver training.
//!
//! Groups are append-only slots addressed by index; badges reference them
//! by index, so slots are never removed. Membership lives on the
//! `LearnBadge` records and is derived when listing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{display_name, BadgeId, LearnBadge, LOCATIONS};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LearnError {
    #[error("Group {index} does not exist ({count} groups)")]
    GroupOutOfRange { index: usize, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub location: String,
    pub display: String,
    pub badges: Vec<BadgeId>,
}

/// Reply to the list-groups procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupListing {
    pub groups: Vec<GroupSummary>,
    pub locations: Vec<String>,
    pub display_locations: BTreeMap<String, String>,
    pub loose_badges: Vec<BadgeId>,
}

/// Reply to the set-group-label procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelAck {
    pub success: bool,
    pub message: String,
}

impl From<Result<(), LearnError>> for LabelAck {
    fn from(result: Result<(), LearnError>) -> Self {
        match result {
            Ok(()) => LabelAck {
                success: true,
                message: "Group location updated".to_string(),
            },
            Err(e) => LabelAck {
                success: false,
                message: e.to_string(),
            },
        }
    }
}

#[derive(Default)]
struct LearnState {
    groups: Vec<String>,
    badges: HashMap<BadgeId, LearnBadge>,
}

#[derive(Default)]
pub struct LearnGroupManager {
    state: Mutex<LearnState>,
}

impl LearnGroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LearnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a group and return its index
    pub fn create_group(&self, label: impl Into<String>) -> usize {
        let label = label.into();
        let mut state = self.lock();
        state.groups.push(label.clone());
        let index = state.groups.len() - 1;
        info!(group = index, label = %label, "Learn group created");
        index
    }

    pub fn set_group_label(&self, index: usize, label: impl Into<String>) -> Result<(), LearnError> {
        let mut state = self.lock();
        let count = state.groups.len();
        let slot = state
            .groups
            .get_mut(index)
            .ok_or(LearnError::GroupOutOfRange { index, count })?;
        *slot = label.into();
        debug!(group = index, label = %slot, "Learn group relabelled");
        Ok(())
    }

    pub fn group_count(&self) -> usize {
        self.lock().groups.len()
    }

    /// Start learn mode for a badge. Rejoining clears any previous group.
    pub fn join(&self, id: BadgeId) {
        self.lock().badges.insert(id, LearnBadge::new(id));
    }

    /// Returns true if the badge was joined
    pub fn leave(&self, id: BadgeId) -> bool {
        self.lock().badges.remove(&id).is_some()
    }

    pub fn is_joined(&self, id: BadgeId) -> bool {
        self.lock().badges.contains_key(&id)
    }

    /// Assign (or with `None`, unassign) a joined badge's group.
    ///
    /// Returns Ok(false) without changes if the badge is not joined.
    pub fn assign_badge_to_group(&self, id: BadgeId, group: Option<usize>) -> Result<bool, LearnError> {
        let mut state = self.lock();
        let count = state.groups.len();
        if let Some(index) = group {
            if index >= count {
                return Err(LearnError::GroupOutOfRange { index, count });
            }
        }

        match state.badges.get_mut(&id) {
            Some(learn_badge) => {
                learn_badge.group = group;
                debug!(badge = %id, ?group, "Badge group assigned");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The group of a joined badge; None if the badge is not joined
    pub fn group_of(&self, id: BadgeId) -> Option<Option<usize>> {
        self.lock().badges.get(&id).map(|b| b.group)
    }

    /// Ground-truth location for a badge currently in learn mode with a group
    pub fn learn_label_for(&self, id: BadgeId) -> Option<String> {
        let state = self.lock();
        let group = state.badges.get(&id)?.group?;
        state.groups.get(group).cloned()
    }

    pub fn list_groups(&self) -> GroupListing {
        let state = self.lock();

        let groups = state
            .groups
            .iter()
            .enumerate()
            .map(|(index, label)| {
                let mut badges: Vec<BadgeId> = state
                    .badges
                    .values()
                    .filter(|b| b.group == Some(index))
                    .map(|b| b.id)
                    .collect();
                badges.sort_unstable();
                GroupSummary {
                    location: label.clone(),
                    display: display_name(label)
                        .map(str::to_string)
                        .unwrap_or_else(|| label.clone()),
                    badges,
                }
            })
            .collect();

        let mut loose_badges: Vec<BadgeId> = state
            .badges
            .values()
            .filter(|b| b.group.is_none())
            .map(|b| b.id)
            .collect();
        loose_badges.sort_unstable();

        GroupListing {
            groups,
            locations: LOCATIONS.iter().map(|(id, _)| id.to_string()).collect(),
            display_locations: LOCATIONS
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            loose_badges,
        }
    }
}

//! Data models for tracked badges.
//!
//! - `BadgeId`, `Reading`: identifiers and fingerprint observations
//! - `Badge`: per-badge presence state owned by the registry
//! - `LearnBadge`: a badge that joined the game for training
//! - `location`: catalog of known location ids and display names

pub mod badge;
pub mod location;

pub use badge::{Badge, BadgeId, LearnBadge, Reading};
pub use location::{display_name, LOCATIONS, LOC_UNKNOWN};

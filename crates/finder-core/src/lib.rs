//! Core library for finder - badge presence tracking at the event.
//!
//! Badges report Wi-Fi fingerprints in chunks; completed scans are queued,
//! submitted to a FIND-style location resolver by a background worker, and
//! location changes are fanned out over the pub/sub bus together with
//! per-location occupancy counts. A learn mode binds badges to named groups
//! so the resolver can be trained.
//!
//! Data flow:
//! - `ScanAccumulator` buffers chunks until the empty terminator
//! - `SubmissionQueue` holds at most one entry per badge
//! - `Worker` calls the `Resolver` and emits `LocationChange`s
//! - `BroadcastDispatcher` publishes location and occupancy updates
//! - `ScanScheduler` asks badges to scan once their interval elapses

pub mod accumulator;
pub mod api;
pub mod broadcast;
pub mod bus;
pub mod config;
pub mod learn;
pub mod lights;
pub mod models;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod tracker;
pub mod utils;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use accumulator::{ChunkOutcome, ScanAccumulator};
pub use api::{ApiError, Resolver, ResolverClient, Submission, TrackResponse};
pub use broadcast::{BroadcastDispatcher, LocationChange};
pub use bus::{Bus, BusError, GameRegistration, Inbound, Procedure, RegistrationReply};
pub use config::Config;
pub use learn::{GroupListing, LearnError, LearnGroupManager};
pub use models::{Badge, BadgeId, LearnBadge, Reading};
pub use queue::{EnqueueOutcome, SubmissionQueue};
pub use registry::BadgeRegistry;
pub use scheduler::ScanScheduler;
pub use tracker::Tracker;
pub use worker::Worker;

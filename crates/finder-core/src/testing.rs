//! In-memory fakes for the resolver and the bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use serde_json::Value;

use crate::api::{ApiError, Resolver, Submission, TrackResponse};
use crate::bus::{Bus, BusError, GameRegistration, RegistrationReply};
use crate::models::BadgeId;
use crate::registry::BadgeRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverCall {
    Track(Submission),
    Learn(Submission),
}

enum Reply {
    Location(Option<String>),
    Status(u16),
}

struct ResolverState {
    reply: Reply,
    calls: Vec<ResolverCall>,
    flags: Vec<bool>,
}

/// Resolver that answers from a canned reply and records every call,
/// along with the badge's queue flag as seen during the call.
#[derive(Clone)]
pub struct FakeResolver {
    registry: Arc<BadgeRegistry>,
    state: Arc<Mutex<ResolverState>>,
}

impl FakeResolver {
    pub fn new(registry: Arc<BadgeRegistry>) -> Self {
        Self {
            registry,
            state: Arc::new(Mutex::new(ResolverState {
                reply: Reply::Location(None),
                calls: Vec::new(),
                flags: Vec::new(),
            })),
        }
    }

    pub fn respond_with(&self, location: Option<&str>) {
        self.state.lock().unwrap().reply = Reply::Location(location.map(str::to_string));
    }

    pub fn fail_with_status(&self, status: u16) {
        self.state.lock().unwrap().reply = Reply::Status(status);
    }

    pub fn calls(&self) -> Vec<ResolverCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn flag_during_calls(&self) -> Vec<bool> {
        self.state.lock().unwrap().flags.clone()
    }

    fn record(&self, call: ResolverCall) -> Result<Option<String>, ApiError> {
        let submission = match &call {
            ResolverCall::Track(s) | ResolverCall::Learn(s) => s,
        };
        let flag = submission
            .username
            .trim_start_matches("swadge_")
            .parse()
            .ok()
            .and_then(|id| self.registry.get(BadgeId(id)))
            .map(|b| b.in_submission_queue)
            .unwrap_or(false);

        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.flags.push(flag);
        match &state.reply {
            Reply::Location(location) => Ok(location.clone()),
            Reply::Status(code) => Err(ApiError::from_status(
                StatusCode::from_u16(*code).unwrap(),
                "fake failure",
            )),
        }
    }
}

impl Resolver for FakeResolver {
    async fn track(&self, submission: &Submission) -> Result<TrackResponse, ApiError> {
        let location = self.record(ResolverCall::Track(submission.clone()))?;
        Ok(TrackResponse { location })
    }

    async fn learn(&self, submission: &Submission) -> Result<(), ApiError> {
        self.record(ResolverCall::Learn(submission.clone())).map(|_| ())
    }
}

/// Bus that records everything published and answers directory calls
/// from canned data.
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, Value)>>,
    replies: Mutex<Vec<(u64, Value)>>,
    registrations: Mutex<Vec<GameRegistration>>,
    registration_reply: Mutex<RegistrationReply>,
    roster: Mutex<Vec<BadgeId>>,
    disconnected: AtomicBool,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster(self, roster: Vec<BadgeId>) -> Self {
        *self.roster.lock().unwrap() = roster;
        self
    }

    pub fn with_registration_reply(self, reply: RegistrationReply) -> Self {
        *self.registration_reply.lock().unwrap() = reply;
        self
    }

    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_to(&self, topic: &str) -> Vec<Value> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, args)| args)
            .collect()
    }

    pub fn replies(&self) -> Vec<(u64, Value)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<GameRegistration> {
        self.registrations.lock().unwrap().clone()
    }

    fn check_connected(&self) -> Result<(), BusError> {
        if self.disconnected.load(Ordering::SeqCst) {
            Err(BusError::Disconnected)
        } else {
            Ok(())
        }
    }
}

impl Bus for RecordingBus {
    fn publish(&self, topic: &str, args: Value) -> Result<(), BusError> {
        self.check_connected()?;
        self.published.lock().unwrap().push((topic.to_string(), args));
        Ok(())
    }

    fn reply(&self, call_id: u64, result: Value) -> Result<(), BusError> {
        self.check_connected()?;
        self.replies.lock().unwrap().push((call_id, result));
        Ok(())
    }

    async fn register_game(&self, registration: &GameRegistration) -> Result<RegistrationReply, BusError> {
        self.check_connected()?;
        self.registrations.lock().unwrap().push(registration.clone());
        Ok(self.registration_reply.lock().unwrap().clone())
    }

    async fn fetch_roster(&self) -> Result<Vec<BadgeId>, BusError> {
        self.check_connected()?;
        Ok(self.roster.lock().unwrap().clone())
    }
}

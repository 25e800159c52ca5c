//! Top-level coordinator.
//!
//! `Tracker` owns the shared components, routes inbound bus traffic to
//! them, and runs the worker, scheduler and dispatcher loops until the bus
//! goes away.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::accumulator::ScanAccumulator;
use crate::api::Resolver;
use crate::broadcast::BroadcastDispatcher;
use crate::bus::{Bus, BusError, Inbound, Procedure};
use crate::config::Config;
use crate::learn::{LabelAck, LearnGroupManager};
use crate::lights::group_lights;
use crate::models::BadgeId;
use crate::queue::SubmissionQueue;
use crate::registry::BadgeRegistry;
use crate::scheduler::ScanScheduler;
use crate::worker::Worker;

pub struct Tracker<B> {
    config: Config,
    bus: Arc<B>,
    registry: Arc<BadgeRegistry>,
    queue: Arc<SubmissionQueue>,
    accumulator: ScanAccumulator,
    learn: Arc<LearnGroupManager>,
}

impl<B: Bus> Tracker<B> {
    pub fn new(config: Config, bus: Arc<B>) -> Self {
        let registry = Arc::new(BadgeRegistry::new(config.scan_interval()));
        let queue = Arc::new(SubmissionQueue::new(Arc::clone(&registry)));
        let accumulator = ScanAccumulator::new(Arc::clone(&registry), Arc::clone(&queue));

        Self {
            config,
            bus,
            registry,
            queue,
            accumulator,
            learn: Arc::new(LearnGroupManager::new()),
        }
    }

    pub fn registry(&self) -> Arc<BadgeRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn learn(&self) -> Arc<LearnGroupManager> {
        Arc::clone(&self.learn)
    }

    /// Rebuild presence from the badge roster and register with the game directory.
    /// Only a lost connection is an error.
    pub async fn bootstrap(&self) -> Result<(), BusError> {
        match self.bus.fetch_roster().await {
            Ok(roster) => {
                for id in &roster {
                    self.registry.upsert(*id);
                }
                info!(count = roster.len(), "Loaded badge roster");
            }
            Err(BusError::Disconnected) => return Err(BusError::Disconnected),
            Err(e) => warn!(error = %e, "Failed to load badge roster"),
        }
        self.register().await
    }

    /// Register with the game directory and replay players that already joined
    pub async fn register(&self) -> Result<(), BusError> {
        let reply = match self.bus.register_game(&self.config.registration()).await {
            Ok(reply) => reply,
            Err(BusError::Disconnected) => return Err(BusError::Disconnected),
            Err(e) => {
                warn!(error = %e, "Could not register game");
                return Ok(());
            }
        };

        if let Some(error) = reply.error {
            warn!(error = %error, "Game directory rejected registration");
            return Ok(());
        }

        info!(game = %self.config.game_id, players = reply.players.len(), "Game registered");
        for player in reply.players {
            self.on_player_join(player);
        }
        Ok(())
    }

    /// Route one inbound message
    pub async fn handle(&self, inbound: Inbound) -> Result<(), BusError> {
        match inbound {
            Inbound::Scan { badge_id, readings } => {
                self.accumulator.add_fingerprint(badge_id, readings);
            }
            Inbound::PlayerJoin { badge_id } => self.on_player_join(badge_id),
            Inbound::PlayerLeave { badge_id } => self.on_player_leave(badge_id),
            Inbound::NewBadge { badge_id } => {
                self.registry.upsert(badge_id);
            }
            Inbound::RequestRegister => self.register().await?,
            Inbound::Call { id, procedure } => {
                let result = self.call(procedure);
                self.bus.reply(id, result)?;
            }
        }
        Ok(())
    }

    fn on_player_join(&self, id: BadgeId) {
        info!(badge = %id, "Badge joined");
        self.registry.upsert(id);
        self.learn.join(id);
        self.update_lights(id);
    }

    fn on_player_leave(&self, id: BadgeId) {
        if self.learn.leave(id) {
            info!(badge = %id, "Badge left");
        }
    }

    /// Show a learn badge its group color. No-op for badges not in learn mode.
    fn update_lights(&self, id: BadgeId) {
        let Some(group) = self.learn.group_of(id) else {
            return;
        };
        if let Err(e) = self.bus.publish_lights(id, group_lights(group)) {
            warn!(badge = %id, error = %e, "Failed to set lights");
        }
    }

    fn call(&self, procedure: Procedure) -> Value {
        debug!(?procedure, "Procedure call");
        match procedure {
            Procedure::CreateGroup { label } => {
                let index = self.learn.create_group(label);
                json!({ "index": index })
            }
            Procedure::SetGroupLabel { index, label } => {
                let ack = LabelAck::from(self.learn.set_group_label(index, label));
                json!({ "success": ack.success, "message": ack.message })
            }
            Procedure::AssignBadgeGroup { badge_id, group } => {
                match self.learn.assign_badge_to_group(badge_id, group) {
                    Ok(true) => {
                        self.update_lights(badge_id);
                        json!({ "assigned": true })
                    }
                    Ok(false) => json!({ "assigned": false }),
                    Err(e) => {
                        warn!(badge = %badge_id, error = %e, "Cannot assign badge group");
                        json!({ "assigned": false, "message": e.to_string() })
                    }
                }
            }
            Procedure::ListGroups => match serde_json::to_value(self.learn.list_groups()) {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize group listing");
                    Value::Null
                }
            },
        }
    }

    /// Bootstrap, start the background loops, and handle inbound traffic
    /// until the bus disconnects.
    pub async fn run<R: Resolver>(self, resolver: R, mut inbound: mpsc::Receiver<Inbound>) -> Result<(), BusError> {
        self.bootstrap().await?;

        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let worker = Worker::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.queue),
            Arc::clone(&self.learn),
            resolver,
            self.config.resolver_group.clone(),
            changes_tx,
        );
        let scheduler = ScanScheduler::new(Arc::clone(&self.registry), Arc::clone(&self.bus));
        let dispatcher = BroadcastDispatcher::new(Arc::clone(&self.registry), Arc::clone(&self.bus), changes_rx);

        let handles = vec![
            tokio::spawn(worker.run()),
            tokio::spawn(scheduler.run()),
            tokio::spawn(dispatcher.run()),
        ];
        info!(badges = self.registry.len(), "Tracker running");

        while let Some(message) = inbound.recv().await {
            match self.handle(message).await {
                Ok(()) => {}
                Err(BusError::Disconnected) => break,
                Err(e) => warn!(error = %e, "Failed to handle inbound message"),
            }
        }
        info!("Bus disconnected, shutting down");

        for handle in &handles {
            handle.abort();
        }
        join_all(handles).await;
        Ok(())
    }
}

// The state-update hub: single owner of the world state and the subscriber registry.

use super::registry::{ClientRegistry, FanOut};
use super::types::{ClientId, HubError, HubEvent, HubSettings, Submission};
use crate::domain::{GameStatus, SnapshotEncoder, UpdateOutcome, WorldState};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

/// Hub state machine. Every method takes `&mut self`; the hub task is the only caller at runtime.
pub struct Hub<E: SnapshotEncoder> {
    world: WorldState,
    registry: ClientRegistry<E::Frame>,
    // Which connection last wrote each user id.
    writers: HashMap<String, ClientId>,
    encoder: E,
    rng: StdRng,
    ticks: u64,
}

impl<E: SnapshotEncoder> Hub<E> {
    pub fn new(settings: &HubSettings, encoder: E) -> Self {
        let rng = match settings.role_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(GameStatus::new(settings.beacon_uuid.clone()), encoder, rng)
    }

    pub fn with_rng(status: GameStatus, encoder: E, rng: StdRng) -> Self {
        Self {
            world: WorldState::new(status),
            registry: ClientRegistry::new(),
            writers: HashMap::new(),
            encoder,
            rng,
            ticks: 0,
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn register(&mut self, client_id: ClientId, outbound: mpsc::Sender<E::Frame>) {
        if !self.registry.insert(client_id, outbound) {
            warn!(%client_id, "client registered twice; replacing queue");
        }
        info!(%client_id, subscribers = self.registry.len(), "client joined");
    }

    /// Removes the client's queue and marks the players it last wrote as disconnected.
    /// Safe to call for clients that were already evicted.
    pub fn unregister(&mut self, client_id: ClientId) -> bool {
        let removed = self.registry.remove(client_id);

        let mut orphaned = Vec::new();
        self.writers.retain(|user_id, writer| {
            if *writer == client_id {
                orphaned.push(user_id.clone());
                false
            } else {
                true
            }
        });
        for user_id in &orphaned {
            self.world.set_connected(user_id, false);
        }

        info!(
            %client_id,
            removed,
            players_disconnected = orphaned.len(),
            subscribers = self.registry.len(),
            "client left"
        );
        removed
    }

    /// Merges one update into the world. Nothing is published here; that is the tick's job.
    pub fn apply(&mut self, submission: Submission) -> UpdateOutcome {
        let Submission { client_id, update } = submission;
        let outcome = self.world.apply_location(&update, &mut self.rng);

        if let Some(previous) = self.writers.insert(update.user_id.clone(), client_id) {
            if previous != client_id {
                debug!(user_id = %update.user_id, %previous, %client_id, "player taken over by another connection");
            }
        }
        if let UpdateOutcome::Spawned(role) = outcome {
            info!(user_id = %update.user_id, ?role, %client_id, "player added");
        }
        outcome
    }

    /// Encodes the world once and offers it to every subscriber.
    /// Returns `None` if encoding failed; the registry is left untouched in that case.
    pub fn publish(&mut self) -> Option<FanOut> {
        self.ticks += 1;
        let frame = match self.encoder.encode(&self.world) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, tick = self.ticks, "failed to encode world snapshot");
                return None;
            }
        };

        let report = self.registry.fan_out(&frame);
        trace!(
            tick = self.ticks,
            delivered = report.delivered,
            players = self.world.players().len(),
            "snapshot published"
        );
        Some(report)
    }
}

/// Cloneable entry point used by connection adapters.
pub struct HubHandle<F> {
    event_tx: mpsc::Sender<HubEvent<F>>,
    client_queue_capacity: usize,
}

impl<F> Clone for HubHandle<F> {
    fn clone(&self) -> Self {
        Self {
            event_tx: self.event_tx.clone(),
            client_queue_capacity: self.client_queue_capacity,
        }
    }
}

impl<F: Send + 'static> HubHandle<F> {
    /// Creates the client's bounded outbound queue and hands the sending side to the hub.
    pub async fn register(&self, client_id: ClientId) -> Result<mpsc::Receiver<F>, HubError> {
        let (outbound, outbound_rx) = mpsc::channel(self.client_queue_capacity);
        self.send(HubEvent::Joined {
            client_id,
            outbound,
        })
        .await?;
        Ok(outbound_rx)
    }

    pub async fn unregister(&self, client_id: ClientId) -> Result<(), HubError> {
        self.send(HubEvent::Left { client_id }).await
    }

    /// Waits for queue space when the hub is behind, pushing back on the caller.
    pub async fn submit(&self, submission: Submission) -> Result<(), HubError> {
        self.send(HubEvent::Update(submission)).await
    }

    async fn send(&self, event: HubEvent<F>) -> Result<(), HubError> {
        self.event_tx.send(event).await.map_err(|_| HubError::Closed)
    }
}

/// Spawns the hub task and returns a handle to it.
pub fn spawn_hub<E: SnapshotEncoder>(settings: HubSettings, encoder: E) -> HubHandle<E::Frame> {
    let (event_tx, event_rx) = mpsc::channel(settings.event_channel_capacity);

    let hub = Hub::new(&settings, encoder);
    tokio::spawn(hub_task(hub, event_rx, settings.tick_interval));

    HubHandle {
        event_tx,
        client_queue_capacity: settings.client_queue_capacity,
    }
}

/// Processes one event at a time from the event queue and the ticker. Events are handled in
/// the order they were queued. Exits once every handle has been dropped.
pub async fn hub_task<E: SnapshotEncoder>(
    mut hub: Hub<E>,
    mut event_rx: mpsc::Receiver<HubEvent<E::Frame>>,
    tick_interval: Duration,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(HubEvent::Joined { client_id, outbound }) => hub.register(client_id, outbound),
                Some(HubEvent::Update(submission)) => {
                    hub.apply(submission);
                }
                Some(HubEvent::Left { client_id }) => {
                    hub.unregister(client_id);
                }
                None => break,
            },
            _ = interval.tick() => {
                if let Some(report) = hub.publish() {
                    for client_id in report.evicted.iter().chain(&report.closed) {
                        debug!(%client_id, "subscriber dropped during broadcast");
                    }
                }
            }
        }
    }

    info!(ticks = hub.ticks(), "hub handles dropped; hub task exiting");
}

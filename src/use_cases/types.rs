// Use-case level inputs/outputs for the state-update hub.

use crate::domain::LocationUpdate;
use std::{fmt, time::Duration};
use tokio::sync::mpsc;

/// Identifies one connected client (one socket) for the lifetime of its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a connection can tell the hub. Joins, updates and leaves share one queue, so a
/// connection's leave is always handled after the updates it sent before leaving.
#[derive(Debug)]
pub enum HubEvent<F> {
    Joined {
        client_id: ClientId,
        outbound: mpsc::Sender<F>,
    },
    Update(Submission),
    Left {
        client_id: ClientId,
    },
}

/// A decoded update attributed to the connection it arrived on.
#[derive(Debug, Clone)]
pub struct Submission {
    pub client_id: ClientId,
    pub update: LocationUpdate,
}

/// Settings used when spawning a hub.
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Capacity of the event queue shared by all connections.
    pub event_channel_capacity: usize,
    /// Capacity of each client's outbound snapshot queue.
    pub client_queue_capacity: usize,
    /// Broadcast period.
    pub tick_interval: Duration,
    /// Beacon identifier published in every snapshot.
    pub beacon_uuid: String,
    /// Seed for role assignment; `None` draws from OS entropy.
    pub role_seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("hub task is no longer running")]
    Closed,
}

use std::{env, net::IpAddr, time::Duration};

// Runtime/server settings. Env vars are read after `.env` has been loaded.

pub fn http_host() -> IpAddr {
    env::var("HUB_SERVER_HOST")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([0, 0, 0, 0]))
}

pub fn http_port() -> u16 {
    env::var("HUB_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000)
}

/// Fixed seed for role assignment, mainly for reproducible test sessions.
pub fn role_seed() -> Option<u64> {
    env::var("HUB_ROLE_SEED")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
}

// Joins, updates and leaves from every connection share this queue.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
// Roughly 1.6s of snapshots at the broadcast rate before a client counts as stalled.
pub const CLIENT_QUEUE_CAPACITY: usize = 16;

pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

// Shared across the game; every client keeps advertising this UUID.
pub const BEACON_UUID: &str = "DD09F8AB-0B4A-4890-870D-21ACAA35277F";

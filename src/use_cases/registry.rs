// Live set of subscriber queues and the per-tick fan-out over them.

use super::types::ClientId;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Result of one fan-out pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    /// Subscribers whose queue was full; they were dropped from the registry.
    pub evicted: Vec<ClientId>,
    /// Subscribers whose receiving side was already gone.
    pub closed: Vec<ClientId>,
}

/// Owned exclusively by the hub task; every mutation happens through `&mut self`.
#[derive(Debug)]
pub struct ClientRegistry<F> {
    clients: HashMap<ClientId, mpsc::Sender<F>>,
}

impl<F: Clone> ClientRegistry<F> {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    /// Adds a subscriber. A repeated id replaces the old queue, which closes it.
    pub fn insert(&mut self, client_id: ClientId, outbound: mpsc::Sender<F>) -> bool {
        self.clients.insert(client_id, outbound).is_none()
    }

    /// Drops the subscriber's queue so its writer sees the channel close.
    pub fn remove(&mut self, client_id: ClientId) -> bool {
        self.clients.remove(&client_id).is_some()
    }

    /// Offers `frame` to every subscriber exactly once without waiting on any of them.
    /// Full or closed queues are removed in the same pass.
    pub fn fan_out(&mut self, frame: &F) -> FanOut {
        let mut report = FanOut::default();
        self.clients
            .retain(|&client_id, outbound| match outbound.try_send(frame.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(%client_id, "subscriber queue full; disconnecting");
                    report.evicted.push(client_id);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%client_id, "subscriber queue closed; removing");
                    report.closed.push(client_id);
                    false
                }
            });
        report
    }
}

impl<F: Clone> Default for ClientRegistry<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_reaches_every_subscriber_once() {
        let mut registry = ClientRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        registry.insert(ClientId(1), tx_a);
        registry.insert(ClientId(2), tx_b);

        let report = registry.fan_out(&"snapshot");

        assert_eq!(report.delivered, 2);
        assert_eq!(rx_a.try_recv(), Ok("snapshot"));
        assert_eq!(rx_b.try_recv(), Ok("snapshot"));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn full_queue_is_evicted_without_blocking_others() {
        let mut registry = ClientRegistry::new();
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(8);
        registry.insert(ClientId(1), slow_tx);
        registry.insert(ClientId(2), fast_tx);

        let first = registry.fan_out(&1u32);
        assert_eq!(first.delivered, 2);
        assert!(first.evicted.is_empty());

        // The slow subscriber never drains, so the second frame overflows its queue.
        let second = registry.fan_out(&2u32);
        assert_eq!(second.delivered, 1);
        assert_eq!(second.evicted, vec![ClientId(1)]);
        assert!(!registry.contains(ClientId(1)));
        assert!(registry.contains(ClientId(2)));

        let third = registry.fan_out(&3u32);
        assert_eq!(third.delivered, 1);

        assert_eq!(fast_rx.try_recv(), Ok(1));
        assert_eq!(fast_rx.try_recv(), Ok(2));
        assert_eq!(fast_rx.try_recv(), Ok(3));

        // The evicted queue keeps what it had and then reports the channel as closed.
        assert_eq!(slow_rx.try_recv(), Ok(1));
        assert_eq!(
            slow_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
    }

    #[test]
    fn closed_receiver_is_removed() {
        let mut registry = ClientRegistry::new();
        let (tx, rx) = mpsc::channel::<u8>(1);
        registry.insert(ClientId(9), tx);
        drop(rx);

        let report = registry.fan_out(&0);

        assert_eq!(report.closed, vec![ClientId(9)]);
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_closes_queue() {
        let mut registry = ClientRegistry::new();
        let (tx, mut rx) = mpsc::channel::<u8>(1);
        registry.insert(ClientId(3), tx);

        assert!(registry.remove(ClientId(3)));
        assert!(!registry.remove(ClientId(3)));
        assert_eq!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected));
        assert_eq!(registry.fan_out(&1).delivered, 0);
    }
}

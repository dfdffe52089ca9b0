// Ports the hub depends on, implemented by outer layers.

use super::state::WorldState;

/// Turns the world state into a frame that can be handed to every subscriber.
///
/// The hub encodes once per tick and clones the frame per subscriber, so `Frame` should be cheap
/// to clone (shared bytes, `Arc`, ...).
pub trait SnapshotEncoder: Send + 'static {
    type Frame: Clone + Send + 'static;
    type Error: std::fmt::Display;

    fn encode(&self, world: &WorldState) -> Result<Self::Frame, Self::Error>;
}

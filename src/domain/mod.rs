// Domain layer: world state and the rules for changing it.

pub mod ports;
pub mod state;
pub mod update;

pub use ports::SnapshotEncoder;
pub use state::{GameStatus, PlayerState, PowerUps, Role, WorldState};
pub use update::{Action, LocationUpdate, UpdateOutcome};

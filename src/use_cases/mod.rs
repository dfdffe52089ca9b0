// Use cases layer: the hub that serializes every change to the shared world.

pub mod hub;
pub mod registry;
pub mod types;

pub use hub::{Hub, HubHandle, spawn_hub};
pub use registry::{ClientRegistry, FanOut};
pub use types::{ClientId, HubError, HubEvent, HubSettings, Submission};

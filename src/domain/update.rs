// Update requests and the merge policy applied to the world state.

use super::state::{PlayerState, Role, WorldState};
use rand::Rng;

/// Actions a client may request. Only location updates exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    UpdateOwnLocation,
}

impl Action {
    pub const UPDATE_OWN_LOCATION: &'static str = "updateOwnLocation";

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            Self::UPDATE_OWN_LOCATION => Some(Action::UpdateOwnLocation),
            _ => None,
        }
    }
}

/// A validated request to move a player.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Existing player moved.
    Moved,
    /// First update for this user id; the player was created with this role.
    Spawned(Role),
}

impl WorldState {
    /// Last-write-wins per field and user id. Unknown user ids are created with a role drawn
    /// from `rng`; the role never changes afterwards.
    pub fn apply_location<R: Rng + ?Sized>(
        &mut self,
        update: &LocationUpdate,
        rng: &mut R,
    ) -> UpdateOutcome {
        if let Some(player) = self.player_mut(&update.user_id) {
            player.latitude = update.latitude;
            player.longitude = update.longitude;
            player.connected_to_server = true;
            return UpdateOutcome::Moved;
        }

        let role = Role::pick(rng);
        self.insert(PlayerState::spawn(
            update.user_id.clone(),
            update.latitude,
            update.longitude,
            role,
        ));
        UpdateOutcome::Spawned(role)
    }
}

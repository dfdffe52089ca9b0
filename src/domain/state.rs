// Domain-level world state: players, their roles and the global game status.

use rand::Rng;
use std::collections::HashMap;

/// Which side of the chase a player is on. Assigned once when the player first appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Ghost,
    Pacman,
}

impl Role {
    /// Unbiased coin flip between the two roles.
    pub fn pick<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Role::Ghost
        } else {
            Role::Pacman
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerUps {
    pub can_eat_ghost: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub user_id: String,
    pub longitude: f64,
    pub latitude: f64,
    pub role: Role,
    pub alive: bool,
    pub power_ups: PowerUps,
    // Cleared when the connection that last wrote this player goes away.
    pub connected_to_server: bool,
}

impl PlayerState {
    /// Fresh player at the given position: alive, connected, no power-ups.
    pub fn spawn(user_id: String, latitude: f64, longitude: f64, role: Role) -> Self {
        Self {
            user_id,
            longitude,
            latitude,
            role,
            alive: true,
            power_ups: PowerUps::default(),
            connected_to_server: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameStatus {
    /// Identifier every client advertises; fixed for the process lifetime.
    pub beacon_uuid: String,
    pub started: bool,
    pub time_elapsed_millis: u64,
}

impl GameStatus {
    pub fn new(beacon_uuid: impl Into<String>) -> Self {
        Self {
            beacon_uuid: beacon_uuid.into(),
            started: false,
            time_elapsed_millis: 0,
        }
    }
}

/// Authoritative world state. Players keep insertion order; `index` maps user ids to slots.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldState {
    players: Vec<PlayerState>,
    index: HashMap<String, usize>,
    status: GameStatus,
}

impl WorldState {
    pub fn new(status: GameStatus) -> Self {
        Self {
            players: Vec::new(),
            index: HashMap::new(),
            status,
        }
    }

    /// Rebuilds a world from decoded parts. Later duplicates of a user id replace earlier ones.
    pub fn from_parts(players: Vec<PlayerState>, status: GameStatus) -> Self {
        let mut world = Self::new(status);
        for player in players {
            match world.index.get(&player.user_id) {
                Some(&slot) => world.players[slot] = player,
                None => world.insert(player),
            }
        }
        world
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn status(&self) -> &GameStatus {
        &self.status
    }

    pub fn player(&self, user_id: &str) -> Option<&PlayerState> {
        self.index.get(user_id).map(|&slot| &self.players[slot])
    }

    pub(crate) fn player_mut(&mut self, user_id: &str) -> Option<&mut PlayerState> {
        let slot = *self.index.get(user_id)?;
        Some(&mut self.players[slot])
    }

    pub(crate) fn insert(&mut self, player: PlayerState) {
        self.index.insert(player.user_id.clone(), self.players.len());
        self.players.push(player);
    }

    /// Sets the liveness flag for a player. Returns false if the user id is unknown.
    pub fn set_connected(&mut self, user_id: &str, connected: bool) -> bool {
        match self.player_mut(user_id) {
            Some(player) => {
                player.connected_to_server = connected;
                true
            }
            None => false,
        }
    }
}

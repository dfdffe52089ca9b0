// Wire protocol DTOs and conversions for the public WebSocket messages.
// Keys are capitalized because existing clients expect them that way.

use crate::domain::{
    Action, GameStatus, LocationUpdate, PlayerState, PowerUps, Role, SnapshotEncoder, WorldState,
};
use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};

/// Inbound frame from a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateRequestDto {
    pub action: String,
    #[serde(rename = "UserID", default)]
    pub user_id: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("malformed update request: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("update request has no UserID")]
    MissingUserId,
    #[error("unsupported action {0:?}; only {action:?} is available", action = Action::UPDATE_OWN_LOCATION)]
    UnsupportedAction(String),
}

impl RequestError {
    /// Protocol violations end the offending connection; bad payloads only drop the request.
    pub fn closes_connection(&self) -> bool {
        matches!(self, RequestError::UnsupportedAction(_))
    }
}

impl TryFrom<UpdateRequestDto> for LocationUpdate {
    type Error = RequestError;

    fn try_from(dto: UpdateRequestDto) -> Result<Self, Self::Error> {
        match Action::parse(&dto.action) {
            Some(Action::UpdateOwnLocation) => {}
            None => return Err(RequestError::UnsupportedAction(dto.action)),
        }
        if dto.user_id.is_empty() {
            return Err(RequestError::MissingUserId);
        }
        Ok(LocationUpdate {
            user_id: dto.user_id,
            latitude: dto.latitude,
            longitude: dto.longitude,
        })
    }
}

// Just the routing key, so an unknown action is reported even when the rest of the body
// would not fit an update.
#[derive(Deserialize)]
struct ActionHeader {
    #[serde(rename = "Action")]
    action: String,
}

/// Decodes one text frame into a validated update. The action is checked before the payload.
pub fn decode_update(text: &str) -> Result<LocationUpdate, RequestError> {
    let header = serde_json::from_str::<ActionHeader>(text)?;
    if Action::parse(&header.action).is_none() {
        return Err(RequestError::UnsupportedAction(header.action));
    }
    let dto = serde_json::from_str::<UpdateRequestDto>(text)?;
    LocationUpdate::try_from(dto)
}

/// Snapshot of the world broadcast to every client on each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorldStateDto {
    pub player_states: Vec<PlayerStateDto>,
    pub game_status: GameStatusDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerStateDto {
    #[serde(rename = "UserID")]
    pub user_id: String,
    pub longitude: f64,
    pub latitude: f64,
    pub role: RoleDto,
    pub alive: bool,
    pub power_ups: PowerUpsDto,
    pub connected_to_server: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleDto {
    Ghost,
    Pacman,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerUpsDto {
    pub can_eat_ghost: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameStatusDto {
    #[serde(rename = "IBeaconUUID")]
    pub beacon_uuid: String,
    pub started: bool,
    /// Milliseconds.
    pub time_elapsed: u64,
}

impl From<&WorldState> for WorldStateDto {
    fn from(world: &WorldState) -> Self {
        Self {
            player_states: world.players().iter().map(PlayerStateDto::from).collect(),
            game_status: GameStatusDto::from(world.status()),
        }
    }
}

impl From<&PlayerState> for PlayerStateDto {
    fn from(player: &PlayerState) -> Self {
        Self {
            user_id: player.user_id.clone(),
            longitude: player.longitude,
            latitude: player.latitude,
            role: player.role.into(),
            alive: player.alive,
            power_ups: PowerUpsDto {
                can_eat_ghost: player.power_ups.can_eat_ghost,
            },
            connected_to_server: player.connected_to_server,
        }
    }
}

impl From<Role> for RoleDto {
    fn from(role: Role) -> Self {
        match role {
            Role::Ghost => RoleDto::Ghost,
            Role::Pacman => RoleDto::Pacman,
        }
    }
}

impl From<&GameStatus> for GameStatusDto {
    fn from(status: &GameStatus) -> Self {
        Self {
            beacon_uuid: status.beacon_uuid.clone(),
            started: status.started,
            time_elapsed: status.time_elapsed_millis,
        }
    }
}

// Reverse conversions, used by clients of this crate and tests to read snapshots back.

impl From<WorldStateDto> for WorldState {
    fn from(dto: WorldStateDto) -> Self {
        let players = dto.player_states.into_iter().map(PlayerState::from).collect();
        WorldState::from_parts(players, dto.game_status.into())
    }
}

impl From<PlayerStateDto> for PlayerState {
    fn from(dto: PlayerStateDto) -> Self {
        Self {
            user_id: dto.user_id,
            longitude: dto.longitude,
            latitude: dto.latitude,
            role: dto.role.into(),
            alive: dto.alive,
            power_ups: PowerUps {
                can_eat_ghost: dto.power_ups.can_eat_ghost,
            },
            connected_to_server: dto.connected_to_server,
        }
    }
}

impl From<RoleDto> for Role {
    fn from(role: RoleDto) -> Self {
        match role {
            RoleDto::Ghost => Role::Ghost,
            RoleDto::Pacman => Role::Pacman,
        }
    }
}

impl From<GameStatusDto> for GameStatus {
    fn from(dto: GameStatusDto) -> Self {
        Self {
            beacon_uuid: dto.beacon_uuid,
            started: dto.started,
            time_elapsed_millis: dto.time_elapsed,
        }
    }
}

/// Encodes snapshots as JSON text shared by every subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSnapshotEncoder;

impl SnapshotEncoder for JsonSnapshotEncoder {
    type Frame = Utf8Bytes;
    type Error = serde_json::Error;

    fn encode(&self, world: &WorldState) -> Result<Utf8Bytes, serde_json::Error> {
        let txt = serde_json::to_string(&WorldStateDto::from(world))?;
        Ok(Utf8Bytes::from(txt))
    }
}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::map::MapGeometry;
use crate::math::Vec3;
use crate::player::{PlayerId, PlayerSnapshot, Stance};
use crate::weapon::{WeaponId, WeaponTable};

// ================================================================
// Client -> Server
// ================================================================

/// Every message a client may send, tagged by its `type` field.
///
/// Payload fields are individually lenient: a field with the wrong JSON type
/// decodes as `None` instead of rejecting the whole message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    State(StateUpdateMsg),
    SetName(SetNameMsg),
    Shoot {},
    Reload {},
    SwitchWeapon(SwitchWeaponMsg),
    ThrowFlash(ThrowFlashMsg),
}

impl ClientMessage {
    /// Wire names of all client message kinds.
    pub const TYPES: &[&str] = &[
        "state",
        "set_name",
        "shoot",
        "reload",
        "switch_weapon",
        "throw_flash",
    ];
}

/// Continuous pose update, sent by the client at ~20 Hz.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdateMsg {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Vec3>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub yaw: Option<f32>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub pitch: Option<f32>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub weapon: Option<WeaponId>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub stance: Option<Stance>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetNameMsg {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchWeaponMsg {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub weapon: Option<WeaponId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrowFlashMsg {
    /// Throw strength in [0, 1]; out-of-range values are clamped server-side.
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub charge: Option<f32>,
}

/// Decode a field, mapping a type mismatch to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

// ================================================================
// Server -> Client
// ================================================================

/// Every message the server sends, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome(Box<WelcomeMsg>),
    PlayerJoin(PlayerJoinMsg),
    PlayerLeave(PlayerLeaveMsg),
    State(StateMsg),
    Shot(ShotMsg),
    Death(DeathMsg),
    FlashThrow(FlashThrowMsg),
    Flash(FlashMsg),
}

impl ServerMessage {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome(_) => "welcome",
            Self::PlayerJoin(_) => "player_join",
            Self::PlayerLeave(_) => "player_leave",
            Self::State(_) => "state",
            Self::Shot(_) => "shot",
            Self::Death(_) => "death",
            Self::FlashThrow(_) => "flash_throw",
            Self::Flash(_) => "flash",
        }
    }
}

/// Private greeting for a freshly connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeMsg {
    pub id: PlayerId,
    pub map: MapGeometry,
    pub weapons: WeaponTable,
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoinMsg {
    pub player: PlayerSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeaveMsg {
    pub id: PlayerId,
}

/// Periodic full snapshot of every player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMsg {
    pub players: Vec<PlayerSnapshot>,
}

/// Hitbox region struck by a pellet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitPart {
    Head,
    Body,
}

/// What a pellet's ray stopped on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Impact {
    Player { target_id: PlayerId, part: HitPart },
    Target { target_id: String },
    Obstacle,
}

/// One pellet's resolved path. `impact` is `null` when the ray ran out at
/// the weapon's range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotTrace {
    pub dir: Vec3,
    pub distance: f32,
    pub impact: Option<Impact>,
}

/// Confirmed hit, used by clients for hit markers and damage feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ShotHit {
    Player {
        target_id: PlayerId,
        part: HitPart,
        damage: u32,
        remaining: u32,
        distance: f32,
    },
    Target {
        target_id: String,
        distance: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotMsg {
    pub shooter_id: PlayerId,
    pub origin: Vec3,
    pub weapon: WeaponId,
    pub traces: Vec<ShotTrace>,
    pub hits: Vec<ShotHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathMsg {
    /// The player who died.
    pub id: PlayerId,
    pub killer_id: PlayerId,
}

/// Cosmetic flight start for a flash grenade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashThrowMsg {
    pub origin: Vec3,
    pub velocity: Vec3,
    pub fuse_ms: u64,
}

/// Authoritative flash detonation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashMsg {
    pub origin: Vec3,
    pub radius: f32,
}

use std::collections::{BTreeMap, HashMap};

use lanfire_core::math::Vec3;
use lanfire_core::player::{MAX_HEALTH, PlayerId, PlayerSnapshot, Stance, default_name};
use lanfire_core::weapon::{WeaponId, WeaponTable};

use crate::combat::Magazine;

/// Authoritative per-connection player record.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub stance: Stance,
    pub health: u32,
    pub weapon: WeaponId,
    pub kills: u32,
    pub deaths: u32,
    pub dead: bool,
    /// Time of the last accepted shot (ms), any weapon.
    pub(crate) last_shot_at: Option<u64>,
    /// Time of the last accepted flash throw (ms).
    pub(crate) last_flash_at: Option<u64>,
    pub(crate) magazines: HashMap<WeaponId, Magazine>,
}

impl Player {
    pub fn new(id: PlayerId, position: Vec3, weapons: &WeaponTable) -> Self {
        Self {
            id,
            name: default_name(id),
            position,
            yaw: 0.0,
            pitch: 0.0,
            stance: Stance::Standing,
            health: MAX_HEALTH,
            weapon: WeaponId::default(),
            kills: 0,
            deaths: 0,
            dead: false,
            last_shot_at: None,
            last_flash_at: None,
            magazines: full_magazines(weapons),
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            name: self.name.clone(),
            position: self.position,
            yaw: self.yaw,
            pitch: self.pitch,
            health: self.health,
            weapon: self.weapon,
            dead: self.dead,
            kills: self.kills,
            deaths: self.deaths,
            stance: self.stance,
        }
    }

    /// Rounds left in the magazine of `weapon`, if the weapon is known.
    pub fn ammo(&self, weapon: WeaponId) -> Option<u32> {
        self.magazines.get(&weapon).map(|m| m.ammo)
    }

    /// Reset for a new life at `position`. Identity, name and score survive.
    pub fn respawn(&mut self, position: Vec3, weapons: &WeaponTable) {
        self.position = position;
        self.health = MAX_HEALTH;
        self.dead = false;
        self.magazines = full_magazines(weapons);
    }
}

fn full_magazines(weapons: &WeaponTable) -> HashMap<WeaponId, Magazine> {
    weapons
        .iter()
        .map(|(id, spec)| (id, Magazine::full(spec)))
        .collect()
}

/// All connected players, keyed by id. Iteration order is id order so
/// snapshots are stable.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: BTreeMap<PlayerId, Player>,
    next_id: u64,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self {
            players: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a player with a fresh id. Ids are never reused.
    pub fn insert(&mut self, position: Vec3, weapons: &WeaponTable) -> &mut Player {
        let id = PlayerId(self.next_id);
        self.next_id += 1;
        self.players
            .entry(id)
            .or_insert_with(|| Player::new(id, position, weapons))
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn snapshots(&self) -> Vec<PlayerSnapshot> {
        self.players.values().map(Player::snapshot).collect()
    }
}

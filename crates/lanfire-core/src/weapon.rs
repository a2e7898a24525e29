use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Weapon identifier as it appears on the wire (`"rifle"`, `"shotgun"`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WeaponId {
    Pistol,
    Deagle,
    #[default]
    Rifle,
    Sniper,
    Shotgun,
}

impl WeaponId {
    pub const ALL: [WeaponId; 5] = [
        WeaponId::Pistol,
        WeaponId::Deagle,
        WeaponId::Rifle,
        WeaponId::Sniper,
        WeaponId::Shotgun,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pistol => "pistol",
            Self::Deagle => "deagle",
            Self::Rifle => "rifle",
            Self::Sniper => "sniper",
            Self::Shotgun => "shotgun",
        }
    }
}

impl fmt::Display for WeaponId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable ballistics for one weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponSpec {
    pub label: String,
    /// Damage per pellet before the headshot multiplier.
    pub damage: f32,
    /// Multiplier applied to head hits.
    pub headshot: f32,
    /// Maximum ray length in world units.
    pub range: f32,
    /// Seconds between accepted shots.
    pub fire_rate: f32,
    /// Total angular jitter in radians (applied as +/- half on yaw and pitch).
    pub spread: f32,
    pub pellets: u32,
    pub magazine: u32,
    /// Seconds for a full reload.
    pub reload_time: f32,
}

impl WeaponSpec {
    pub fn fire_interval(&self) -> Duration {
        secs_to_millis(self.fire_rate)
    }

    pub fn reload_duration(&self) -> Duration {
        secs_to_millis(self.reload_time)
    }

    /// Damage for a single pellet, rounded to whole health points.
    pub fn damage_for(&self, headshot: bool) -> u32 {
        let multiplier = if headshot { self.headshot } else { 1.0 };
        (self.damage * multiplier).round().max(0.0) as u32
    }
}

fn secs_to_millis(secs: f32) -> Duration {
    // Round to whole milliseconds so 0.35 s is 350 ms, not 349.
    Duration::from_millis((secs.max(0.0) * 1000.0).round() as u64)
}

/// The full weapon table sent to clients in the welcome message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeaponTable {
    weapons: BTreeMap<WeaponId, WeaponSpec>,
}

impl WeaponTable {
    pub fn new(weapons: BTreeMap<WeaponId, WeaponSpec>) -> Self {
        Self { weapons }
    }

    pub fn get(&self, id: WeaponId) -> Option<&WeaponSpec> {
        self.weapons.get(&id)
    }

    pub fn contains(&self, id: WeaponId) -> bool {
        self.weapons.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (WeaponId, &WeaponSpec)> {
        self.weapons.iter().map(|(&id, spec)| (id, spec))
    }

    pub fn len(&self) -> usize {
        self.weapons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weapons.is_empty()
    }
}

impl Default for WeaponTable {
    fn default() -> Self {
        let spec = |label: &str,
                    damage: f32,
                    headshot: f32,
                    range: f32,
                    fire_rate: f32,
                    spread: f32,
                    pellets: u32,
                    magazine: u32,
                    reload_time: f32| WeaponSpec {
            label: label.to_string(),
            damage,
            headshot,
            range,
            fire_rate,
            spread,
            pellets,
            magazine,
            reload_time,
        };

        let mut weapons = BTreeMap::new();
        weapons.insert(
            WeaponId::Pistol,
            spec("Pistol", 25.0, 1.6, 70.0, 0.35, 0.01, 1, 12, 1.2),
        );
        weapons.insert(
            WeaponId::Deagle,
            spec("Hand Cannon", 50.0, 2.0, 85.0, 0.5, 0.008, 1, 7, 1.7),
        );
        weapons.insert(
            WeaponId::Rifle,
            spec("Rifle", 14.0, 1.5, 90.0, 0.1, 0.02, 1, 30, 1.6),
        );
        weapons.insert(
            WeaponId::Sniper,
            spec("Sniper", 80.0, 1.5, 190.0, 1.2, 0.002, 1, 5, 2.8),
        );
        weapons.insert(
            WeaponId::Shotgun,
            spec("Shotgun", 9.0, 1.25, 35.0, 0.9, 0.15, 8, 6, 2.2),
        );
        Self { weapons }
    }
}

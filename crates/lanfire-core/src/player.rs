use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::math::Vec3;
use crate::weapon::WeaponId;

/// Maximum display name length, in characters.
pub const MAX_NAME_CHARS: usize = 16;

/// Full health for a fresh or respawned player.
pub const MAX_HEALTH: u32 = 100;

/// Connection-scoped player identifier. Allocated monotonically from 1 and
/// sent to clients as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for PlayerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u64>()
            .map(PlayerId)
            .map_err(serde::de::Error::custom)
    }
}

/// Body posture reported by the client. Echoed to other clients for
/// rendering only; hitboxes do not change with stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    #[default]
    Standing,
    Crouching,
}

/// Public view of a player, as carried by `welcome`, `player_join` and the
/// periodic `state` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub health: u32,
    pub weapon: WeaponId,
    pub dead: bool,
    pub kills: u32,
    pub deaths: u32,
    #[serde(default)]
    pub stance: Stance,
}

/// Name given to a player who has not chosen one.
pub fn default_name(id: PlayerId) -> String {
    format!("Player {id}")
}

/// Clean a client-supplied display name.
///
/// Strips ASCII control characters, collapses whitespace runs to a single
/// space, trims, and truncates to [`MAX_NAME_CHARS`]. Falls back to
/// [`default_name`] when nothing printable remains.
pub fn sanitize_name(raw: &str, id: PlayerId) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars().filter(|c| !c.is_ascii_control()) {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !cleaned.is_empty() {
            cleaned.push(' ');
        }
        pending_space = false;
        cleaned.push(c);
    }

    let truncated: String = cleaned.chars().take(MAX_NAME_CHARS).collect();
    let truncated = truncated.trim_end();
    if truncated.is_empty() {
        default_name(id)
    } else {
        truncated.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: PlayerId = PlayerId(7);

    #[test]
    fn plain_name_is_kept() {
        assert_eq!(sanitize_name("Alice", ID), "Alice");
    }

    #[test]
    fn control_characters_are_removed() {
        assert_eq!(sanitize_name("Al\u{0007}i\u{007f}ce\u{0000}", ID), "Alice");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(sanitize_name("  Big \t\t  Bob  ", ID), "Big Bob");
    }

    #[test]
    fn tabs_and_newlines_are_stripped_not_spaced() {
        // Tab and newline are control characters, so they vanish rather
        // than turning into separators.
        assert_eq!(sanitize_name("a\tb\nc", ID), "abc");
    }

    #[test]
    fn long_names_truncate_to_sixteen_chars() {
        let name = sanitize_name("abcdefghijklmnopqrstuvwxyz", ID);
        assert_eq!(name, "abcdefghijklmnop");
        assert_eq!(name.chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let name = sanitize_name("ééééééééééééééééééé", ID);
        assert_eq!(name.chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn empty_or_blank_falls_back() {
        assert_eq!(sanitize_name("", ID), "Player 7");
        assert_eq!(sanitize_name("   \u{3000}  ", ID), "Player 7");
        assert_eq!(sanitize_name("\u{0001}\u{0002}", ID), "Player 7");
    }

    #[test]
    fn player_id_is_a_string_on_the_wire() {
        assert_eq!(serde_json::to_string(&PlayerId(12)).unwrap(), "\"12\"");
        let id: PlayerId = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(id, PlayerId(12));
        assert!(serde_json::from_str::<PlayerId>("\"abc\"").is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sanitized_names_are_short_and_clean(raw in "\\PC{0,64}") {
                let name = sanitize_name(&raw, ID);
                prop_assert!(name.chars().count() <= MAX_NAME_CHARS
                    || name == default_name(ID));
                prop_assert!(!name.chars().any(|c| c.is_ascii_control()));
                prop_assert!(!name.contains("  "));
                prop_assert_eq!(name.trim(), name.as_str());
            }
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Horizontal play area. Players and detonations are clamped inside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Bounds {
    /// Clamp `p` horizontally into the bounds and vertically into `[min_y, max_y]`.
    pub fn clamp(&self, p: Vec3, min_y: f32, max_y: f32) -> Vec3 {
        Vec3::new(
            p.x.clamp(self.min_x, self.max_x),
            p.y.clamp(min_y, max_y),
            p.z.clamp(self.min_z, self.max_z),
        )
    }

    pub fn contains_xz(&self, p: Vec3) -> bool {
        (self.min_x..=self.max_x).contains(&p.x) && (self.min_z..=self.max_z).contains(&p.z)
    }
}

/// Axis-aligned box given by its two corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

/// A solid box that blocks shots and line of sight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: String,
    /// Box center.
    pub position: Vec3,
    /// Full extents along each axis.
    pub size: Vec3,
}

impl Obstacle {
    pub fn half_extents(&self) -> Vec3 {
        self.size * 0.5
    }

    pub fn aabb(&self) -> Aabb {
        let half = self.half_extents();
        Aabb {
            min: self.position - half,
            max: self.position + half,
        }
    }
}

/// A stationary practice sphere. Hits are reported but deal no damage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub position: Vec3,
    pub radius: f32,
}

/// Static level geometry, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapGeometry {
    pub bounds: Bounds,
    pub spawns: Vec<Vec3>,
    pub obstacles: Vec<Obstacle>,
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl MapGeometry {
    /// Check the invariants the simulation relies on.
    pub fn validate(&self) -> Result<(), String> {
        let b = &self.bounds;
        if !(b.min_x < b.max_x && b.min_z < b.max_z) {
            return Err("bounds must have min < max on both axes".to_string());
        }
        if self.spawns.is_empty() {
            return Err("map needs at least one spawn point".to_string());
        }
        if let Some(spawn) = self.spawns.iter().find(|s| !b.contains_xz(**s)) {
            return Err(format!(
                "spawn ({}, {}, {}) is outside the bounds",
                spawn.x, spawn.y, spawn.z
            ));
        }
        if let Some(o) = self
            .obstacles
            .iter()
            .find(|o| o.size.x < 0.0 || o.size.y < 0.0 || o.size.z < 0.0)
        {
            return Err(format!("obstacle {} has a negative size", o.id));
        }
        if let Some(t) = self.targets.iter().find(|t| t.radius <= 0.0) {
            return Err(format!("target {} needs a positive radius", t.id));
        }
        Ok(())
    }
}

impl Default for MapGeometry {
    fn default() -> Self {
        default_map()
    }
}

/// Load a map from a JSON file, returning `None` if the file is missing or invalid.
pub fn load_map_from_file(path: &str) -> Option<MapGeometry> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<MapGeometry>(&content) {
        Ok(map) => match map.validate() {
            Ok(()) => Some(map),
            Err(e) => {
                tracing::warn!("Rejected map {path}: {e}");
                None
            },
        },
        Err(e) => {
            tracing::warn!("Failed to parse {path}: {e}");
            None
        },
    }
}

/// Load the map, preferring a JSON file over the built-in layout.
///
/// Checks env var `LANFIRE_MAP` (default `config/map.json`). Falls back to
/// [`default_map`] if the file is missing or unusable.
pub fn load_map() -> MapGeometry {
    let path = std::env::var("LANFIRE_MAP").unwrap_or_else(|_| "config/map.json".to_string());
    load_map_from_file(&path).unwrap_or_else(default_map)
}

fn obstacle(id: &str, position: (f32, f32, f32), size: (f32, f32, f32)) -> Obstacle {
    Obstacle {
        id: id.to_string(),
        position: Vec3::new(position.0, position.1, position.2),
        size: Vec3::new(size.0, size.1, size.2),
    }
}

fn target(id: &str, position: (f32, f32, f32), radius: f32) -> Target {
    Target {
        id: id.to_string(),
        position: Vec3::new(position.0, position.1, position.2),
        radius,
    }
}

/// The built-in arena: crates, two walls, a pillar, a staircase up to a
/// railed platform on the west side, and six practice targets.
pub fn default_map() -> MapGeometry {
    let mut obstacles = vec![
        obstacle("crate-a", (-6.0, 1.2, -4.0), (3.0, 2.4, 3.0)),
        obstacle("crate-b", (8.0, 1.2, 6.0), (3.0, 2.4, 3.0)),
        obstacle("wall-a", (-14.0, 1.4, 10.0), (10.0, 2.8, 1.5)),
        obstacle("wall-b", (12.0, 1.4, -12.0), (10.0, 2.8, 1.5)),
        obstacle("pillar", (0.0, 1.8, -16.0), (2.8, 3.6, 2.8)),
    ];

    // Six 0.25-high steps climbing north toward the platform.
    for step in 0..6 {
        let y = 0.125 + 0.25 * step as f32;
        let z = 6.6 + 1.2 * step as f32;
        obstacles.push(obstacle(
            &format!("stairs-left-step-{}", step + 1),
            (-28.0, y, z),
            (6.0, 0.25, 1.2),
        ));
    }
    obstacles.push(obstacle(
        "stairs-left-platform",
        (-28.0, 1.65, 17.2),
        (8.0, 0.3, 8.0),
    ));
    obstacles.push(obstacle(
        "stairs-left-rail-n",
        (-28.0, 2.1, 21.1),
        (8.0, 0.9, 0.3),
    ));
    obstacles.push(obstacle(
        "stairs-left-rail-w",
        (-31.85, 2.1, 17.2),
        (0.3, 0.9, 8.0),
    ));

    MapGeometry {
        bounds: Bounds {
            min_x: -38.0,
            max_x: 38.0,
            min_z: -38.0,
            max_z: 38.0,
        },
        spawns: vec![
            Vec3::new(-20.0, 0.0, -20.0),
            Vec3::new(20.0, 0.0, -18.0),
            Vec3::new(18.0, 0.0, 20.0),
            Vec3::new(-18.0, 0.0, 22.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-8.0, 0.0, 12.0),
            Vec3::new(10.0, 0.0, -6.0),
        ],
        obstacles,
        targets: vec![
            target("target-1", (-28.0, 1.4, -10.0), 0.55),
            target("target-2", (28.0, 1.2, 12.0), 0.5),
            target("target-3", (-18.0, 1.6, 26.0), 0.5),
            target("target-4", (18.0, 1.3, -26.0), 0.5),
            target("target-5", (0.0, 2.2, 30.0), 0.45),
            target("target-6", (0.0, 1.1, -32.0), 0.5),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_is_valid() {
        let map = default_map();
        assert!(map.validate().is_ok());
        assert_eq!(map.spawns.len(), 7);
        assert_eq!(map.obstacles.len(), 14);
        assert_eq!(map.targets.len(), 6);
    }

    #[test]
    fn staircase_steps_climb() {
        let map = default_map();
        let steps: Vec<&Obstacle> = map
            .obstacles
            .iter()
            .filter(|o| o.id.starts_with("stairs-left-step-"))
            .collect();
        assert_eq!(steps.len(), 6);
        for pair in steps.windows(2) {
            assert!(pair[1].position.y > pair[0].position.y);
            assert!(pair[1].position.z > pair[0].position.z);
        }
        assert_eq!(steps[5].id, "stairs-left-step-6");
        assert!((steps[5].position.y - 1.375).abs() < 1e-6);
    }

    #[test]
    fn aabb_corners_from_center_and_size() {
        let o = obstacle("box", (1.0, 2.0, 3.0), (2.0, 4.0, 6.0));
        let aabb = o.aabb();
        assert_eq!(aabb.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn bounds_clamp_keeps_inside() {
        let map = default_map();
        let p = map.bounds.clamp(Vec3::new(100.0, -3.0, -100.0), 0.0, 5.0);
        assert_eq!(p, Vec3::new(38.0, 0.0, -38.0));
    }

    #[test]
    fn validate_rejects_empty_spawns() {
        let mut map = default_map();
        map.spawns.clear();
        assert!(map.validate().is_err());
    }

    #[test]
    fn validate_rejects_spawn_outside_bounds() {
        let mut map = default_map();
        map.spawns.push(Vec3::new(500.0, 0.0, 0.0));
        assert!(map.validate().is_err());
    }

    #[test]
    fn load_from_missing_file_returns_none() {
        assert!(load_map_from_file("/nonexistent/path/map.json").is_none());
    }

    #[test]
    fn json_uses_camel_case_bounds() {
        let json = serde_json::to_value(default_map()).unwrap();
        assert_eq!(json["bounds"]["minX"], -38.0);
        assert_eq!(json["obstacles"][0]["id"], "crate-a");
        assert_eq!(json["targets"][0]["radius"], 0.55f32 as f64);
    }

    #[test]
    fn map_file_without_targets_parses() {
        let json = r#"{
            "bounds": {"minX": -10, "maxX": 10, "minZ": -10, "maxZ": 10},
            "spawns": [{"x": 0, "y": 0, "z": 0}],
            "obstacles": []
        }"#;
        let map: MapGeometry = serde_json::from_str(json).unwrap();
        assert!(map.targets.is_empty());
        assert!(map.validate().is_ok());
    }
}

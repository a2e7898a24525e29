pub mod map;
pub mod math;
pub mod net;
pub mod player;
pub mod weapon;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::map::{Bounds, MapGeometry, Obstacle, Target};
    use crate::math::Vec3;

    /// An empty 100x100 arena with a single spawn at the origin.
    pub fn open_map() -> MapGeometry {
        MapGeometry {
            bounds: Bounds {
                min_x: -50.0,
                max_x: 50.0,
                min_z: -50.0,
                max_z: 50.0,
            },
            spawns: vec![Vec3::ZERO],
            obstacles: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Box obstacle from center and full size.
    pub fn make_obstacle(id: &str, position: Vec3, size: Vec3) -> Obstacle {
        Obstacle {
            id: id.to_string(),
            position,
            size,
        }
    }

    /// Spherical practice target.
    pub fn make_target(id: &str, position: Vec3, radius: f32) -> Target {
        Target {
            id: id.to_string(),
            position,
            radius,
        }
    }

    /// [`open_map`] plus a wall spanning x in [-5, 5], centered at `z`.
    pub fn walled_map(z: f32) -> MapGeometry {
        let mut map = open_map();
        map.obstacles.push(make_obstacle(
            "wall",
            Vec3::new(0.0, 1.5, z),
            Vec3::new(10.0, 3.0, 0.5),
        ));
        map
    }
}

use lanfire_core::map::{Bounds, Obstacle};
use lanfire_core::math::{Vec3, dir_from_yaw_pitch};

use crate::config::FlashConfig;
use crate::geometry::segment_blocked;

/// A validated throw: where it starts, how it flies and where it will go off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlashPlan {
    pub origin: Vec3,
    pub velocity: Vec3,
    pub detonation: Vec3,
}

/// Compute the flight of a flash thrown from `eye` with the given look angles.
///
/// `charge` defaults to full strength when absent and is clamped to [0, 1].
pub fn plan_throw(
    config: &FlashConfig,
    bounds: &Bounds,
    eye: Vec3,
    yaw: f32,
    pitch: f32,
    charge: Option<f32>,
) -> FlashPlan {
    let charge = charge.filter(|c| c.is_finite()).unwrap_or(1.0).clamp(0.0, 1.0);
    let speed = config.throw_speed_min + (config.throw_speed_max - config.throw_speed_min) * charge;
    let pitch = pitch.clamp(config.min_throw_pitch, config.max_throw_pitch);
    let velocity = dir_from_yaw_pitch(yaw, pitch) * speed + Vec3::Y * config.up_boost;
    let detonation = predict_detonation(config, bounds, eye, velocity);
    FlashPlan {
        origin: eye,
        velocity,
        detonation,
    }
}

/// Ballistic position after the fuse, kept inside the arena and the
/// detonation height band. Obstacles are not simulated.
pub fn predict_detonation(config: &FlashConfig, bounds: &Bounds, origin: Vec3, velocity: Vec3) -> Vec3 {
    let t = config.fuse_ms as f32 / 1000.0;
    let mut p = origin + velocity * t;
    p.y -= 0.5 * config.gravity * t * t;
    p.y = p.y.max(0.0);
    bounds.clamp(p, 0.0, config.max_height)
}

/// How strongly a detonation blinds a viewer, in [0, 1].
///
/// Falls off linearly with distance to zero at `radius` and is weighted by
/// how close the blast is to the center of view (full inside a narrow cone,
/// fading to a floor at the edge of `fov` and behind). A blast hidden behind
/// an obstacle does not blind.
pub fn blind_strength(
    eye: Vec3,
    view_dir: Vec3,
    fov: f32,
    origin: Vec3,
    radius: f32,
    obstacles: &[Obstacle],
) -> f32 {
    const PERIPHERAL_FLOOR: f32 = 0.2;

    if radius <= 0.0 {
        return 0.0;
    }
    let distance = eye.distance(origin);
    if distance >= radius || segment_blocked(eye, origin, obstacles) {
        return 0.0;
    }
    let falloff = 1.0 - distance / radius;

    let facing = match ((origin - eye).try_normalize(), view_dir.try_normalize()) {
        (Some(to_blast), Some(view)) => {
            let angle = view.dot(to_blast).clamp(-1.0, 1.0).acos();
            let half_fov = (fov * 0.5).max(f32::EPSILON);
            if angle >= half_fov {
                PERIPHERAL_FLOOR
            } else {
                PERIPHERAL_FLOOR + (1.0 - PERIPHERAL_FLOOR) * (1.0 - angle / half_fov)
            }
        },
        // Detonation at the eye.
        _ => 1.0,
    };

    (falloff * facing).clamp(0.0, 1.0)
}

use lanfire_core::map::{Aabb, Obstacle};
use lanfire_core::math::Vec3;

/// Direction components smaller than this are treated as parallel to a slab.
const PARALLEL_EPSILON: f32 = 1e-6;

/// Ray-sphere intersection for a unit direction. Returns the nearest
/// strictly positive distance, or `None` if the ray misses or the sphere is
/// entirely behind the origin.
pub fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.dot(oc) - radius * radius;
    let h = b * b - c;
    if h < 0.0 {
        return None;
    }
    let sqrt_h = h.sqrt();
    let near = -b - sqrt_h;
    if near > 0.0 {
        return Some(near);
    }
    let far = -b + sqrt_h;
    (far > 0.0).then_some(far)
}

/// Ray-box intersection (slab method).
///
/// Returns the entry distance, or the exit distance when the origin is
/// inside the box.
pub fn ray_aabb(origin: Vec3, dir: Vec3, aabb: &Aabb) -> Option<f32> {
    let mut tmin = f32::NEG_INFINITY;
    let mut tmax = f32::INFINITY;

    let axes = [
        (origin.x, dir.x, aabb.min.x, aabb.max.x),
        (origin.y, dir.y, aabb.min.y, aabb.max.y),
        (origin.z, dir.z, aabb.min.z, aabb.max.z),
    ];
    for (o, d, min, max) in axes {
        if d.abs() < PARALLEL_EPSILON {
            if o < min || o > max {
                return None;
            }
            continue;
        }

        let t1 = (min - o) / d;
        let t2 = (max - o) / d;
        tmin = tmin.max(t1.min(t2));
        tmax = tmax.min(t1.max(t2));

        if tmin > tmax {
            return None;
        }
    }

    if tmax < 0.0 {
        return None;
    }
    Some(if tmin >= 0.0 { tmin } else { tmax })
}

/// Distance to the closest obstacle along the ray, if one lies within `range`.
pub fn nearest_obstacle(
    origin: Vec3,
    dir: Vec3,
    range: f32,
    obstacles: &[Obstacle],
) -> Option<f32> {
    obstacles
        .iter()
        .filter_map(|o| ray_aabb(origin, dir, &o.aabb()))
        .filter(|&t| t <= range)
        .min_by(f32::total_cmp)
}

/// True if any obstacle cuts the segment strictly before `to`.
pub fn segment_blocked(from: Vec3, to: Vec3, obstacles: &[Obstacle]) -> bool {
    let length = from.distance(to);
    let Some(dir) = (to - from).try_normalize() else {
        return false;
    };
    nearest_obstacle(from, dir, length, obstacles).is_some_and(|t| t < length)
}

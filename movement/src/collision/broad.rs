use nalgebra as na;
use rapier3d::parry::{bounding_volume::Aabb, shape as pshape};

use super::types::{StaticShape, Transform, Vec3};

/// Broad-phase index over immutable static colliders.
///
/// Notes:
/// - Finite shapes (Cuboid, Sphere, Capsule) are stored as world-space AABBs and scanned linearly
///   to generate candidates. Levels along a curve hold few colliders, so a flat scan is enough.
/// - Planes are infinite and are always candidates.
#[derive(Clone, Debug, Default)]
pub struct WorldAccel {
    /// World-space AABBs of finite shapes.
    pub aabbs: Vec<Aabb>,
    /// Index into the source collider list for each entry of `aabbs`.
    pub non_plane_indices: Vec<usize>,
    /// Indices of planes in the source collider list.
    pub plane_indices: Vec<usize>,
}

impl WorldAccel {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.non_plane_indices.is_empty() && self.plane_indices.is_empty()
    }
}

/// Build the broad-phase index for a list of static shapes.
///
/// `skip` excludes entries (water volumes) that never block movement.
pub fn build_world_accel<'a>(
    shapes: impl IntoIterator<Item = (&'a StaticShape, bool)>,
) -> WorldAccel {
    let mut accel = WorldAccel::default();

    for (i, (shape, skip)) in shapes.into_iter().enumerate() {
        if skip {
            continue;
        }
        match *shape {
            StaticShape::Plane { .. } => accel.plane_indices.push(i),
            _ => {
                accel.aabbs.push(static_shape_aabb(shape));
                accel.non_plane_indices.push(i);
            }
        }
    }

    accel
}

/// World-space AABB of a finite static shape. Planes get an unbounded box.
pub fn static_shape_aabb(shape: &StaticShape) -> Aabb {
    match *shape {
        StaticShape::Plane { .. } => Aabb::new_invalid(),
        StaticShape::Cuboid {
            half_extents,
            transform,
        } => pshape::Cuboid::new(half_extents).aabb(&transform.iso()),
        StaticShape::Sphere { radius, transform } => {
            pshape::Ball::new(radius).aabb(&Transform::from_translation(transform.translation).iso())
        }
        StaticShape::Capsule {
            radius,
            half_height,
            transform,
        } => pshape::Capsule::new_y(half_height, radius).aabb(&transform.iso()),
    }
}

/// AABB of a Y-aligned capsule centered at `pos`.
pub fn capsule_aabb(half_height: f32, radius: f32, pos: Vec3) -> Aabb {
    let ext = Vec3::new(radius, half_height + radius, radius);
    Aabb::new(na::Point3::from(pos - ext), na::Point3::from(pos + ext))
}

/// Swept AABB for a Y-aligned capsule moving from `start_pos` to `start_pos + desired`,
/// inflated by `margin` to include near misses.
pub fn swept_capsule_aabb(
    capsule_half_height: f32,
    capsule_radius: f32,
    start_pos: Vec3,
    desired: Vec3,
    margin: f32,
) -> Aabb {
    let start = capsule_aabb(capsule_half_height, capsule_radius, start_pos);
    let end = capsule_aabb(capsule_half_height, capsule_radius, start_pos + desired);
    aabb_inflate(&aabb_union(&start, &end), margin)
}

/// Candidate collider indices whose AABB intersects `query`, planes included.
pub fn query_candidates(accel: &WorldAccel, query: &Aabb) -> Vec<usize> {
    let mut out: Vec<usize> = accel.plane_indices.clone();
    out.extend(
        accel
            .aabbs
            .iter()
            .zip(&accel.non_plane_indices)
            .filter(|(aabb, _)| aabb_intersects(aabb, query))
            .map(|(_, &idx)| idx),
    );
    out
}

fn aabb_union(a: &Aabb, b: &Aabb) -> Aabb {
    Aabb::new(
        na::Point3::new(
            a.mins.x.min(b.mins.x),
            a.mins.y.min(b.mins.y),
            a.mins.z.min(b.mins.z),
        ),
        na::Point3::new(
            a.maxs.x.max(b.maxs.x),
            a.maxs.y.max(b.maxs.y),
            a.maxs.z.max(b.maxs.z),
        ),
    )
}

fn aabb_inflate(a: &Aabb, margin: f32) -> Aabb {
    if margin <= 0.0 {
        return *a;
    }
    let delta = Vec3::new(margin, margin, margin);
    Aabb::new(a.mins - delta, a.maxs + delta)
}

fn aabb_intersects(a: &Aabb, b: &Aabb) -> bool {
    !(a.maxs.x < b.mins.x
        || a.mins.x > b.maxs.x
        || a.maxs.y < b.mins.y
        || a.mins.y > b.maxs.y
        || a.maxs.z < b.mins.z
        || a.mins.z > b.maxs.z)
}

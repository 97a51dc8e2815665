/*!
Collision root module.

The mover only talks to geometry through the [`CollisionWorld`] trait. The
crate ships one implementation, [`StaticWorld`], which queries immutable
colliders with parry (re-exported by rapier3d). The code is split for clarity:

- types:        shared data types (Transform, StaticShape, CapsuleSpec, SweepHit, etc.)
- settings:     sweep and overlap tolerances
- broad:        broad-phase helpers (swept AABBs, candidate queries)
- narrow_phase: thin wrappers over parry queries (shape casts, contacts, intersections)
- world:        the `CollisionWorld` trait and `StaticWorld`
*/

pub mod broad;
pub mod narrow_phase;
pub mod settings;
pub mod types;
pub mod world;

pub use types::{
    CapsuleSpec, ColliderId, Iso, Quat, StaticShape, SweepHit, SweepMode, Transform, Vec2, Vec3,
};
pub use world::{CollisionWorld, StaticCollider, StaticWorld};

/// Convenience: a horizontal ground plane at `height`, solid below.
#[inline]
pub fn ground_plane(height: f32) -> StaticShape {
    StaticShape::Plane {
        normal: Vec3::new(0.0, 1.0, 0.0),
        dist: height,
    }
}

/// Convenience: an axis-aligned `StaticShape::Cuboid` centered at `center`.
#[inline]
pub fn cuboid_at(half_extents: Vec3, center: Vec3) -> StaticShape {
    StaticShape::Cuboid {
        half_extents,
        transform: Transform::from_translation(center),
    }
}

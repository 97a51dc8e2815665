/*!
Core collision types and math aliases shared by the collision submodules and
the movement steppers.

This module contains no algorithms. It defines the data exchanged between:
- broad (static collider AABBs and candidate pruning)
- narrow_phase (parry shape casts, contacts and intersection tests)
- world (the `CollisionWorld` seam the mover talks to)
- the mover's sweep, slide, step-up and penetration helpers
*/

use nalgebra as na;

use crate::flags::SurfaceFlags;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Vec2 = na::Vector2<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// Index of a collider inside its world.
pub type ColliderId = usize;

/// A rigid transform (isometry) in world space.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Transform {
    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::identity())
    }

    /// Convert to nalgebra `Isometry3` for parry queries.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(na::Translation3::from(self.translation), self.rotation)
    }
}

/// Static collision shapes supported by [`super::StaticWorld`].
///
/// - Plane: infinite plane satisfying `normal ⋅ x = dist`, solid on the side opposite `normal`.
/// - Cuboid: oriented box with half-extents in local space, placed by `transform`.
#[derive(Clone, Copy, Debug)]
pub enum StaticShape {
    Plane {
        /// World-space unit normal of the plane.
        normal: Vec3,
        /// Plane offset along the normal.
        dist: f32,
    },
    Cuboid {
        half_extents: Vec3,
        transform: Transform,
    },
    Sphere {
        radius: f32,
        /// Rotation is ignored.
        transform: Transform,
    },
    Capsule {
        radius: f32,
        /// Half of the cylinder length along the local +Y axis.
        half_height: f32,
        transform: Transform,
    },
}

/// Capsule specification for the moving body.
///
/// `half_height` is the half-length of the cylinder section (aligned with +Y),
/// so the total capsule height is `2*half_height + 2*radius`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapsuleSpec {
    pub radius: f32,
    pub half_height: f32,
}

impl CapsuleSpec {
    pub fn new(radius: f32, half_height: f32) -> Self {
        Self {
            radius,
            half_height,
        }
    }

    /// Grow (positive) or shrink (negative) every surface of the capsule by `amount`.
    ///
    /// The result never collapses below a tiny positive radius.
    pub fn inflated(&self, amount: f32) -> Self {
        Self {
            radius: (self.radius + amount).max(0.01),
            half_height: (self.half_height + amount).max(0.0),
        }
    }

    /// Distance from the capsule center to the bottom of its lower hemisphere.
    #[inline]
    pub fn half_total_height(&self) -> f32 {
        self.half_height + self.radius
    }
}

/// How a sweep treats shapes the capsule already overlaps at its start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SweepMode {
    /// Overlaps the move leaves are ignored, so bodies can slide out of shallow contacts.
    #[default]
    IgnoreDepartingOverlaps,
    /// Every initial overlap is reported as a start-penetrating blocking hit.
    ReportAllOverlaps,
}

/// Result of sweeping the capsule along a delta.
#[derive(Clone, Copy, Debug)]
pub struct SweepHit {
    /// The move was stopped by something.
    pub blocking: bool,
    /// The capsule overlapped the blocker before moving at all.
    pub start_penetrating: bool,
    /// Fraction (0..=1) of the requested delta actually travelled.
    pub time: f32,
    /// Surface normal facing the mover.
    pub normal: Vec3,
    /// Normal of the impacted surface at `impact_point`, facing the mover.
    pub impact_normal: Vec3,
    pub impact_point: Vec3,
    /// Capsule center after the move (start + delta * time).
    pub location: Vec3,
    pub trace_start: Vec3,
    pub trace_end: Vec3,
    /// Overlap depth for start-penetrating hits.
    pub penetration_depth: f32,
    pub flags: SurfaceFlags,
    pub collider: Option<ColliderId>,
}

impl SweepHit {
    /// A sweep that travelled the full delta.
    pub fn clear(start: Vec3, delta: Vec3) -> Self {
        Self {
            blocking: false,
            start_penetrating: false,
            time: 1.0,
            normal: Vec3::zeros(),
            impact_normal: Vec3::zeros(),
            impact_point: Vec3::zeros(),
            location: start + delta,
            trace_start: start,
            trace_end: start + delta,
            penetration_depth: 0.0,
            flags: SurfaceFlags::default(),
            collider: None,
        }
    }

    /// Blocking and not stuck at the start.
    #[inline]
    pub fn is_valid_blocking_hit(&self) -> bool {
        self.blocking && !self.start_penetrating
    }
}

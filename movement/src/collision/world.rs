use nalgebra as na;
use rapier3d::parry::shape as pshape;

use super::{
    broad::{self, WorldAccel},
    narrow_phase::{self, CastHit, Overlap},
    settings::{BROAD_PHASE_MARGIN, DEFAULT_SKIN, MIN_MOVE_SQ},
    types::{CapsuleSpec, ColliderId, Iso, StaticShape, SweepHit, SweepMode, Vec3},
};
use crate::flags::{SurfaceFlags, SurfaceTag};

/// Geometry queries the mover needs from the level.
///
/// Every query uses a Y-aligned capsule with identity rotation.
pub trait CollisionWorld {
    /// Sweep the capsule from `start` along `delta`, stopping short of the first blocker.
    fn sweep(&self, capsule: &CapsuleSpec, start: Vec3, delta: Vec3, mode: SweepMode) -> SweepHit;

    /// True if the capsule, grown by `inflation` (negative shrinks), overlaps a blocker at `pos`.
    fn overlaps(&self, capsule: &CapsuleSpec, pos: Vec3, inflation: f32) -> bool;

    /// True if `pos` lies inside a water volume.
    fn is_water(&self, _pos: Vec3) -> bool {
        false
    }
}

impl<T: CollisionWorld + ?Sized> CollisionWorld for &T {
    fn sweep(&self, capsule: &CapsuleSpec, start: Vec3, delta: Vec3, mode: SweepMode) -> SweepHit {
        (**self).sweep(capsule, start, delta, mode)
    }

    fn overlaps(&self, capsule: &CapsuleSpec, pos: Vec3, inflation: f32) -> bool {
        (**self).overlaps(capsule, pos, inflation)
    }

    fn is_water(&self, pos: Vec3) -> bool {
        (**self).is_water(pos)
    }
}

/// One immutable collider of a [`StaticWorld`].
#[derive(Clone, Copy, Debug)]
pub struct StaticCollider {
    pub shape: StaticShape,
    pub flags: SurfaceFlags,
    /// Water volumes never block; they only answer [`CollisionWorld::is_water`].
    pub water: bool,
}

impl StaticCollider {
    pub fn solid(shape: StaticShape) -> Self {
        Self {
            shape,
            flags: SurfaceFlags::default(),
            water: false,
        }
    }

    pub fn water(shape: StaticShape) -> Self {
        Self {
            shape,
            flags: SurfaceFlags::default(),
            water: true,
        }
    }

    pub fn with_tags(mut self, tags: &[SurfaceTag]) -> Self {
        self.flags.add_many(tags);
        self
    }
}

/// A level made of immutable colliders, queried with parry.
#[derive(Clone, Debug, Default)]
pub struct StaticWorld {
    colliders: Vec<StaticCollider>,
    accel: WorldAccel,
    skin: f32,
}

impl StaticWorld {
    pub fn new(colliders: Vec<StaticCollider>) -> Self {
        let accel = broad::build_world_accel(colliders.iter().map(|c| (&c.shape, c.water)));
        Self {
            colliders,
            accel,
            skin: DEFAULT_SKIN,
        }
    }

    pub fn colliders(&self) -> &[StaticCollider] {
        &self.colliders
    }

    fn hit_from_overlap(&self, idx: ColliderId, overlap: Overlap, start: Vec3, delta: Vec3) -> SweepHit {
        SweepHit {
            blocking: true,
            start_penetrating: true,
            time: 0.0,
            normal: overlap.normal,
            impact_normal: overlap.normal,
            impact_point: overlap.point,
            location: start,
            trace_start: start,
            trace_end: start + delta,
            penetration_depth: overlap.depth,
            flags: self.colliders[idx].flags,
            collider: Some(idx),
        }
    }

    fn hit_from_cast(&self, idx: ColliderId, hit: CastHit, start: Vec3, delta: Vec3) -> SweepHit {
        // Travel up to the contact point minus skin.
        let len = delta.norm();
        let travel = (len * hit.fraction - self.skin).max(0.0);
        let time = (travel / len).clamp(0.0, 1.0);
        SweepHit {
            blocking: true,
            start_penetrating: false,
            time,
            normal: hit.normal,
            impact_normal: hit.normal,
            impact_point: hit.point,
            location: start + delta * time,
            trace_start: start,
            trace_end: start + delta,
            penetration_depth: 0.0,
            flags: self.colliders[idx].flags,
            collider: Some(idx),
        }
    }
}

fn capsule_iso(pos: Vec3) -> Iso {
    Iso::from_parts(na::Translation3::from(pos), na::UnitQuaternion::identity())
}

impl CollisionWorld for StaticWorld {
    /// Algorithm:
    /// - Prune candidates with the swept AABB.
    /// - Collect initial overlaps. Departing ones are ignored unless `mode` reports all of them;
    ///   the deepest remaining overlap is returned as a start-penetrating hit.
    /// - Otherwise shape-cast against the non-overlapping candidates and stop at the earliest
    ///   contact minus `skin`.
    fn sweep(&self, capsule: &CapsuleSpec, start: Vec3, delta: Vec3, mode: SweepMode) -> SweepHit {
        let shape = pshape::Capsule::new_y(capsule.half_height, capsule.radius);
        let iso = capsule_iso(start);
        let moving = delta.norm_squared() > MIN_MOVE_SQ;

        let swept = broad::swept_capsule_aabb(
            capsule.half_height,
            capsule.radius,
            start,
            delta,
            BROAD_PHASE_MARGIN + self.skin,
        );

        let mut deepest: Option<(ColliderId, Overlap)> = None;
        let mut cast_targets: Vec<ColliderId> = Vec::new();
        for idx in broad::query_candidates(&self.accel, &swept) {
            let collider = &self.colliders[idx];
            match narrow_phase::capsule_overlap(iso, &shape, &collider.shape) {
                Some(overlap) => {
                    let departing = moving && delta.dot(&overlap.normal) > 0.0;
                    if mode == SweepMode::ReportAllOverlaps || !departing {
                        if deepest.is_none_or(|(_, d)| overlap.depth > d.depth) {
                            deepest = Some((idx, overlap));
                        }
                    }
                }
                None => cast_targets.push(idx),
            }
        }

        if let Some((idx, overlap)) = deepest {
            return self.hit_from_overlap(idx, overlap, start, delta);
        }
        if !moving {
            return SweepHit::clear(start, delta);
        }

        let mut best: Option<(ColliderId, CastHit)> = None;
        for idx in cast_targets {
            if let Some(hit) = narrow_phase::cast_capsule_against_static(
                iso,
                &shape,
                delta,
                1.0,
                &self.colliders[idx].shape,
            ) {
                if best.is_none_or(|(_, b)| hit.fraction < b.fraction) {
                    best = Some((idx, hit));
                }
            }
        }

        match best {
            Some((idx, hit)) => self.hit_from_cast(idx, hit, start, delta),
            None => SweepHit::clear(start, delta),
        }
    }

    fn overlaps(&self, capsule: &CapsuleSpec, pos: Vec3, inflation: f32) -> bool {
        let query = capsule.inflated(inflation);
        let shape = pshape::Capsule::new_y(query.half_height, query.radius);
        let iso = capsule_iso(pos);
        let aabb = broad::swept_capsule_aabb(
            query.half_height,
            query.radius,
            pos,
            Vec3::zeros(),
            BROAD_PHASE_MARGIN,
        );
        broad::query_candidates(&self.accel, &aabb)
            .into_iter()
            .any(|idx| narrow_phase::capsule_intersects(iso, &shape, &self.colliders[idx].shape))
    }

    fn is_water(&self, pos: Vec3) -> bool {
        self.colliders
            .iter()
            .filter(|c| c.water)
            .any(|c| narrow_phase::contains_point(&c.shape, pos))
    }
}

use nalgebra as na;
use rapier3d::parry::{
    query::{self, ShapeCastOptions},
    shape as pshape,
};

use super::types::{Iso, StaticShape, Vec3};

/// Earliest contact of a capsule cast against one static shape.
#[derive(Clone, Copy, Debug)]
pub struct CastHit {
    /// Surface normal facing the moving capsule.
    pub normal: Vec3,
    /// Fraction (0..1) of the cast translation where the hit occurred.
    pub fraction: f32,
    /// World-space contact point at the time of impact.
    pub point: Vec3,
}

/// An initial overlap between the capsule and one static shape.
#[derive(Clone, Copy, Debug)]
pub struct Overlap {
    /// Direction that pushes the capsule out of the shape.
    pub normal: Vec3,
    pub depth: f32,
    pub point: Vec3,
}

/// Run `f` with the parry shape and pose of a static shape.
fn with_parry_shape<R>(shape: &StaticShape, f: impl FnOnce(&Iso, &dyn pshape::Shape) -> R) -> R {
    match *shape {
        StaticShape::Plane { normal, dist } => {
            // Plane: a parry HalfSpace with the world normal, positioned at normal * dist.
            let plane = pshape::HalfSpace {
                normal: na::Unit::new_normalize(normal),
            };
            let iso = Iso::from_parts(
                na::Translation3::from(normal * dist),
                na::UnitQuaternion::identity(),
            );
            f(&iso, &plane)
        }
        StaticShape::Cuboid {
            half_extents,
            transform,
        } => f(&transform.iso(), &pshape::Cuboid::new(half_extents)),
        StaticShape::Sphere { radius, transform } => {
            // Rotation is irrelevant for a ball.
            let iso = Iso::from_parts(
                na::Translation3::from(transform.translation),
                na::UnitQuaternion::identity(),
            );
            f(&iso, &pshape::Ball::new(radius))
        }
        StaticShape::Capsule {
            radius,
            half_height,
            transform,
        } => f(&transform.iso(), &pshape::Capsule::new_y(half_height, radius)),
    }
}

/// Cast a moving Y-aligned capsule against a single static shape and return the earliest hit (if any).
///
/// - `capsule_iso`: the capsule's starting isometry in world space (identity rotation).
/// - `vel`: the world-space translation for this cast.
/// - `max_toi`: the maximum fraction of `vel` to consider (typically 1.0).
pub fn cast_capsule_against_static(
    capsule_iso: Iso,
    capsule: &pshape::Capsule,
    vel: Vec3,
    max_toi: f32,
    shape: &StaticShape,
) -> Option<CastHit> {
    with_parry_shape(shape, |shape_iso, parry_shape| {
        let mut opts = ShapeCastOptions::with_max_time_of_impact(max_toi);
        opts.stop_at_penetration = true;
        let hit = query::cast_shapes(
            &capsule_iso,
            &vel,
            capsule as &dyn pshape::Shape,
            shape_iso,
            &Vec3::zeros(),
            parry_shape,
            opts,
        )
        .ok()
        .flatten()?;

        // normal1 points from the capsule toward the obstacle; flip it so it opposes the motion.
        let mut n = hit.normal1.into_inner();
        if n.dot(&vel) > 0.0 {
            n = -n;
        }
        let center_at_impact = capsule_iso.translation.vector + vel * hit.time_of_impact;
        Some(CastHit {
            normal: n,
            fraction: hit.time_of_impact,
            point: center_at_impact + hit.witness1.coords,
        })
    })
}

/// Report how deep the capsule at `capsule_iso` overlaps a static shape, if it does.
pub fn capsule_overlap(
    capsule_iso: Iso,
    capsule: &pshape::Capsule,
    shape: &StaticShape,
) -> Option<Overlap> {
    if let StaticShape::Plane { normal, dist } = *shape {
        return capsule_plane_overlap(capsule_iso, capsule, normal, dist);
    }
    with_parry_shape(shape, |shape_iso, parry_shape| {
        let contact = query::contact(
            &capsule_iso,
            capsule as &dyn pshape::Shape,
            shape_iso,
            parry_shape,
            0.0,
        )
        .ok()
        .flatten()?;

        if contact.dist >= -super::settings::PENETRATION_TOLERANCE {
            return None;
        }
        // normal1 points out of the capsule toward the shape; escaping goes the other way.
        Some(Overlap {
            normal: -contact.normal1.into_inner(),
            depth: -contact.dist,
            point: contact.point2.coords,
        })
    })
}

/// Signed distance of a Y-aligned capsule to a plane, measured from its deepest point.
///
/// parry's capsule-vs-halfspace contact is only reliable with the halfspace as the first
/// shape, so planes are resolved here directly.
fn capsule_plane_overlap(capsule_iso: Iso, capsule: &pshape::Capsule, normal: Vec3, dist: f32) -> Option<Overlap> {
    let n = normal.try_normalize(1.0e-6)?;
    let center = capsule_iso.translation.vector;
    let half_height = capsule.half_height();
    let gap = n.dot(&center) - dist - (capsule.radius + half_height * n.y.abs());
    if gap >= -super::settings::PENETRATION_TOLERANCE {
        return None;
    }
    let deepest = center - n * capsule.radius - Vec3::y() * (half_height * n.y.signum());
    Some(Overlap {
        normal: n,
        depth: -gap,
        point: deepest - n * gap,
    })
}

/// Boolean intersection test of the capsule against a static shape.
pub fn capsule_intersects(capsule_iso: Iso, capsule: &pshape::Capsule, shape: &StaticShape) -> bool {
    with_parry_shape(shape, |shape_iso, parry_shape| {
        query::intersection_test(
            &capsule_iso,
            capsule as &dyn pshape::Shape,
            shape_iso,
            parry_shape,
        )
        .unwrap_or(false)
    })
}

/// Boolean point containment used for water volumes.
pub fn contains_point(shape: &StaticShape, point: Vec3) -> bool {
    with_parry_shape(shape, |shape_iso, parry_shape| {
        parry_shape.contains_point(shape_iso, &na::Point3::from(point))
    })
}

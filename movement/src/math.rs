/*!
Planar (X/Z) helpers.

The world is Y-up, so "2D", "horizontal" and "planar" all mean the X and Z
components. A planar vector is stored as `Vec2::new(x, z)`.
*/

use crate::collision::{Vec2, Vec3};

const SAFE_NORMAL_EPS_SQ: f32 = 1.0e-8;

#[inline]
pub fn up() -> Vec3 {
    Vec3::new(0.0, 1.0, 0.0)
}

#[inline]
pub fn to_planar(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Horizontal length.
#[inline]
pub fn size_2d(v: Vec3) -> f32 {
    (v.x * v.x + v.z * v.z).sqrt()
}

#[inline]
pub fn size_sq_2d(v: Vec3) -> f32 {
    v.x * v.x + v.z * v.z
}

#[inline]
pub fn dot_2d(a: Vec3, b: Vec3) -> f32 {
    a.x * b.x + a.z * b.z
}

/// Unit vector, or zero when `v` is too short to normalize.
#[inline]
pub fn safe_normal(v: Vec3) -> Vec3 {
    let len_sq = v.norm_squared();
    if len_sq > SAFE_NORMAL_EPS_SQ {
        v / len_sq.sqrt()
    } else {
        Vec3::zeros()
    }
}

/// Horizontal unit vector (Y dropped), or zero.
#[inline]
pub fn safe_normal_2d(v: Vec3) -> Vec3 {
    safe_normal(Vec3::new(v.x, 0.0, v.z))
}

/// Replace the horizontal part of `v` with `planar`, keeping Y.
#[inline]
pub fn with_planar(v: Vec3, planar: Vec3) -> Vec3 {
    Vec3::new(planar.x, v.y, planar.z)
}

/// Remove the component of `v` along `plane_normal` (which need not be unit length).
#[inline]
pub fn project_on_plane(v: Vec3, plane_normal: Vec3) -> Vec3 {
    let n = safe_normal(plane_normal);
    v - n * v.dot(&n)
}

#[inline]
pub fn project_onto(v: Vec3, target: Vec3) -> Vec3 {
    let len_sq = target.norm_squared();
    if len_sq > SAFE_NORMAL_EPS_SQ {
        target * (v.dot(&target) / len_sq)
    } else {
        Vec3::zeros()
    }
}

#[inline]
pub fn is_nearly_zero(v: Vec3, tolerance: f32) -> bool {
    v.x.abs() <= tolerance && v.y.abs() <= tolerance && v.z.abs() <= tolerance
}

/// Signum where zero stays zero.
#[inline]
pub fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Project `normal` into the vertical plane that contains `direction`.
///
/// The plane normal is `direction × up`. Collision normals are flattened into
/// the plane of motion so responses never push the body sideways off the curve.
/// When `direction` is vertical the plane is undefined and the normal is only
/// re-normalized.
#[inline]
pub fn projected_normal(direction: Vec3, normal: Vec3) -> Vec3 {
    let plane_normal = safe_normal(direction.cross(&up()));
    safe_normal(project_on_plane(normal, plane_normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_helpers_ignore_y() {
        let v = Vec3::new(3.0, 100.0, 4.0);
        assert_eq!(size_2d(v), 5.0);
        assert_eq!(size_sq_2d(v), 25.0);
        assert_eq!(to_planar(v), Vec2::new(3.0, 4.0));
        let n = safe_normal_2d(v);
        assert!((n - Vec3::new(0.6, 0.0, 0.8)).norm() < 1.0e-6);
    }

    #[test]
    fn projected_normal_stays_in_motion_plane() {
        // Moving along +X; a wall normal tilted toward +Z loses its Z part.
        let n = projected_normal(Vec3::new(1.0, 0.0, 0.0), Vec3::new(-0.6, 0.0, 0.8));
        assert!((n - Vec3::new(-1.0, 0.0, 0.0)).norm() < 1.0e-6);
    }

    #[test]
    fn projected_normal_with_vertical_direction_is_normalized_input() {
        let n = projected_normal(Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 2.0, 0.0));
        assert!((n - Vec3::new(0.0, 1.0, 0.0)).norm() < 1.0e-6);
    }

    #[test]
    fn safe_normal_of_zero_is_zero() {
        assert_eq!(safe_normal(Vec3::zeros()), Vec3::zeros());
        assert_eq!(sign(0.0), 0.0);
    }
}

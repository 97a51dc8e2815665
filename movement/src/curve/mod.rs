/*!
Curve geometry and the curve position handle.

All horizontal motion happens along a [`Curve`], a path addressed by
arclength. A [`CurvePosition`] pairs a shared curve with a distance along it.
The body's height is never taken from the curve; callers supply it when they
need a world position.
*/

mod shapes;

use std::{fmt, sync::Arc};

use crate::{
    collision::{Vec2, Vec3},
    constants::{CURVE_CONNECTION_DISTANCE, KINDA_SMALL_NUMBER},
    math::{dot_2d, safe_normal, safe_normal_2d, size_2d, up},
};

pub use shapes::{ArcCurve, PolylineCurve};

/// Geometry provider for one curve.
pub trait Curve: fmt::Debug {
    /// Total arclength.
    fn length(&self) -> f32;

    /// World position at `distance` (clamped to `[0, length]`). Only X and Z are used by movement.
    fn position_at(&self, distance: f32) -> Vec3;

    /// Unit tangent at `distance`, pointing toward increasing distance.
    fn tangent_at(&self, distance: f32) -> Vec3;

    /// Distance of the curve point horizontally closest to `point`.
    fn nearest_distance(&self, point: Vec3) -> f32;

    /// Curve continuing past the end, if any.
    fn next_curve(&self) -> Option<Arc<dyn Curve>> {
        None
    }

    /// Curve continuing before the start, if any.
    fn prev_curve(&self) -> Option<Arc<dyn Curve>> {
        None
    }
}

/// Outcome of [`CurvePosition::advance`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AdvanceOutcome {
    /// The coordinate hit a curve end with nothing linked beyond it.
    pub reached_end: bool,
    /// Share of the requested delta that could not be applied.
    pub rest_fraction: f32,
}

/// A curve reference plus a scalar arclength coordinate.
///
/// An unbound handle (`curve() == None`) is valid and means "off-curve".
/// Every query on it returns a neutral value (zero vectors, `None`).
#[derive(Clone, Default)]
pub struct CurvePosition {
    curve: Option<Arc<dyn Curve>>,
    distance: f32,
}

impl fmt::Debug for CurvePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurvePosition")
            .field("bound", &self.curve.is_some())
            .field("distance", &self.distance)
            .finish()
    }
}

impl CurvePosition {
    pub fn new(curve: Arc<dyn Curve>, distance: f32) -> Self {
        let distance = distance.clamp(0.0, curve.length());
        Self {
            curve: Some(curve),
            distance,
        }
    }

    pub fn unbound() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.curve.is_some()
    }

    pub fn curve(&self) -> Option<&Arc<dyn Curve>> {
        self.curve.as_ref()
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Set the coordinate, clamped to the curve.
    pub fn set_distance(&mut self, distance: f32) {
        match &self.curve {
            Some(curve) => {
                let length = curve.length();
                if !(0.0..=length).contains(&distance) {
                    log::warn!("curve distance {distance} outside [0, {length}], clamping");
                }
                self.distance = distance.clamp(0.0, length);
            }
            None => self.distance = distance,
        }
    }

    /// True if both handles reference the same curve object (or are both unbound).
    pub fn same_curve(&self, other: &CurvePosition) -> bool {
        match (&self.curve, &other.curve) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Horizontal location of the curve point.
    pub fn location_2d(&self) -> Option<Vec2> {
        self.curve.as_ref().map(|c| {
            let p = c.position_at(self.distance);
            Vec2::new(p.x, p.z)
        })
    }

    /// World position of the curve point at height `y`. Unbound handles return `(0, y, 0)`.
    pub fn to_world(&self, y: f32) -> Vec3 {
        match self.location_2d() {
            Some(p) => Vec3::new(p.x, y, p.y),
            None => Vec3::new(0.0, y, 0.0),
        }
    }

    /// Tangent at the coordinate (may have a Y component). Zero when unbound.
    pub fn direction(&self) -> Vec3 {
        self.curve
            .as_ref()
            .map(|c| c.tangent_at(self.distance))
            .unwrap_or_else(Vec3::zeros)
    }

    /// Horizontal unit tangent. Zero when unbound.
    pub fn direction_2d(&self) -> Vec3 {
        safe_normal_2d(self.direction())
    }

    /// Normal of the vertical plane the body is constrained to.
    pub fn plane_normal(&self) -> Vec3 {
        safe_normal(self.direction().cross(&up()))
    }

    /// `+1` if `v` points along the tangent (horizontally), `-1` if against it.
    pub fn direction_modifier(&self, v: Vec3) -> f32 {
        let dir = self.direction_2d();
        let v2 = safe_normal_2d(v);
        if dot_2d(dir, v2) < 0.0 { -1.0 } else { 1.0 }
    }

    /// Horizontal unit tangent oriented toward `v`.
    pub fn direction_from_vector(&self, v: Vec3) -> Vec3 {
        self.direction_2d() * self.direction_modifier(v)
    }

    /// Nearest coordinate on the bound curve for a world point.
    pub fn nearest_coordinate_for(&self, point: Vec3) -> Option<f32> {
        self.curve.as_ref().map(|c| c.nearest_distance(point))
    }

    /// Re-derive the coordinate from a world location.
    pub fn set_distance_from_world_location(&mut self, point: Vec3) {
        match self.nearest_coordinate_for(point) {
            Some(d) => self.distance = d,
            None => log::error!("set_distance_from_world_location called on an unbound curve position"),
        }
    }

    /// Move by a signed horizontal arc delta.
    ///
    /// When the tangent is sloped the delta is stretched by `1 / (dir · horizontal_dir)`, so
    /// a horizontal displacement maps to the matching arclength.
    pub fn advance(&mut self, delta: f32) -> AdvanceOutcome {
        let dir = self.direction();
        let mut delta = delta;
        if dir.y != 0.0 {
            let horizontal = safe_normal_2d(dir);
            let cos = dir.dot(&horizontal);
            if cos > KINDA_SMALL_NUMBER {
                delta /= cos;
            }
        }
        self.add_to_distance(delta)
    }

    /// `self` advanced by `delta`, leaving `self` untouched.
    pub fn offset(&self, delta: f32) -> CurvePosition {
        let mut moved = self.clone();
        moved.advance(delta);
        moved
    }

    /// Signed arclength from `other` to `self` on the same curve.
    ///
    /// Positions on different curves measure through the horizontal gap between their points.
    pub fn distance_to(&self, other: &CurvePosition) -> f32 {
        if self.same_curve(other) {
            return self.distance - other.distance;
        }
        let a = self.to_world(0.0);
        let b = other.to_world(0.0);
        size_2d(a - b) * other.direction_modifier(a - b)
    }

    fn add_to_distance(&mut self, delta: f32) -> AdvanceOutcome {
        let Some(curve) = self.curve.clone() else {
            return AdvanceOutcome::default();
        };
        if delta.abs() < KINDA_SMALL_NUMBER {
            return AdvanceOutcome::default();
        }

        let length = curve.length();
        let new_distance = self.distance + delta;

        if new_distance < 0.0 {
            let Some(prev) = curve.prev_curve() else {
                self.distance = 0.0;
                return AdvanceOutcome {
                    reached_end: true,
                    rest_fraction: new_distance.abs() / delta.abs(),
                };
            };
            let overshoot = -new_distance;
            let gap = size_2d(prev.position_at(prev.length()) - curve.position_at(0.0));
            // A linked curve whose end does not touch our start is entered from its start.
            self.distance = if gap > CURVE_CONNECTION_DISTANCE {
                overshoot
            } else {
                prev.length() - overshoot
            }
            .clamp(0.0, prev.length());
            self.curve = Some(prev);
        } else if new_distance > length {
            let Some(next) = curve.next_curve() else {
                self.distance = length;
                return AdvanceOutcome {
                    reached_end: true,
                    rest_fraction: (new_distance - length) / delta.abs(),
                };
            };
            let overshoot = new_distance - length;
            let gap = size_2d(curve.position_at(length) - next.position_at(0.0));
            self.distance = if gap > CURVE_CONNECTION_DISTANCE {
                next.length() - overshoot
            } else {
                overshoot
            }
            .clamp(0.0, next.length());
            self.curve = Some(next);
        } else {
            self.distance = new_distance;
        }

        AdvanceOutcome::default()
    }
}

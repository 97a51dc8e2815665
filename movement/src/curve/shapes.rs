use crate::{
    collision::Vec3,
    math::{safe_normal, to_planar},
};

use super::Curve;

/// Piecewise-linear curve through a list of points.
///
/// Nearest-point queries measure in the horizontal plane.
#[derive(Clone, Debug)]
pub struct PolylineCurve {
    points: Vec<Vec3>,
    /// Arclength at each point; `cumulative[0] == 0`.
    cumulative: Vec<f32>,
}

impl PolylineCurve {
    /// Build from at least two points. Duplicate consecutive points are dropped.
    pub fn new(points: Vec<Vec3>) -> Self {
        let mut deduped: Vec<Vec3> = Vec::with_capacity(points.len());
        for p in points {
            if deduped.last().is_none_or(|last| (p - last).norm() > 1.0e-4) {
                deduped.push(p);
            }
        }
        let mut cumulative = Vec::with_capacity(deduped.len());
        let mut total = 0.0;
        for (i, p) in deduped.iter().enumerate() {
            if i > 0 {
                total += (p - deduped[i - 1]).norm();
            }
            cumulative.push(total);
        }
        Self {
            points: deduped,
            cumulative,
        }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Segment index containing `distance` and the local offset into it.
    fn locate(&self, distance: f32) -> Option<(usize, f32)> {
        if self.points.len() < 2 {
            return None;
        }
        let d = distance.clamp(0.0, self.length());
        let seg = match self.cumulative.iter().position(|&c| c > d) {
            Some(i) => i - 1,
            None => self.points.len() - 2,
        };
        Some((seg, d - self.cumulative[seg]))
    }
}

impl Curve for PolylineCurve {
    fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    fn position_at(&self, distance: f32) -> Vec3 {
        match self.locate(distance) {
            Some((seg, local)) => {
                let a = self.points[seg];
                let dir = safe_normal(self.points[seg + 1] - a);
                a + dir * local
            }
            None => self.points.first().copied().unwrap_or_else(Vec3::zeros),
        }
    }

    fn tangent_at(&self, distance: f32) -> Vec3 {
        match self.locate(distance) {
            Some((seg, _)) => safe_normal(self.points[seg + 1] - self.points[seg]),
            None => Vec3::zeros(),
        }
    }

    fn nearest_distance(&self, point: Vec3) -> f32 {
        let p = to_planar(point);
        let mut best = (f32::MAX, 0.0);
        for seg in 0..self.points.len().saturating_sub(1) {
            let a = to_planar(self.points[seg]);
            let b = to_planar(self.points[seg + 1]);
            let ab = b - a;
            let len_sq = ab.norm_squared();
            let t = if len_sq > 0.0 {
                ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let dist_sq = (a + ab * t - p).norm_squared();
            if dist_sq < best.0 {
                let seg_len = self.cumulative[seg + 1] - self.cumulative[seg];
                best = (dist_sq, self.cumulative[seg] + seg_len * t);
            }
        }
        best.1
    }
}

/// Circular arc in a horizontal plane.
///
/// Distance 0 sits at `start_angle`, with `x = cos θ` and `z = sin θ`. A positive `sweep`
/// increases θ along the arc.
#[derive(Clone, Debug)]
pub struct ArcCurve {
    pub center: Vec3,
    pub radius: f32,
    pub start_angle: f32,
    /// Signed swept angle in radians.
    pub sweep: f32,
}

impl ArcCurve {
    pub fn new(center: Vec3, radius: f32, start_angle: f32, sweep: f32) -> Self {
        Self {
            center,
            radius,
            start_angle,
            sweep,
        }
    }

    fn angle_at(&self, distance: f32) -> f32 {
        let d = distance.clamp(0.0, self.length());
        self.start_angle + self.sweep.signum() * d / self.radius
    }
}

impl Curve for ArcCurve {
    fn length(&self) -> f32 {
        self.radius * self.sweep.abs()
    }

    fn position_at(&self, distance: f32) -> Vec3 {
        let a = self.angle_at(distance);
        self.center + Vec3::new(a.cos(), 0.0, a.sin()) * self.radius
    }

    fn tangent_at(&self, distance: f32) -> Vec3 {
        let a = self.angle_at(distance);
        Vec3::new(-a.sin(), 0.0, a.cos()) * self.sweep.signum()
    }

    fn nearest_distance(&self, point: Vec3) -> f32 {
        let rel = to_planar(point - self.center);
        if rel.norm_squared() == 0.0 {
            return 0.0;
        }
        let angle = rel.y.atan2(rel.x);
        // Offset from the start angle along the sweep direction, wrapped to [0, 2π).
        let tau = std::f32::consts::TAU;
        let offset = ((angle - self.start_angle) * self.sweep.signum()).rem_euclid(tau);
        let sweep = self.sweep.abs();
        if offset <= sweep {
            return offset * self.radius;
        }
        // Outside the arc: snap to whichever end is angularly closer.
        let past_end = offset - sweep;
        let before_start = tau - offset;
        if past_end < before_start {
            self.length()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn polyline_length_position_and_tangent() {
        let c = PolylineCurve::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 50.0),
        ]);
        assert_eq!(c.length(), 150.0);
        assert_eq!(c.position_at(120.0), Vec3::new(100.0, 0.0, 20.0));
        assert_eq!(c.tangent_at(50.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(c.tangent_at(140.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(c.position_at(500.0), Vec3::new(100.0, 0.0, 50.0));
    }

    #[test]
    fn polyline_nearest_distance_picks_closest_segment() {
        let c = PolylineCurve::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 50.0),
        ]);
        assert!((c.nearest_distance(Vec3::new(40.0, 80.0, -3.0)) - 40.0).abs() < 1.0e-4);
        assert!((c.nearest_distance(Vec3::new(120.0, 0.0, 30.0)) - 130.0).abs() < 1.0e-4);
    }

    #[test]
    fn arc_tangent_is_perpendicular_to_radius() {
        let arc = ArcCurve::new(Vec3::zeros(), 200.0, 0.0, PI);
        let d = arc.length() * 0.3;
        let radial = arc.position_at(d) - arc.center;
        assert!(radial.dot(&arc.tangent_at(d)).abs() < 1.0e-3);
        assert!((arc.tangent_at(d).norm() - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn arc_nearest_distance_round_trips_and_clamps() {
        let arc = ArcCurve::new(Vec3::zeros(), 200.0, 0.0, FRAC_PI_2);
        let d = 100.0;
        let p = arc.position_at(d) * 1.5;
        assert!((arc.nearest_distance(p) - d).abs() < 1.0e-2);
        // A point just behind the start snaps to 0.
        assert_eq!(arc.nearest_distance(Vec3::new(200.0, 0.0, -5.0)), 0.0);
    }

    #[test]
    fn negative_sweep_runs_clockwise() {
        let arc = ArcCurve::new(Vec3::zeros(), 100.0, 0.0, -FRAC_PI_2);
        let end = arc.position_at(arc.length());
        assert!((end - Vec3::new(0.0, 0.0, -100.0)).norm() < 1.0e-3);
        assert!((arc.nearest_distance(end) - arc.length()).abs() < 1.0e-2);
    }
}

//! Sweep, slide, floor and step-up helpers shared by the steppers.

use super::CharacterMover;
use crate::{
    collision::{CollisionWorld, SweepHit, Vec3},
    constants::{KINDA_SMALL_NUMBER, MAX_FLOOR_DIST, MIN_FLOOR_DIST, SWEEP_EDGE_REJECT_DISTANCE},
    flags::SurfaceTag,
    math::{is_nearly_zero, project_on_plane, project_onto, projected_normal, safe_normal, safe_normal_2d, size_2d, size_sq_2d},
    owner::MovementOwner,
    state::{FloorResult, MovementMode},
};

/// Floor normals within this of straight up skip the ramp projection.
const FLAT_FLOOR_EPSILON: f32 = 1.0e-5;

/// Nudge away from a wall that was hit again right after sliding along it.
const SAME_WALL_NUDGE: f32 = 0.01;

impl<W: CollisionWorld, O: MovementOwner> CharacterMover<W, O> {
    /// Sweep the capsule by `delta` and place it where the sweep stopped.
    ///
    /// Entering a water volume switches to swimming.
    pub(super) fn move_updated(&mut self, delta: Vec3) -> SweepHit {
        let hit = self.world.sweep(&self.capsule, self.location, delta, self.sweep_mode);
        self.location = hit.location;
        if self.mode != MovementMode::Swimming && self.world.is_water(self.location) {
            log::debug!("entered water at {:?}", self.location);
            self.set_movement_mode(MovementMode::Swimming);
            self.owner.on_enter_water();
        }
        hit
    }

    /// [`Self::move_updated`] that first tries to resolve a start-penetrating sweep and retries once.
    pub(super) fn safe_move(&mut self, delta: Vec3) -> SweepHit {
        let hit = self.move_updated(delta);
        if hit.start_penetrating {
            let adjustment = self.penetration_adjustment(&hit);
            if self.resolve_penetration(adjustment, &hit) {
                return self.move_updated(delta);
            }
        }
        hit
    }

    /// Advance the coordinate by the horizontal share of `delta`, scaled by `fraction`.
    ///
    /// Returns the signed arc delta that was requested.
    pub(super) fn follow_curve(&mut self, delta: Vec3, fraction: f32) -> f32 {
        let arc = size_2d(delta) * self.curve.direction_modifier(delta) * fraction;
        self.curve.advance(arc);
        arc
    }

    /// Let the owner react to a blocking impact. A returned mode takes effect immediately.
    pub(super) fn handle_impact(&mut self, hit: &SweepHit) {
        if let Some(mode) = self.owner.on_blocked(hit) {
            self.set_movement_mode(mode);
        }
    }

    pub(super) fn is_walkable(&self, hit: &SweepHit) -> bool {
        hit.is_valid_blocking_hit() && hit.impact_normal.y >= self.config.walkable_floor_y
    }

    /// Impact point lies inside the capsule's horizontal rim, minus a small band.
    pub(super) fn is_within_edge_tolerance(&self, location: Vec3, impact_point: Vec3) -> bool {
        let dist_sq = size_sq_2d(impact_point - location);
        let reduced = (self.capsule.radius - SWEEP_EDGE_REJECT_DISTANCE).max(SWEEP_EDGE_REJECT_DISTANCE + KINDA_SMALL_NUMBER);
        dist_sq < reduced * reduced
    }

    pub(super) fn is_valid_landing_spot(&self, location: Vec3, hit: &SweepHit) -> bool {
        if !hit.blocking {
            return false;
        }
        if hit.start_penetrating {
            // Horizontal or downward push-out next to a wall is not a floor.
            if hit.normal.y < KINDA_SMALL_NUMBER {
                return false;
            }
        } else {
            if !self.is_walkable(hit) {
                return false;
            }
            let lower_hemisphere_y = hit.location.y - self.capsule.half_height;
            if hit.impact_point.y >= lower_hemisphere_y {
                return false;
            }
            if !self.is_within_edge_tolerance(hit.location, hit.impact_point) {
                return false;
            }
        }
        self.find_floor(location).is_walkable_floor()
    }

    /// An edge hit on the lower hemisphere may hide a walkable top surface.
    pub(super) fn should_check_for_valid_landing_spot(&self, hit: &SweepHit) -> bool {
        hit.normal.y > KINDA_SMALL_NUMBER
            && (hit.normal - hit.impact_normal).norm_squared() > KINDA_SMALL_NUMBER * KINDA_SMALL_NUMBER
            && self.is_within_edge_tolerance(self.location, hit.impact_point)
    }

    /// Sweep down from `location` looking for floor.
    pub(super) fn find_floor(&self, location: Vec3) -> FloorResult {
        let reach = if self.mode.is_moving_on_ground() {
            (self.config.max_step_height + MAX_FLOOR_DIST + KINDA_SMALL_NUMBER).max(MAX_FLOOR_DIST)
        } else {
            (self.config.max_step_height - MAX_FLOOR_DIST).max(MAX_FLOOR_DIST)
        };
        let hit = self
            .world
            .sweep(&self.capsule, location, Vec3::new(0.0, -reach, 0.0), self.sweep_mode);
        if !hit.blocking {
            return FloorResult::default();
        }
        if hit.start_penetrating {
            return FloorResult {
                hit: Some(hit),
                walkable: hit.impact_normal.y >= self.config.walkable_floor_y,
                floor_dist: 0.0,
            };
        }
        FloorResult {
            hit: Some(hit),
            walkable: self.is_walkable(&hit),
            floor_dist: reach * hit.time,
        }
    }

    /// Keep the walking capsule floating inside the floor distance band.
    pub(super) fn adjust_floor_height(&mut self) {
        if !self.floor.is_walkable_floor() {
            return;
        }
        let old_dist = self.floor.floor_dist;
        if (MIN_FLOOR_DIST..=MAX_FLOOR_DIST).contains(&old_dist) {
            return;
        }
        let initial_y = self.location.y;
        let move_dist = (MIN_FLOOR_DIST + MAX_FLOOR_DIST) * 0.5 - old_dist;
        let hit = self.safe_move(Vec3::new(0.0, move_dist, 0.0));
        if !hit.is_valid_blocking_hit() {
            self.floor.floor_dist += move_dist;
        } else if move_dist > 0.0 {
            self.floor.floor_dist += self.location.y - initial_y;
        } else {
            self.floor.floor_dist = self.location.y - hit.location.y;
            if self.is_walkable(&hit) {
                self.floor.hit = Some(hit);
                self.floor.walkable = true;
            }
        }
    }

    /// Tilt a horizontal `delta` so it follows a walkable ramp.
    pub(super) fn compute_ground_movement_delta(&self, delta: Vec3, ramp_hit: Option<&SweepHit>) -> Vec3 {
        let Some(ramp) = ramp_hit else {
            return delta;
        };
        let floor_normal = ramp.impact_normal;
        if floor_normal.y < 1.0 - KINDA_SMALL_NUMBER
            && floor_normal.y > KINDA_SMALL_NUMBER
            && ramp.normal.y > KINDA_SMALL_NUMBER
            && self.is_walkable(ramp)
        {
            let floor_dot_delta = floor_normal.dot(&delta);
            return Vec3::new(delta.x, -floor_dot_delta / floor_normal.y, delta.z);
        }
        delta
    }

    /// Slide `delta` along `normal`, with the normal flattened into the vertical plane of `delta`.
    pub(super) fn compute_slide_vector(&self, delta: Vec3, time: f32, normal: Vec3) -> Vec3 {
        let normal = projected_normal(delta, normal);
        let slide = project_on_plane(delta, normal) * time;
        if self.mode.is_falling() {
            self.handle_slope_boosting(slide, delta, time, normal)
        } else {
            slide
        }
    }

    /// Never slide higher than the requested move.
    fn handle_slope_boosting(&self, slide: Vec3, delta: Vec3, time: f32, normal: Vec3) -> Vec3 {
        if slide.y <= 0.0 {
            return slide;
        }
        let y_limit = delta.y * time;
        if slide.y - y_limit <= KINDA_SMALL_NUMBER {
            return slide;
        }
        let mut result = if y_limit > 0.0 {
            slide * (y_limit / slide.y)
        } else {
            Vec3::zeros()
        };
        let remainder = slide - result;
        let remainder = Vec3::new(remainder.x, 0.0, remainder.z);
        result += project_on_plane(remainder, safe_normal_2d(normal));
        result
    }

    /// Response to hitting a second surface while sliding along the first.
    pub(super) fn two_wall_adjust(&self, delta: Vec3, hit: &SweepHit, old_hit_normal: Vec3) -> Vec3 {
        let in_delta = delta;
        let hit_normal = hit.normal;
        let mut delta = if old_hit_normal.dot(&hit_normal) <= 0.0 {
            // Corner of 90 degrees or less: move along the crease.
            let crease = safe_normal(hit_normal.cross(&old_hit_normal));
            let along = crease * (in_delta.dot(&crease) * (1.0 - hit.time));
            if in_delta.dot(&along) < 0.0 { -along } else { along }
        } else {
            let adjusted = self.compute_slide_vector(in_delta, 1.0 - hit.time, hit_normal);
            if adjusted.dot(&in_delta) <= 0.0 {
                Vec3::zeros()
            } else if (hit_normal.dot(&old_hit_normal) - 1.0).abs() < KINDA_SMALL_NUMBER {
                adjusted + hit_normal * SAME_WALL_NUDGE
            } else {
                adjusted
            }
        };

        if self.mode.is_moving_on_ground() {
            if delta.y > 0.0 {
                if self.is_walkable(hit) && hit.normal.y > KINDA_SMALL_NUMBER {
                    // Climb walkable slopes at the requested horizontal speed.
                    let time = 1.0 - hit.time;
                    let scaled = safe_normal(delta) * in_delta.norm();
                    delta = Vec3::new(in_delta.x, scaled.y / hit.normal.y, in_delta.z) * time;
                    if delta.y > self.config.max_step_height {
                        delta *= self.config.max_step_height / delta.y;
                    }
                } else {
                    delta.y = 0.0;
                }
            } else if delta.y < 0.0 && self.floor.floor_dist < MIN_FLOOR_DIST && self.floor.is_blocking() {
                delta.y = 0.0;
            }
        }
        delta
    }

    /// Keep walking bodies from being pushed up unwalkable slopes or down into their floor.
    fn compute_fixed_normal(&self, delta: Vec3, normal: Vec3, hit: &SweepHit) -> Vec3 {
        if !self.mode.is_moving_on_ground() {
            return normal;
        }
        if normal.y > 0.0 {
            if !self.is_walkable(hit) {
                return safe_normal_2d(normal);
            }
        } else if normal.y < -KINDA_SMALL_NUMBER && self.floor.floor_dist < MIN_FLOOR_DIST {
            if let Some(floor_hit) = self.floor.hit.filter(|h| h.blocking) {
                let floor_normal = floor_hit.normal;
                let opposed = delta.dot(&floor_normal) < 0.0 && floor_normal.y < 1.0 - FLAT_FLOOR_EPSILON;
                let fixed = if opposed { floor_normal } else { normal };
                return safe_normal_2d(fixed);
            }
        }
        normal
    }

    /// Slide along the surface in `hit`.
    ///
    /// Returns the share of the horizontal distance of `delta` that was covered, which callers
    /// apply to the curve coordinate. `hit` is updated to the last sweep.
    pub(super) fn slide_along_surface(&mut self, delta: Vec3, time: f32, hit: &mut SweepHit) -> f32 {
        if is_nearly_zero(delta, KINDA_SMALL_NUMBER) {
            return 0.0;
        }
        let fixed = self.compute_fixed_normal(delta, hit.normal, hit);
        let slide = self.compute_slide_vector(delta, time, fixed);
        if is_nearly_zero(slide, KINDA_SMALL_NUMBER) {
            return 0.0;
        }
        let delta_2d = size_2d(delta);
        let projection_percent = if delta_2d > KINDA_SMALL_NUMBER {
            size_2d(project_onto(slide, delta)) / delta_2d
        } else {
            0.0
        };
        self.slide_and_adjust(delta, time, hit) * projection_percent
    }

    /// Slide, then handle a second wall. Returns the share of time applied.
    fn slide_and_adjust(&mut self, delta: Vec3, time: f32, hit: &mut SweepHit) -> f32 {
        if !hit.blocking {
            return 0.0;
        }
        let normal = self.compute_fixed_normal(delta, hit.normal, hit);
        let mut slide = self.compute_slide_vector(delta, time, normal);
        if slide.dot(&delta) <= 0.0 {
            return 0.0;
        }

        *hit = self.safe_move(slide);
        let first = hit.time;
        let mut percent = first;
        if hit.is_valid_blocking_hit() {
            let first_hit = *hit;
            self.handle_impact(&first_hit);
            slide = self.two_wall_adjust(slide, hit, normal);
            if !is_nearly_zero(slide, 1.0e-3) && slide.dot(&delta) > 0.0 {
                *hit = self.safe_move(slide);
                percent += hit.time * (1.0 - first);
                if hit.blocking {
                    let second_hit = *hit;
                    self.handle_impact(&second_hit);
                }
            }
        }
        percent.clamp(0.0, 1.0)
    }

    pub(super) fn can_step_up(&self, hit: &SweepHit) -> bool {
        hit.is_valid_blocking_hit() && !hit.flags.has(SurfaceTag::NoStepUp) && !self.mode.is_falling()
    }

    /// Try to climb the obstacle in `hit` by sweeping up, forward by `delta`, then down.
    ///
    /// On failure the location and coordinate are restored.
    pub(super) fn step_up(&mut self, delta: Vec3, hit: &SweepHit) -> bool {
        if !self.can_step_up(hit) || self.config.max_step_height <= 0.0 {
            return false;
        }
        let saved_location = self.location;
        let saved_curve = self.curve.clone();
        let stepped = self.try_step_up(delta, hit);
        if !stepped {
            log::trace!("step up rejected at {:?}", hit.impact_point);
            self.location = saved_location;
            self.curve = saved_curve;
        }
        stepped
    }

    fn try_step_up(&mut self, delta: Vec3, in_hit: &SweepHit) -> bool {
        let old = self.location;
        let max_step = self.config.max_step_height;
        let initial_impact_y = in_hit.impact_point.y;
        // Something at the top of the capsule.
        if initial_impact_y > old.y + self.capsule.half_height {
            return false;
        }

        let mut up_height = max_step;
        let mut down_height = max_step;
        let mut floor_base_y = old.y - self.capsule.half_total_height();
        let mut floor_point_y = floor_base_y;
        if self.mode.is_moving_on_ground() && self.floor.is_walkable_floor() {
            let floor_dist = self.floor.floor_dist.max(0.0);
            floor_base_y -= floor_dist;
            up_height = (up_height - floor_dist).max(0.0);
            down_height = max_step + MAX_FLOOR_DIST * 2.0;
            let hit_vertical_face = !self.is_within_edge_tolerance(in_hit.location, in_hit.impact_point);
            floor_point_y = match self.floor.hit {
                Some(floor_hit) if !hit_vertical_face => floor_hit.impact_point.y,
                _ => floor_point_y - self.floor.floor_dist,
            };
        }
        if initial_impact_y <= floor_base_y {
            return false;
        }

        let up_hit = self.move_updated(Vec3::new(0.0, up_height, 0.0));
        if up_hit.start_penetrating {
            return false;
        }

        let mut hit = self.move_updated(delta);
        if hit.blocking {
            if hit.start_penetrating {
                return false;
            }
            if up_hit.blocking {
                self.handle_impact(&up_hit);
            }
            let forward_hit = hit;
            self.handle_impact(&forward_hit);
            if self.mode.is_falling() {
                return true;
            }
            let forward_time = hit.time;
            let slide = self.slide_along_surface(delta, 1.0 - hit.time, &mut hit);
            if self.mode.is_falling() {
                return false;
            }
            if forward_time == 0.0 && slide == 0.0 {
                return false;
            }
        }

        let hit = self.move_updated(Vec3::new(0.0, -down_height, 0.0));
        if hit.start_penetrating {
            return false;
        }
        if hit.is_valid_blocking_hit() {
            let delta_y = hit.impact_point.y - floor_point_y;
            if delta_y > max_step {
                return false;
            }
            if !self.is_walkable(&hit) {
                // Unwalkable and facing the move, or above where we started.
                if delta.dot(&hit.impact_normal) < 0.0 || hit.location.y > old.y {
                    return false;
                }
            }
            if !self.is_within_edge_tolerance(hit.location, hit.impact_point) {
                return false;
            }
            if delta_y > 0.0 && !self.can_step_up(&hit) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{capsule, standing_on_ground};
    use crate::{
        collision::{StaticCollider, StaticWorld, SweepHit, Vec3, ground_plane},
        config::MovementConfig,
        mover::CharacterMover,
        owner::NoCapabilities,
        state::MovementMode,
    };

    fn walking_mover() -> CharacterMover<StaticWorld, NoCapabilities> {
        let world = StaticWorld::new(vec![StaticCollider::solid(ground_plane(0.0))]);
        CharacterMover::new(MovementConfig::default(), world, NoCapabilities, capsule(), standing_on_ground(0.0, 0.0))
            .expect("valid config")
    }

    #[test]
    fn floor_below_a_standing_body_is_walkable_and_in_band() {
        let mover = walking_mover();
        assert_eq!(mover.mode(), MovementMode::Walking);
        let floor = mover.find_floor(mover.location());
        assert!(floor.is_walkable_floor());
        assert!(floor.floor_dist >= 1.9 && floor.floor_dist <= 2.4);
    }

    #[test]
    fn floor_height_is_restored_to_the_band() {
        let mut mover = walking_mover();
        mover.location.y += 20.0;
        mover.floor = mover.find_floor(mover.location);
        mover.adjust_floor_height();
        let floor = mover.find_floor(mover.location);
        assert!(floor.floor_dist >= 1.9 - 1.0e-3 && floor.floor_dist <= 2.4 + 1.0e-3);
    }

    #[test]
    fn ground_delta_follows_a_walkable_ramp() {
        let mover = walking_mover();
        let n = Vec3::new(-0.5, 1.0, 0.0).normalize();
        let mut ramp = SweepHit::clear(Vec3::zeros(), Vec3::zeros());
        ramp.blocking = true;
        ramp.normal = n;
        ramp.impact_normal = n;
        let d = mover.compute_ground_movement_delta(Vec3::new(10.0, 0.0, 0.0), Some(&ramp));
        assert!((d.x - 10.0).abs() < 1.0e-4);
        assert!((d.y - 5.0).abs() < 1.0e-3);
        assert!(d.dot(&n).abs() < 1.0e-3);
    }

    #[test]
    fn slide_vector_stays_in_the_motion_plane() {
        let mover = walking_mover();
        // Wall normal tilted out of the X/Y plane; the slide must not gain Z.
        let normal = Vec3::new(-0.6, 0.0, 0.8);
        let slide = mover.compute_slide_vector(Vec3::new(10.0, -2.0, 0.0), 1.0, normal);
        assert!(slide.z.abs() < 1.0e-4);
        assert!(slide.x.abs() < 1.0e-4);
    }

    #[test]
    fn edge_tolerance_rejects_the_rim() {
        let mover = walking_mover();
        let center = Vec3::zeros();
        assert!(mover.is_within_edge_tolerance(center, Vec3::new(10.0, -50.0, 0.0)));
        assert!(!mover.is_within_edge_tolerance(center, Vec3::new(29.9, -50.0, 0.0)));
    }
}

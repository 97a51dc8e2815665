//! Commands issued by gameplay code between ticks.

use std::sync::Arc;

use super::CharacterMover;
use crate::{
    collision::{CollisionWorld, SweepHit, Vec3},
    constants::{COORDINATE_ASSIGN_TOLERANCE, KINDA_SMALL_NUMBER},
    curve::{AdvanceOutcome, Curve, CurvePosition},
    math::{dot_2d, safe_normal, sign, size_2d, to_planar},
    owner::MovementOwner,
    state::{FloorResult, MovementMode, RootMotionDesc, SwingState},
};

impl<W: CollisionWorld, O: MovementOwner> CharacterMover<W, O> {
    /// Bind to `curve` at `distance`.
    pub fn set_curve(&mut self, curve: Arc<dyn Curve>, distance: f32) {
        self.set_curve_position(CurvePosition::new(curve, distance));
    }

    /// Replace the curve position. Passing an unbound position switches to off-curve movement.
    pub fn set_curve_position(&mut self, position: CurvePosition) {
        if let Some(point) = position.location_2d() {
            let error = (to_planar(self.location) - point).norm();
            if error > COORDINATE_ASSIGN_TOLERANCE {
                log::warn!("curve position assigned {error} away from the body at {:?}", self.location);
            }
        } else if self.curve.is_valid() {
            log::warn!("curve unbound, moving off-curve from {:?}", self.location);
        }
        self.curve = position;
    }

    /// Move the coordinate without moving the body.
    pub fn advance_coordinate(&mut self, delta: f32) -> AdvanceOutcome {
        self.curve.advance(delta)
    }

    /// Re-derive the coordinate from the curve point nearest to `point`. The body stays put.
    pub fn set_coordinate(&mut self, point: Vec3) {
        self.curve.set_distance_from_world_location(point);
    }

    /// Place the body at `location` without sweeping and resync the coordinate.
    pub fn teleport(&mut self, location: Vec3) {
        log::debug!("teleport {:?} -> {location:?}", self.location);
        self.location = location;
        self.just_teleported = true;
        if self.curve.is_valid() {
            self.curve.set_distance_from_world_location(location);
        }
        self.floor = FloorResult::default();
        if self.mode.is_moving_on_ground() {
            self.floor = self.find_floor(self.location);
        }
    }

    /// Enter swing mode around `center`. `input_force` is the acceleration lateral input adds.
    pub fn start_swinging(&mut self, center: Vec3, input_force: f32) {
        self.set_movement_mode(MovementMode::SWING);
        self.swing = SwingState {
            center,
            arm_length: self.config.clamp_swing_arm((self.location - center).norm()),
            arm_delta: 0.0,
            input_force,
            input: Vec3::zeros(),
            is_forward: false,
        };
    }

    pub fn is_point_in_swing_reach(&self, center: Vec3) -> bool {
        (center - self.location).norm() < self.config.swing_arm_max
    }

    /// Lengthen (positive) or shorten the swing arm on the next substep.
    pub fn add_swing_arm_delta(&mut self, delta: f32) {
        self.swing.arm_delta += delta;
    }

    /// Slide down along the curve away from a slope with the given normal.
    pub fn start_sliding(&mut self, slope_normal: Vec3, speed_modifier: f32) {
        let mut dir = self.curve.direction_2d();
        if dot_2d(dir, slope_normal) <= 0.0 {
            dir = -dir;
        }
        self.velocity = dir * (self.config.max_walk_speed * speed_modifier);
    }

    /// Launch with `along_curve` speed along the tangent and `vertical` speed.
    ///
    /// A downward push on the floor bounces if the owner allows it, an upward one lifts off.
    pub fn push(&mut self, along_curve: f32, vertical: f32) {
        let along = self.curve.direction() * along_curve;
        self.velocity = Vec3::new(along.x, vertical, along.z);
        if self.mode != MovementMode::Walking {
            return;
        }
        if self.velocity.y < -KINDA_SMALL_NUMBER {
            if let Some(params) = self.owner.should_bounce_on_hit(None) {
                self.velocity.y *= -params.damping.clamp(0.0, 1.0);
            }
        }
        if self.velocity.y > KINDA_SMALL_NUMBER {
            self.set_movement_mode(MovementMode::Falling);
        }
    }

    /// Sweep `distance` along `direction`, keeping the result on the curve.
    pub fn dash(&mut self, direction: Vec3, distance: f32) -> SweepHit {
        let on_curve = self.curve.is_valid();
        let old_curve = self.curve.clone();
        let arc = size_2d(direction) * distance * self.curve.direction_modifier(direction);
        self.curve.advance(arc);

        let mut delta = if on_curve {
            self.curve.to_world(0.0) - self.location
        } else {
            direction * distance
        };
        delta.y = direction.y * distance;

        let hit = self.safe_move(delta);
        if hit.blocking && on_curve {
            self.curve = old_curve.offset(arc * hit.time);
        }
        hit
    }

    /// Force the falling vertical speed to `value` every substep, or restore gravity with `None`.
    pub fn set_vertical_velocity_override(&mut self, value: Option<f32>) {
        self.fall_velocity_override = value;
    }

    pub fn set_root_motion_descriptor(&mut self, desc: RootMotionDesc) {
        self.root_motion_desc = Some(desc);
    }

    pub fn clear_root_motion_descriptor(&mut self) {
        self.root_motion_desc = None;
    }

    /// Claim a wall-jump missed within the grace window.
    pub fn try_late_wall_jump(&mut self) -> bool {
        let Some(memory) = self.wall_jump.take_late_wall_jump(self.clock) else {
            return false;
        };
        log::debug!("late wall jump {:.3}s after the miss", self.clock - memory.missed_time);
        self.velocity = memory.missed_velocity;
        self.owner.on_bounce(
            true,
            self.wall_jump.last_roll,
            memory.missed_impact_offset + self.location,
            memory.missed_impact_normal,
        );
        true
    }

    pub fn toggle_late_wall_jump(&mut self) {
        self.wall_jump.late_enabled = !self.wall_jump.late_enabled;
        log::warn!("late wall jump enabled: {}", self.wall_jump.late_enabled);
    }

    pub fn set_late_wall_jump_interval(&mut self, seconds: f32) {
        self.wall_jump.late_interval = seconds.max(0.0);
        log::warn!("late wall jump interval set to {}", self.wall_jump.late_interval);
    }

    /// Shift the body by `offset` along the tangent, oriented toward `direction`.
    ///
    /// With `sweep` the move stops at the first blocker and the hit is returned.
    pub fn add_offset_on_curve(&mut self, offset: f32, direction: Vec3, sweep: bool) -> Option<SweepHit> {
        let dir = self.curve.direction();
        let offset = offset * sign(dir.dot(&direction));
        let delta = dir * offset;
        if sweep {
            let hit = self.move_updated(delta);
            let applied = if hit.blocking { offset * hit.time } else { offset };
            self.curve.advance(applied);
            Some(hit)
        } else {
            self.location += delta;
            self.curve.advance(offset);
            None
        }
    }

    /// Carry the body with a moving base by `base_delta`.
    pub fn update_based_movement(&mut self, base_delta: Vec3) {
        let old_location = self.location;
        self.move_updated(base_delta);
        let moved = self.location - old_location;
        let moved_2d = size_2d(moved);
        if moved_2d <= KINDA_SMALL_NUMBER {
            return;
        }
        let dir = safe_normal(self.curve.direction());
        self.curve.advance(sign(safe_normal(moved).dot(&dir)) * moved_2d);
    }

    /// `location` snapped horizontally onto the curve, keeping its height.
    pub fn constrain_location_to_plane(&self, location: Vec3) -> Vec3 {
        match self.curve.curve() {
            Some(curve) => {
                let p = curve.position_at(curve.nearest_distance(location));
                Vec3::new(p.x, location.y, p.z)
            }
            None => location,
        }
    }

    /// Re-probe the floor, adjusting height when a rising floor outruns the body.
    pub fn force_update_floor(&mut self, floor_velocity_y: f32) {
        self.floor = self.find_floor(self.location);
        if self.floor.is_blocking() && floor_velocity_y > self.velocity.y {
            self.adjust_floor_height();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{
        RecordingOwner, capsule, coordinate_of, on_straight_curve, standing_on_ground, straight_curve,
    };
    use crate::{
        collision::{StaticCollider, StaticWorld, Vec3, cuboid_at, ground_plane},
        config::MovementConfig,
        mover::CharacterMover,
        owner::BounceParams,
        state::MovementMode,
    };

    fn grounded(colliders: Vec<StaticCollider>) -> CharacterMover<StaticWorld, RecordingOwner> {
        let mut all = vec![StaticCollider::solid(ground_plane(0.0))];
        all.extend(colliders);
        let mut mover = CharacterMover::new(
            MovementConfig::default(),
            StaticWorld::new(all),
            RecordingOwner::default(),
            capsule(),
            standing_on_ground(0.0, 0.0),
        )
        .expect("valid config");
        mover.set_curve(straight_curve(), coordinate_of(0.0));
        mover
    }

    #[test]
    fn upward_push_lifts_off() {
        let mut mover = grounded(Vec::new());
        assert_eq!(mover.mode(), MovementMode::Walking);
        mover.push(-150.0, 400.0);
        assert_eq!(mover.mode(), MovementMode::Falling);
        assert_eq!(mover.velocity(), Vec3::new(-150.0, 400.0, 0.0));
    }

    #[test]
    fn downward_push_bounces_when_allowed() {
        let mut mover = grounded(Vec::new());
        mover.owner_mut().bounce = Some(BounceParams::with_damping(0.5));
        mover.push(0.0, -200.0);
        assert_eq!(mover.velocity().y, 100.0);
        assert_eq!(mover.mode(), MovementMode::Falling);

        let mut stubborn = grounded(Vec::new());
        stubborn.push(0.0, -200.0);
        assert_eq!(stubborn.mode(), MovementMode::Walking);
    }

    #[test]
    fn dash_into_a_wall_credits_only_the_applied_distance() {
        // Wall face at x = 100.
        let wall = StaticCollider::solid(cuboid_at(Vec3::new(10.0, 200.0, 200.0), Vec3::new(110.0, 200.0, 0.0)));
        let mut mover = grounded(vec![wall]);
        let hit = mover.dash(Vec3::new(1.0, 0.0, 0.0), 200.0);
        assert!(hit.blocking);
        let x = mover.location().x;
        assert!(x < 70.0 && x > 69.0);
        assert!((mover.curve().distance() - coordinate_of(x)).abs() < 0.05);
    }

    #[test]
    fn dash_in_the_open_goes_the_full_distance() {
        let mut mover = grounded(Vec::new());
        let hit = mover.dash(Vec3::new(-1.0, 0.0, 0.0), 150.0);
        assert!(!hit.blocking);
        assert!((mover.location().x + 150.0).abs() < 1.0e-3);
        assert!((mover.curve().distance() - coordinate_of(-150.0)).abs() < 1.0e-3);
    }

    #[test]
    fn offset_on_curve_follows_requested_direction() {
        let mut mover = grounded(Vec::new());
        assert!(mover.add_offset_on_curve(25.0, Vec3::new(-1.0, 0.0, 0.0), false).is_none());
        assert!((mover.location().x + 25.0).abs() < 1.0e-4);
        assert!((mover.curve().distance() - coordinate_of(-25.0)).abs() < 1.0e-4);

        let hit = mover.add_offset_on_curve(25.0, Vec3::new(1.0, 0.0, 0.0), true);
        assert!(hit.is_some_and(|h| !h.blocking));
        assert!(mover.location().x.abs() < 1.0e-3);
    }

    #[test]
    fn based_movement_moves_the_coordinate() {
        let mut mover = grounded(Vec::new());
        mover.update_based_movement(Vec3::new(-12.0, 0.0, 0.0));
        assert!((mover.curve().distance() - coordinate_of(-12.0)).abs() < 1.0e-3);
    }

    #[test]
    fn location_is_snapped_onto_the_curve_plane() {
        let mover = grounded(Vec::new());
        let snapped = mover.constrain_location_to_plane(Vec3::new(40.0, 77.0, 35.0));
        assert!((snapped - Vec3::new(40.0, 77.0, 0.0)).norm() < 1.0e-4);
    }

    #[test]
    fn sliding_heads_downhill() {
        let mut mover = grounded(Vec::new());
        mover.start_sliding(Vec3::new(-0.5, 0.8, 0.0), 0.5);
        assert!((mover.velocity() - Vec3::new(-250.0, 0.0, 0.0)).norm() < 1.0e-3);
    }

    #[test]
    fn swing_reach_uses_the_max_arm() {
        let mover = grounded(Vec::new());
        let here = mover.location();
        assert!(mover.is_point_in_swing_reach(here + Vec3::new(0.0, 350.0, 0.0)));
        assert!(!mover.is_point_in_swing_reach(here + Vec3::new(0.0, 450.0, 0.0)));
    }

    #[test]
    fn teleport_resyncs_the_coordinate() {
        let mut mover = grounded(Vec::new());
        mover.teleport(standing_on_ground(321.0, 0.0));
        assert!((mover.curve().distance() - coordinate_of(321.0)).abs() < 1.0e-3);
        assert!(mover.floor().is_walkable_floor());
    }

    #[test]
    fn coordinate_follows_a_world_point() {
        let mut mover = grounded(Vec::new());
        mover.set_coordinate(Vec3::new(-64.0, 500.0, 30.0));
        assert!((mover.curve().distance() - coordinate_of(-64.0)).abs() < 1.0e-3);
        assert!(mover.location().x.abs() < 1.0e-4);
    }

    #[test]
    fn late_wall_jump_interval_can_be_tuned() {
        let mut mover = grounded(Vec::new());
        mover.set_late_wall_jump_interval(0.3);
        assert_eq!(mover.wall_jump().late_interval, 0.3);
        mover.toggle_late_wall_jump();
        assert!(!mover.wall_jump().late_enabled);
        assert!(!mover.try_late_wall_jump());
    }

    #[test]
    fn assigning_a_curve_between_ticks_does_not_notify() {
        let mut mover = grounded(Vec::new());
        mover.set_curve_position(on_straight_curve(0.0));
        assert_eq!(mover.owner().curve_changes, 0);
    }
}

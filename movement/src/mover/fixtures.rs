//! Shared test scaffolding for the mover.

use std::sync::Arc;

use super::CharacterMover;
use crate::{
    collision::{CapsuleSpec, CollisionWorld, StaticWorld, SweepHit, SweepMode, Vec3},
    config::MovementConfig,
    curve::{ArcCurve, Curve, CurvePosition, PolylineCurve},
    owner::{BounceParams, MovementOwner, NoCapabilities, RecoveryTargetId},
    state::MovementMode,
};

pub fn capsule() -> CapsuleSpec {
    CapsuleSpec::new(30.0, 50.0)
}

/// Capsule center resting in the middle of the floor band above a ground at `ground_y`.
pub fn standing_on_ground(x: f32, ground_y: f32) -> Vec3 {
    Vec3::new(x, ground_y + capsule().half_total_height() + 2.15, 0.0)
}

/// A straight curve along +X from -1000 to 1000.
pub fn straight_curve() -> Arc<dyn Curve> {
    Arc::new(PolylineCurve::new(vec![
        Vec3::new(-1000.0, 0.0, 0.0),
        Vec3::new(1000.0, 0.0, 0.0),
    ]))
}

/// Coordinate of world X on [`straight_curve`].
pub fn coordinate_of(x: f32) -> f32 {
    x + 1000.0
}

pub fn on_straight_curve(x: f32) -> CurvePosition {
    CurvePosition::new(straight_curve(), coordinate_of(x))
}

/// Half circle of radius 200 around the origin, starting on +X and turning toward +Z.
pub fn half_circle() -> Arc<dyn Curve> {
    Arc::new(ArcCurve::new(Vec3::zeros(), 200.0, 0.0, std::f32::consts::PI))
}

/// Component of `v` across the curve tangent, in the horizontal plane.
pub fn off_tangent(v: Vec3, position: &CurvePosition) -> f32 {
    let t = position.direction_2d();
    (v.x * t.z - v.z * t.x).abs()
}

pub fn empty_mover(config: MovementConfig) -> CharacterMover<StaticWorld, NoCapabilities> {
    CharacterMover::new(config, StaticWorld::new(Vec::new()), NoCapabilities, capsule(), Vec3::zeros())
        .expect("valid config")
}

/// Owner that records callbacks and grants configurable abilities.
#[derive(Debug, Default)]
pub struct RecordingOwner {
    pub bounce: Option<BounceParams>,
    pub allow_wall_jump: bool,
    pub refuse_landing: bool,
    pub bounces: Vec<(bool, f32)>,
    pub landings: u32,
    pub kills: u32,
    pub crushes: Vec<(f32, RecoveryTargetId)>,
    pub modes: Vec<MovementMode>,
    pub curve_changes: u32,
}

impl MovementOwner for RecordingOwner {
    fn should_bounce_on_hit(&mut self, _hit: Option<&SweepHit>) -> Option<BounceParams> {
        self.bounce
    }

    fn on_bounce(&mut self, wall_jump: bool, stored_direction: f32, _impact_point: Vec3, _impact_normal: Vec3) {
        self.bounces.push((wall_jump, stored_direction));
    }

    fn on_pre_landed(&mut self, _hit: &SweepHit) -> bool {
        !self.refuse_landing
    }

    fn on_landed(&mut self, _hit: &SweepHit) {
        self.landings += 1;
    }

    fn can_perform_wall_jump(&mut self, _hit: &SweepHit) -> bool {
        self.allow_wall_jump
    }

    fn on_movement_mode_changed(&mut self, _previous: MovementMode, current: MovementMode) {
        self.modes.push(current);
    }

    fn on_curve_changed(&mut self, _previous: &CurvePosition, _current: &CurvePosition) {
        self.curve_changes += 1;
    }

    fn on_crushed(&mut self, damage: f32, target: RecoveryTargetId) {
        self.crushes.push((damage, target));
    }

    fn kill(&mut self) {
        self.kills += 1;
    }
}

/// World in which the capsule is wedged: every sweep starts penetrating and every
/// overlap test succeeds.
#[derive(Debug, Default)]
pub struct JammedWorld;

impl CollisionWorld for JammedWorld {
    fn sweep(&self, _capsule: &CapsuleSpec, start: Vec3, delta: Vec3, _mode: SweepMode) -> SweepHit {
        let mut hit = SweepHit::clear(start, delta);
        hit.blocking = true;
        hit.start_penetrating = true;
        hit.time = 0.0;
        hit.location = start;
        hit.normal = Vec3::new(0.0, 1.0, 0.0);
        hit.impact_normal = hit.normal;
        hit.impact_point = start;
        hit.penetration_depth = 5.0;
        hit
    }

    fn overlaps(&self, _capsule: &CapsuleSpec, _pos: Vec3, _inflation: f32) -> bool {
        true
    }
}

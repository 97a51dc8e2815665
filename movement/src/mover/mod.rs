/*!
The curve-constrained character mover.

[`CharacterMover`] owns the body state (location, velocity, curve coordinate,
mode) and advances it once per frame with [`CharacterMover::tick`]. Each tick
dispatches to one stepper per mode:

- walking:     floor movement along the curve with ramps and step-ups
- falling:     gravity, air control, landing, bounce and wall-jump
- flying:      free vertical motion without gravity
- swing:       pendulum around a fixed center
- swimming:    handed off to the owner, no integration here

Steppers share the collision helpers in `surface` and the penetration and
stuck-recovery logic in `penetration`. When the curve handle is unbound every
stepper falls back to plain unconstrained movement (swing becomes a no-op).
*/

mod commands;
mod falling;
mod flying;
mod penetration;
mod surface;
mod swing;
mod velocity;
mod walking;

#[cfg(test)]
mod fixtures;

use anyhow::Result;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    bounce::WallJumpState,
    collision::{CapsuleSpec, CollisionWorld, SweepHit, SweepMode, Vec3},
    config::MovementConfig,
    constants::MIN_TICK_TIME,
    curve::CurvePosition,
    math::{safe_normal_2d, size_2d, size_sq_2d, with_planar},
    owner::MovementOwner,
    state::{FloorResult, MovementInput, MovementMode, RootMotionDesc, StuckState, SwingState},
};

pub struct CharacterMover<W: CollisionWorld, O: MovementOwner> {
    config: MovementConfig,
    world: W,
    owner: O,
    capsule: CapsuleSpec,

    location: Vec3,
    velocity: Vec3,
    acceleration: Vec3,
    /// Horizontal unit facing.
    facing: Vec3,
    curve: CurvePosition,
    mode: MovementMode,
    suppress_default_mode: bool,
    floor: FloorResult,

    swing: SwingState,
    wall_jump: WallJumpState,
    stuck: StuckState,

    root_motion_desc: Option<RootMotionDesc>,
    /// Root motion drives velocity during the current tick.
    has_root_motion: bool,
    fall_velocity_override: Option<f32>,

    /// Per-step guard for the reverse floor move after a floor bounce.
    roll_hit_this_frame: bool,
    just_teleported: bool,
    sweep_mode: SweepMode,

    clock: f64,
    rng: StdRng,
}

impl<W: CollisionWorld, O: MovementOwner> CharacterMover<W, O> {
    /// Build a mover and pick the initial mode from the floor below `location`.
    pub fn new(
        config: MovementConfig,
        world: W,
        owner: O,
        capsule: CapsuleSpec,
        location: Vec3,
    ) -> Result<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.rng_seed);
        let wall_jump = WallJumpState::new(&config);
        let mut mover = Self {
            config,
            world,
            owner,
            capsule,
            location,
            velocity: Vec3::zeros(),
            acceleration: Vec3::zeros(),
            facing: Vec3::new(1.0, 0.0, 0.0),
            curve: CurvePosition::unbound(),
            mode: MovementMode::Falling,
            suppress_default_mode: false,
            floor: FloorResult::default(),
            swing: SwingState::default(),
            wall_jump,
            stuck: StuckState::default(),
            root_motion_desc: None,
            has_root_motion: false,
            fall_velocity_override: None,
            roll_hit_this_frame: false,
            just_teleported: false,
            sweep_mode: SweepMode::IgnoreDepartingOverlaps,
            clock: 0.0,
            rng,
        };
        mover.set_default_movement_mode();
        Ok(mover)
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn owner(&self) -> &O {
        &self.owner
    }

    pub fn owner_mut(&mut self) -> &mut O {
        &mut self.owner
    }

    pub fn capsule(&self) -> CapsuleSpec {
        self.capsule
    }

    pub fn location(&self) -> Vec3 {
        self.location
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn acceleration(&self) -> Vec3 {
        self.acceleration
    }

    pub fn facing(&self) -> Vec3 {
        self.facing
    }

    pub fn curve(&self) -> &CurvePosition {
        &self.curve
    }

    pub fn mode(&self) -> MovementMode {
        self.mode
    }

    pub fn floor(&self) -> &FloorResult {
        &self.floor
    }

    pub fn swing(&self) -> &SwingState {
        &self.swing
    }

    pub fn wall_jump(&self) -> &WallJumpState {
        &self.wall_jump
    }

    pub fn stuck(&self) -> &StuckState {
        &self.stuck
    }

    /// World time in seconds, advanced by every tick.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Advance the body by one frame.
    pub fn tick(&mut self, dt: f32, input: &MovementInput) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.clock += f64::from(dt);
        let previous_curve = self.curve.clone();

        self.roll_hit_this_frame = false;
        self.wall_jump.jumped_this_frame = false;
        if self.mode == MovementMode::SWING {
            self.swing.input = input.lateral;
        }

        self.acceleration = self.scaled_input_acceleration(input.lateral);
        self.has_root_motion = self.root_motion_desc.is_some() && input.root_motion.is_some();
        if let Some(delta) = input.root_motion.filter(|_| self.has_root_motion) {
            self.velocity = self.calc_root_motion_velocity(delta, dt);
        }

        self.start_new_physics(dt, 0);
        self.has_root_motion = false;

        if self.mode == MovementMode::Walking && size_2d(self.velocity) > self.config.max_walk_speed {
            let capped = safe_normal_2d(self.velocity) * self.config.max_walk_speed;
            self.velocity = with_planar(self.velocity, capped);
        }
        self.align_velocity_to_curve();
        self.update_facing();

        if !previous_curve.same_curve(&self.curve) {
            log::debug!("bound curve changed");
            self.owner.on_curve_changed(&previous_curve, &self.curve);
        }

        self.resolve_pushed_and_stuck();
    }

    /// Dispatch `dt` to the stepper of the current mode.
    fn start_new_physics(&mut self, dt: f32, iterations: u32) {
        if dt < MIN_TICK_TIME || iterations >= self.config.max_simulation_iterations {
            return;
        }
        match self.mode {
            MovementMode::Walking => self.phys_walking(dt, iterations),
            MovementMode::Falling => self.phys_falling(dt, iterations),
            MovementMode::Flying => self.phys_flying(dt, iterations),
            MovementMode::Swimming => {}
            MovementMode::Custom(_) => self.phys_swing(dt, iterations),
        }
    }

    /// Length of the next substep.
    fn simulation_time_step(&self, remaining: f32, iterations: u32) -> f32 {
        let max_step = self.config.max_simulation_time_step;
        let mut step = remaining;
        if remaining > max_step && iterations < self.config.max_simulation_iterations {
            step = max_step.min(remaining * 0.5);
        }
        step.max(MIN_TICK_TIME)
    }

    pub fn set_movement_mode(&mut self, mode: MovementMode) {
        if mode == self.mode {
            return;
        }
        let previous = self.mode;
        self.mode = mode;
        log::debug!("movement mode {previous:?} -> {mode:?}");

        if mode.is_moving_on_ground() {
            self.velocity.y = 0.0;
            self.floor = self.find_floor(self.location);
            self.adjust_floor_height();
        } else {
            self.floor = FloorResult::default();
        }
        if previous == MovementMode::SWING {
            self.swing = SwingState::default();
        }
        self.owner.on_movement_mode_changed(previous, mode);
    }

    /// Walk if there is walkable floor below, fall otherwise.
    pub fn set_default_movement_mode(&mut self) {
        if self.suppress_default_mode {
            return;
        }
        let floor = self.find_floor(self.location);
        if floor.is_walkable_floor() {
            self.set_movement_mode(MovementMode::Walking);
        } else {
            self.set_movement_mode(MovementMode::Falling);
            self.floor = floor;
        }
    }

    pub fn set_suppress_default_mode(&mut self, suppress: bool) {
        self.suppress_default_mode = suppress;
    }

    /// Land on `hit` unless the owner refuses, then spend the rest of the time in the new mode.
    ///
    /// A refused landing on the curve bounces off the floor when the owner allows bouncing.
    fn process_landed(&mut self, hit: &SweepHit, remaining: f32, iterations: u32) {
        if self.owner.on_pre_landed(hit) {
            self.owner.on_landed(hit);
            self.set_movement_mode(MovementMode::Walking);
        } else if self.curve.is_valid() {
            if let Some(params) = self.owner.should_bounce_on_hit(Some(hit)) {
                self.bounce_off(hit, params);
            }
        }
        self.start_new_physics(remaining, iterations);
    }

    fn max_speed(&self) -> f32 {
        match self.mode {
            MovementMode::Flying => self.config.max_fly_speed,
            MovementMode::Swimming => self.config.max_swim_speed,
            _ => self.config.max_walk_speed,
        }
    }

    fn gravity(&self) -> Vec3 {
        Vec3::new(0.0, self.config.gravity_y, 0.0)
    }

    fn root_motion_vertical(&self) -> bool {
        self.has_root_motion && self.root_motion_desc.is_some_and(|d| d.vertical)
    }

    /// Force the horizontal velocity onto the tangent, keeping its speed and sign.
    fn align_velocity_to_curve(&mut self) {
        if !self.curve.is_valid() {
            return;
        }
        let along = self.curve.direction_from_vector(self.velocity) * size_2d(self.velocity);
        self.velocity = with_planar(self.velocity, along);
    }

    fn update_facing(&mut self) {
        if size_sq_2d(self.velocity) <= 1.0 {
            return;
        }
        let facing = match (self.config.orient_to_movement, self.curve.is_valid()) {
            (true, true) => self.curve.direction_from_vector(self.velocity),
            (true, false) => safe_normal_2d(self.velocity),
            (false, true) => self.curve.direction_from_vector(self.facing),
            (false, false) => self.facing,
        };
        if facing != Vec3::zeros() {
            self.facing = facing;
        }
    }
}

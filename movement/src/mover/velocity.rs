use super::CharacterMover;
use crate::{
    collision::{CollisionWorld, SweepHit, Vec3},
    constants::{BRAKE_TO_STOP_VELOCITY, KINDA_SMALL_NUMBER, MAX_BRAKING_TIME_STEP, MIN_TICK_TIME, VERTICAL_SLOPE_NORMAL_Y},
    math::{project_on_plane, safe_normal, safe_normal_2d, size_2d, size_sq_2d, with_planar},
    owner::MovementOwner,
    state::MovementMode,
};

/// Speeds within 1% over the limit still count as "at" the limit.
const OVER_MAX_SPEED_TOLERANCE_SQ: f32 = 1.01;

impl<W: CollisionWorld, O: MovementOwner> CharacterMover<W, O> {
    /// Input scaled to an acceleration, with the horizontal part laid on the tangent.
    pub(super) fn scaled_input_acceleration(&self, lateral: Vec3) -> Vec3 {
        let mut input = lateral;
        if !matches!(self.mode, MovementMode::Flying | MovementMode::Swimming) {
            input.y = 0.0;
        }
        let len = input.norm();
        if len > 1.0 {
            input /= len;
        }
        if self.curve.is_valid() {
            let along = self.curve.direction_from_vector(input) * size_2d(input);
            input = with_planar(input, along);
        }
        input * self.config.max_acceleration
    }

    fn is_exceeding_max_speed(&self, max_speed: f32) -> bool {
        let max_speed = max_speed.max(0.0);
        self.velocity.norm_squared() > max_speed * max_speed * OVER_MAX_SPEED_TOLERANCE_SQ
    }

    /// Friction, braking and input acceleration for one substep.
    pub(super) fn calc_velocity(&mut self, dt: f32, friction: f32, braking_deceleration: f32) {
        if self.has_root_motion || dt < MIN_TICK_TIME {
            return;
        }
        let friction = friction.max(0.0);
        let max_speed = self.max_speed();
        let zero_acceleration = self.acceleration == Vec3::zeros();
        let exceeding = self.is_exceeding_max_speed(max_speed);

        if zero_acceleration || exceeding {
            let old_velocity = self.velocity;
            self.apply_velocity_braking(dt, friction, braking_deceleration);
            // Braking may not undercut max speed while still accelerating along the old velocity.
            if exceeding
                && self.velocity.norm_squared() < max_speed * max_speed
                && self.acceleration.dot(&old_velocity) > 0.0
            {
                self.velocity = safe_normal(old_velocity) * max_speed;
            }
        } else {
            // Friction turns the velocity toward the acceleration.
            let accel_dir = safe_normal(self.acceleration);
            let speed = self.velocity.norm();
            self.velocity -= (self.velocity - accel_dir * speed) * (dt * friction).min(1.0);
        }

        if !zero_acceleration {
            let new_max = if self.is_exceeding_max_speed(max_speed) {
                self.velocity.norm()
            } else {
                max_speed
            };
            self.velocity += self.acceleration * dt;
            let speed = self.velocity.norm();
            if speed > new_max && speed > 0.0 {
                self.velocity *= new_max / speed;
            }
        }
    }

    /// Slow `velocity` by friction plus a constant deceleration, never reversing it.
    pub(super) fn apply_velocity_braking(&mut self, dt: f32, friction: f32, braking_deceleration: f32) {
        if self.velocity == Vec3::zeros() || self.has_root_motion || dt < MIN_TICK_TIME {
            return;
        }
        let friction = friction * self.config.braking_friction_factor.max(0.0);
        let braking = braking_deceleration.max(0.0);
        let zero_friction = friction == 0.0;
        let zero_braking = braking == 0.0;
        if zero_friction && zero_braking {
            return;
        }

        let old_velocity = self.velocity;
        let reverse_accel = if zero_braking {
            Vec3::zeros()
        } else {
            safe_normal(self.velocity) * -braking
        };
        let mut remaining = dt;
        while remaining >= MIN_TICK_TIME {
            let step = if remaining > MAX_BRAKING_TIME_STEP && !zero_friction {
                MAX_BRAKING_TIME_STEP.min(remaining * 0.5)
            } else {
                remaining
            };
            remaining -= step;
            self.velocity += (self.velocity * -friction + reverse_accel) * step;
            if self.velocity.dot(&old_velocity) <= 0.0 {
                self.velocity = Vec3::zeros();
                return;
            }
        }

        let speed_sq = self.velocity.norm_squared();
        if speed_sq <= KINDA_SMALL_NUMBER
            || (!zero_braking && speed_sq <= BRAKE_TO_STOP_VELOCITY * BRAKE_TO_STOP_VELOCITY)
        {
            self.velocity = Vec3::zeros();
        }
    }

    /// Gravity step clamped to terminal speed along the gravity direction.
    pub(super) fn new_fall_velocity(&self, velocity: Vec3, dt: f32) -> Vec3 {
        let gravity = self.gravity();
        let mut result = velocity;
        if dt > 0.0 {
            result += gravity * dt;
            let gravity_dir = safe_normal(gravity);
            let terminal = self.config.terminal_velocity.abs();
            if gravity_dir != Vec3::zeros() && result.dot(&gravity_dir) > terminal {
                result = project_on_plane(result, gravity_dir) + gravity_dir * terminal;
            }
        }
        result
    }

    /// Horizontal acceleration allowed while airborne.
    pub(super) fn falling_lateral_acceleration(&self) -> Vec3 {
        if self.has_root_motion {
            return Vec3::zeros();
        }
        let mut accel = Vec3::new(self.acceleration.x, 0.0, self.acceleration.z);
        if size_sq_2d(accel) > 0.0 {
            accel *= self.air_control();
            let max = self.config.max_acceleration;
            if accel.norm() > max {
                accel = safe_normal(accel) * max;
            }
        }
        accel
    }

    fn air_control(&self) -> f32 {
        let config = &self.config;
        let threshold = config.air_control_boost_velocity_threshold;
        if size_sq_2d(self.velocity) < threshold * threshold {
            (config.air_control_boost_multiplier * config.air_control).min(1.0)
        } else {
            config.air_control
        }
    }

    /// Stop air control from pushing into a steep surface the body just hit.
    pub(super) fn limit_air_control(&self, accel: Vec3, hit: &SweepHit) -> Vec3 {
        if hit.is_valid_blocking_hit() && hit.normal.y > VERTICAL_SLOPE_NORMAL_Y {
            if accel.dot(&hit.normal) < 0.0 {
                let normal_2d = safe_normal_2d(hit.normal);
                return project_on_plane(accel, normal_2d);
            }
        } else if hit.start_penetrating {
            return if accel.dot(&hit.normal) > 0.0 { accel } else { Vec3::zeros() };
        }
        accel
    }

    /// Braking applied to airborne horizontal motion.
    pub(super) fn falling_braking_deceleration(&self) -> f32 {
        let config = &self.config;
        if config.slow_down_to_max_walk_speed_in_fall && size_2d(self.velocity) > config.max_walk_speed {
            config.braking_deceleration_falling_over_max_walk
        } else {
            config.braking_deceleration_falling
        }
    }

    /// Velocity that carries out the root-motion displacement `delta` over `dt`.
    ///
    /// Axes the active descriptor does not drive keep the current velocity.
    pub fn calc_root_motion_velocity(&self, delta: Vec3, dt: f32) -> Vec3 {
        let desc = self.root_motion_desc.unwrap_or_default();
        let mut velocity = if dt > KINDA_SMALL_NUMBER {
            delta / dt * desc.multiplier * self.config.root_motion_scale
        } else {
            self.velocity
        };
        if self.curve.is_valid() {
            let along = self.curve.direction_from_vector(velocity) * size_2d(velocity);
            velocity = with_planar(velocity, along);
        }
        if !desc.vertical {
            velocity.y = self.velocity.y;
        }
        if !desc.horizontal {
            velocity.x = self.velocity.x;
            velocity.z = self.velocity.z;
        }
        velocity
    }
}

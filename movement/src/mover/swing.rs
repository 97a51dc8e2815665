use super::CharacterMover;
use crate::{
    collision::{CollisionWorld, Vec3},
    constants::{KINDA_SMALL_NUMBER, MIN_TICK_TIME, SWING_INPUT_COS_THRESHOLD},
    math::{dot_2d, project_onto, safe_normal, size_2d, with_planar},
    owner::MovementOwner,
};

impl<W: CollisionWorld, O: MovementOwner> CharacterMover<W, O> {
    /// Pendulum around the swing center, confined to the curve's vertical plane.
    pub(super) fn phys_swing(&mut self, dt: f32, mut iterations: u32) {
        if dt < MIN_TICK_TIME || !self.curve.is_valid() {
            return;
        }

        let mut remaining = dt;
        while remaining >= MIN_TICK_TIME && iterations < self.config.max_simulation_iterations {
            iterations += 1;
            let tick = self.simulation_time_step(remaining, iterations);
            remaining -= tick;

            let old_location = self.location;
            let center = self.swing.center;
            let radial = old_location - center;
            let arm = self.config.clamp_swing_arm(radial.norm() + self.swing.arm_delta);
            self.swing.arm_delta = 0.0;
            self.swing.arm_length = arm;

            let dir = self.curve.direction_2d();
            let gravity = self.gravity();
            let mut accel = gravity - project_onto(gravity, radial);
            if size_2d(self.swing.input) > 0.0
                && safe_normal(gravity - accel).dot(&safe_normal(gravity)) > SWING_INPUT_COS_THRESHOLD
            {
                let push = if dot_2d(self.swing.input, accel) > 0.0 { 1.0 } else { -1.0 };
                accel += safe_normal(accel) * (push * self.swing.input_force);
            }
            accel = along_tangent(accel, dir);

            self.velocity += accel * tick;
            self.velocity = along_tangent(self.velocity, dir);
            if size_2d(self.velocity) > KINDA_SMALL_NUMBER {
                let forward = self.facing.dot(&safe_normal(self.velocity)) > 0.0;
                // Flips above the center; kept as observed in play, the intent is not documented.
                self.swing.is_forward = if old_location.y > center.y { !forward } else { forward };
            }

            let free = old_location + self.velocity * tick;
            let target = center + safe_normal(free - center) * arm;
            let delta = target - old_location;

            let old_curve = self.curve.clone();
            let arc = size_2d(delta) * if dot_2d(dir, delta) > 0.0 { 1.0 } else { -1.0 };
            self.curve.advance(arc);
            let hit = self.move_updated(delta);
            if hit.is_valid_blocking_hit() {
                self.curve = old_curve.offset(arc * hit.time);
            }

            self.velocity = (self.location - old_location) / tick;
            if self.location == old_location {
                break;
            }
        }
    }
}

/// Horizontal part of `v` laid on the tangent `dir`, keeping its sign and length.
fn along_tangent(v: Vec3, dir: Vec3) -> Vec3 {
    let sign = if dot_2d(dir, v) > 0.0 { 1.0 } else { -1.0 };
    with_planar(v, dir * (sign * size_2d(v)))
}

use super::CharacterMover;
use crate::{
    collision::CollisionWorld,
    constants::{KINDA_SMALL_NUMBER, MIN_TICK_TIME},
    math::{is_nearly_zero, size_2d},
    owner::MovementOwner,
};

impl<W: CollisionWorld, O: MovementOwner> CharacterMover<W, O> {
    /// Free movement without gravity, one step per tick.
    pub(super) fn phys_flying(&mut self, dt: f32, _iterations: u32) {
        if dt < MIN_TICK_TIME {
            return;
        }
        let (friction, braking) = (self.config.ground_friction, self.config.braking_deceleration_flying);
        self.calc_velocity(dt, friction, braking);
        self.just_teleported = false;
        if is_nearly_zero(self.velocity, KINDA_SMALL_NUMBER) {
            return;
        }

        let on_curve = self.curve.is_valid();
        let old_location = self.location;
        let old_curve = self.curve.clone();
        let adjusted = if on_curve {
            let arc = size_2d(self.velocity) * dt * self.curve.direction_modifier(self.velocity);
            self.curve.advance(arc);
            self.curve.to_world(old_location.y + self.velocity.y * dt) - old_location
        } else {
            self.velocity * dt
        };

        let mut hit = self.safe_move(adjusted);
        if hit.time < 1.0 {
            let first_time = hit.time;
            let impact = hit;
            self.handle_impact(&impact);
            let percent = self.slide_along_surface(adjusted, 1.0 - first_time, &mut hit);
            if on_curve {
                let applied = self.curve.distance_to(&old_curve);
                self.curve = old_curve.offset(applied * (first_time + (1.0 - first_time) * percent));
            }
        }

        if !on_curve && !self.just_teleported && !self.has_root_motion {
            self.velocity = (self.location - old_location) / dt;
        }
    }
}

use super::CharacterMover;
use crate::{
    bounce::reflect,
    collision::{CollisionWorld, SweepHit, Vec3},
    constants::{ARC_CORRECTION_PASSES, COORDINATE_RESYNC_ERROR, KINDA_SMALL_NUMBER, MIN_TICK_TIME},
    flags::SurfaceTag,
    math::{dot_2d, is_nearly_zero, sign, size_2d, to_planar},
    owner::MovementOwner,
    scoped::with_override,
    state::MovementMode,
};

impl<W: CollisionWorld, O: MovementOwner> CharacterMover<W, O> {
    pub(super) fn phys_walking(&mut self, dt: f32, mut iterations: u32) {
        if dt < MIN_TICK_TIME {
            return;
        }

        if self.root_motion_vertical() {
            if self.velocity.y > KINDA_SMALL_NUMBER {
                log::trace!("root motion lifts the body off the floor");
                self.set_movement_mode(MovementMode::Falling);
                self.start_new_physics(dt, iterations);
                return;
            }
            if self.root_motion_desc.is_some_and(|d| !d.horizontal) {
                // Horizontal motion stays physical.
                let old_vy = self.velocity.y;
                self.velocity.y = 0.0;
                self.acceleration.y = 0.0;
                with_override(self, |m| &mut m.has_root_motion, false, |m| {
                    let (friction, braking) = (m.config.ground_friction, m.config.braking_deceleration_walking);
                    m.calc_velocity(dt, friction, braking);
                });
                self.velocity.y = old_vy;
            }
        }

        let mut remaining = dt;
        while remaining >= MIN_TICK_TIME && iterations < self.config.max_simulation_iterations {
            iterations += 1;
            self.just_teleported = false;
            let tick = self.simulation_time_step(remaining, iterations);
            remaining -= tick;

            let old_location = self.location;
            if !self.floor.is_walkable_floor() {
                self.floor = self.find_floor(self.location);
            }

            self.velocity.y = 0.0;
            self.acceleration.y = 0.0;
            let (friction, braking) = (self.config.ground_friction, self.config.braking_deceleration_walking);
            self.calc_velocity(tick, friction, braking);

            let move_velocity = self.velocity;
            let delta = move_velocity * tick;
            if is_nearly_zero(delta, KINDA_SMALL_NUMBER) {
                remaining = 0.0;
            } else {
                self.move_along_floor(move_velocity, tick);
                if self.mode.is_falling() {
                    let desired = delta.norm();
                    if desired > KINDA_SMALL_NUMBER {
                        let actual = size_2d(self.location - old_location);
                        remaining += tick * (1.0 - (actual / desired).min(1.0));
                    }
                    self.start_new_physics(remaining, iterations);
                    return;
                }
                if self.mode != MovementMode::Walking {
                    return;
                }
            }

            self.floor = self.find_floor(self.location);
            if !self.floor.is_walkable_floor() {
                let start_penetrating = self.floor.hit.is_some_and(|h| h.start_penetrating);
                if start_penetrating {
                    if let Some(floor_hit) = self.floor.hit {
                        let adjustment = self.penetration_adjustment(&floor_hit);
                        self.resolve_penetration(adjustment, &floor_hit);
                    }
                } else {
                    let desired = delta.norm();
                    remaining = if desired < KINDA_SMALL_NUMBER {
                        0.0
                    } else {
                        let actual = size_2d(self.location - old_location);
                        remaining + tick * (1.0 - (actual / desired).min(1.0))
                    };
                    log::trace!("walked off the floor at {:?}", self.location);
                    self.set_movement_mode(MovementMode::Falling);
                    self.start_new_physics(remaining, iterations);
                    return;
                }
            } else {
                self.adjust_floor_height();
            }

            if !self.just_teleported && !self.has_root_motion {
                self.velocity = (self.location - old_location) / tick;
                self.velocity.y = 0.0;
            }
            if self.location == old_location {
                break;
            }
        }
    }

    /// Move along the walkable floor at `in_velocity` for `dt`.
    ///
    /// On a curve the horizontal move follows the curve for the full arc length and the
    /// coordinate is advanced by the share of the move that was applied. Off-curve the
    /// move is a straight horizontal delta.
    pub(super) fn move_along_floor(&mut self, in_velocity: Vec3, dt: f32) {
        if !self.floor.is_walkable_floor() {
            return;
        }
        let on_curve = self.curve.is_valid();
        let old_location = self.location;

        let (delta, delta_on_curve) = if on_curve {
            if size_2d(in_velocity) < KINDA_SMALL_NUMBER {
                return;
            }
            self.resync_coordinate();
            let along = if dot_2d(self.curve.direction_2d(), self.velocity) > 0.0 { 1.0 } else { -1.0 };
            let arc = size_2d(in_velocity) * dt;
            // The chord between two curve points is shorter than the arc; extend until it matches.
            let mut delta_on_curve = arc * along;
            for _ in 0..ARC_CORRECTION_PASSES {
                let reached = size_2d(self.curve.offset(delta_on_curve).to_world(old_location.y) - old_location);
                delta_on_curve += (arc - reached).max(0.0) * along;
            }
            let mut delta = self.curve.offset(delta_on_curve).to_world(old_location.y) - old_location;
            delta.y = 0.0;
            (delta, delta_on_curve)
        } else {
            (Vec3::new(in_velocity.x, 0.0, in_velocity.z) * dt, 0.0)
        };

        let floor_hit = self.floor.hit;
        let ramp = self.compute_ground_movement_delta(delta, floor_hit.as_ref());
        let mut hit = self.safe_move(ramp);
        let old_curve = self.curve.clone();
        self.curve.advance(delta_on_curve);

        if hit.start_penetrating {
            let impact = hit;
            self.handle_impact(&impact);
            let percent = self.slide_along_surface(delta, 1.0, &mut hit);
            self.curve = old_curve.offset(delta_on_curve * percent);
            if hit.start_penetrating {
                self.on_stuck_in_geometry(&hit);
            }
            return;
        }
        if !hit.is_valid_blocking_hit() {
            return;
        }

        let mut percent_applied = hit.time;
        if hit.time > 0.0 && hit.normal.y > KINDA_SMALL_NUMBER && self.is_walkable(&hit) {
            // Hit a ramp: continue up it for the rest of the move.
            let initial_remaining = 1.0 - percent_applied;
            let ramp = self.compute_ground_movement_delta(delta * initial_remaining, Some(&hit));
            hit = self.safe_move(ramp);
            percent_applied = (percent_applied + hit.time * initial_remaining).clamp(0.0, 1.0);
        }
        let delta_distance = self.curve.distance_to(&old_curve);
        self.curve = old_curve.offset(delta_distance * percent_applied);
        let rest_distance = (1.0 - percent_applied) * delta_distance;

        if !hit.is_valid_blocking_hit() {
            return;
        }
        if self.can_step_up(&hit) {
            let before_step = self.location;
            let blocking = hit;
            if self.step_up(delta * (1.0 - percent_applied), &blocking) {
                self.curve.advance(sign(rest_distance) * size_2d(self.location - before_step));
            } else {
                self.handle_impact(&blocking);
                let percent = self.slide_along_surface(delta, 1.0 - percent_applied, &mut hit);
                self.curve.advance(rest_distance * percent);
                if on_curve {
                    self.floor_bounce(in_velocity, dt * (1.0 - percent_applied), &hit, &blocking);
                }
            }
        } else if hit.flags.has(SurfaceTag::NoStepUp) {
            let blocking = hit;
            self.handle_impact(&blocking);
            let percent = self.slide_along_surface(delta, 1.0 - percent_applied, &mut hit);
            self.curve.advance(rest_distance * percent);
        }
    }

    /// Bounce off a wall met while walking, then replay the remaining move backwards once.
    fn floor_bounce(&mut self, in_velocity: Vec3, remaining_dt: f32, hit: &SweepHit, blocking: &SweepHit) {
        if self.owner.should_bounce_on_hit(Some(hit)).is_none() {
            return;
        }
        if hit.collider.is_none() || hit.flags.has(SurfaceTag::NoFloorBounce) {
            return;
        }
        self.velocity = reflect(self.velocity, blocking.impact_normal);
        let roll = self.curve.direction_modifier(self.velocity);
        self.owner
            .on_bounce(false, roll, blocking.impact_point, blocking.impact_normal);
        log::debug!("floor bounce off {:?}", hit.collider);

        if self.velocity.y > KINDA_SMALL_NUMBER {
            self.set_movement_mode(MovementMode::Falling);
            return;
        }
        if !self.roll_hit_this_frame {
            self.roll_hit_this_frame = true;
            self.move_along_floor(-in_velocity, remaining_dt);
        }
    }

    /// Re-derive the coordinate when the body drifted off the curve point.
    fn resync_coordinate(&mut self) {
        let Some(point) = self.curve.location_2d() else {
            return;
        };
        let error = (to_planar(self.location) - point).norm();
        if error > COORDINATE_RESYNC_ERROR {
            log::warn!("curve coordinate off by {error}, resyncing from {:?}", self.location);
            self.curve.set_distance_from_world_location(self.location);
        }
    }
}

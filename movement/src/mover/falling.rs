use rand::Rng;

use super::CharacterMover;
use crate::{
    bounce::{WallJumpMemory, decide_bounce},
    collision::{CollisionWorld, SweepHit, Vec3},
    constants::{FALLING_LATERAL_REST_SQ, KINDA_SMALL_NUMBER, MIN_TICK_TIME, VERTICAL_SLOPE_NORMAL_Y},
    flags::SurfaceTag,
    math::{dot_2d, is_nearly_zero, projected_normal, safe_normal, safe_normal_2d, size_2d, size_sq_2d, with_planar},
    owner::{BounceParams, MovementOwner},
    scoped::with_override,
    state::MovementMode,
};

impl<W: CollisionWorld, O: MovementOwner> CharacterMover<W, O> {
    pub(super) fn phys_falling(&mut self, dt: f32, mut iterations: u32) {
        if dt < MIN_TICK_TIME {
            return;
        }
        let on_curve = self.curve.is_valid();
        let mut fall_acceleration = self.falling_lateral_acceleration();
        fall_acceleration.y = 0.0;
        let has_air_control = size_sq_2d(fall_acceleration) > 0.0;

        let mut remaining = dt;
        while remaining >= MIN_TICK_TIME && iterations < self.config.max_simulation_iterations {
            iterations += 1;
            let tick = self.simulation_time_step(remaining, iterations);
            remaining -= tick;

            let old_location = self.location;
            let old_velocity = self.velocity;
            self.just_teleported = false;

            // Velocity as it would be without air control, used to limit the air control response.
            let mut velocity_no_air_control = self.velocity;
            if has_air_control {
                let lateral = with_override(self, |m| &mut m.acceleration, Vec3::zeros(), |m| {
                    with_override(m, |m| &mut m.velocity, Vec3::new(old_velocity.x, 0.0, old_velocity.z), |m| {
                        let braking = m.falling_braking_deceleration();
                        let friction = m.config.falling_lateral_friction;
                        m.calc_velocity(tick, friction, braking);
                        m.velocity
                    })
                });
                velocity_no_air_control = Vec3::new(lateral.x, old_velocity.y, lateral.z);
            }

            with_override(self, |m| &mut m.acceleration, fall_acceleration, |m| {
                m.velocity.y = 0.0;
                with_override(m, |m| &mut m.has_root_motion, false, |m| {
                    let braking = m.falling_braking_deceleration();
                    let friction = m.config.falling_lateral_friction;
                    m.calc_velocity(tick, friction, braking);
                });
                m.velocity.y = old_velocity.y;
            });
            if !has_air_control {
                velocity_no_air_control = self.velocity;
            }
            if on_curve {
                let dir = self.curve.direction_from_vector(self.velocity);
                self.velocity = with_planar(self.velocity, dir * size_2d(self.velocity));
                velocity_no_air_control =
                    with_planar(velocity_no_air_control, dir * size_2d(velocity_no_air_control));
            }

            if !self.root_motion_vertical() {
                match self.fall_velocity_override {
                    Some(vy) => {
                        self.velocity.y = vy;
                        velocity_no_air_control.y = vy;
                    }
                    None => {
                        self.velocity = self.new_fall_velocity(self.velocity, tick);
                        velocity_no_air_control = self.new_fall_velocity(velocity_no_air_control, tick);
                    }
                }
            }
            let air_control_accel = (self.velocity - velocity_no_air_control) / tick;

            // Integrate with the average of the old and new velocity.
            let average = (old_velocity + self.velocity) * 0.5;
            let (mut adjusted, delta_on_curve) = if on_curve {
                let delta_on_curve = size_2d(average) * tick * self.curve.direction_modifier(average);
                let mut target = self.curve.offset(delta_on_curve).to_world(0.0);
                target.y = old_location.y + average.y * tick;
                (target - old_location, delta_on_curve)
            } else {
                (average * tick, 0.0)
            };

            let mut hit = self.safe_move(adjusted);
            let mut last_move_time_slice = tick;
            let mut sub_remaining = tick * (1.0 - hit.time);

            if self.mode == MovementMode::Swimming {
                self.curve.advance(delta_on_curve * hit.time);
                return;
            }
            if !hit.blocking {
                self.curve.advance(delta_on_curve);
            } else {
                self.curve.advance(delta_on_curve * hit.time);

                if self.is_valid_landing_spot(self.location, &hit) {
                    remaining += sub_remaining;
                    self.process_landed(&hit, remaining, iterations);
                    return;
                }

                adjusted = self.velocity * tick;
                if !hit.start_penetrating && self.should_check_for_valid_landing_spot(&hit) {
                    let floor = self.find_floor(self.location);
                    if floor.is_walkable_floor() {
                        if let Some(floor_hit) = floor.hit.filter(|h| self.is_valid_landing_spot(self.location, h)) {
                            remaining += sub_remaining;
                            self.process_landed(&floor_hit, remaining, iterations);
                            return;
                        }
                    }
                }

                let velocity_before_bounce = self.velocity;
                if on_curve {
                    if let Some(params) = self.owner.should_bounce_on_hit(Some(&hit)) {
                        self.bounce_off(&hit, params);
                        remaining += sub_remaining;
                        self.phys_falling(remaining, iterations);
                        return;
                    }
                }

                let impact = hit;
                self.handle_impact(&impact);
                if !self.mode.is_falling() {
                    return;
                }

                if has_air_control {
                    let air_delta = self.limit_air_control(air_control_accel, &hit) * last_move_time_slice;
                    adjusted = (velocity_no_air_control + air_delta) * last_move_time_slice;
                }

                let (old_hit_normal, old_hit_impact_normal) = if on_curve {
                    (
                        projected_normal(velocity_before_bounce, hit.normal),
                        projected_normal(velocity_before_bounce, hit.impact_normal),
                    )
                } else {
                    (hit.normal, hit.impact_normal)
                };

                let mut delta = self.compute_slide_vector(adjusted, 1.0 - hit.time, old_hit_normal);
                if sub_remaining > KINDA_SMALL_NUMBER && !self.just_teleported {
                    self.velocity = delta / sub_remaining;
                }

                if sub_remaining > KINDA_SMALL_NUMBER && delta.dot(&adjusted) > 0.0 {
                    hit = self.safe_move(delta);
                    self.follow_curve(delta, if hit.blocking { hit.time } else { 1.0 });

                    if hit.blocking {
                        last_move_time_slice = sub_remaining;
                        sub_remaining *= 1.0 - hit.time;

                        if self.is_valid_landing_spot(self.location, &hit) {
                            remaining += sub_remaining;
                            self.process_landed(&hit, remaining, iterations);
                            return;
                        }

                        let impact = hit;
                        self.handle_impact(&impact);
                        if !self.mode.is_falling() {
                            return;
                        }

                        // Air control may not push further into the first surface.
                        if has_air_control && hit.normal.y > VERTICAL_SLOPE_NORMAL_Y {
                            let last_no_air = velocity_no_air_control * last_move_time_slice;
                            delta = self.compute_slide_vector(last_no_air, 1.0, old_hit_normal);
                        }

                        delta = self.two_wall_adjust(delta, &hit, old_hit_normal);

                        if has_air_control {
                            let air_delta = self.limit_air_control(air_control_accel, &hit) * sub_remaining;
                            if air_delta.dot(&old_hit_normal) > 0.0 {
                                delta += air_delta * sub_remaining;
                            }
                        }

                        if sub_remaining > KINDA_SMALL_NUMBER && !self.just_teleported {
                            self.velocity = delta / sub_remaining;
                        }

                        let new_impact_normal = if on_curve {
                            projected_normal(delta, hit.impact_normal)
                        } else {
                            hit.impact_normal
                        };
                        // Wedged between two upward-facing surfaces.
                        let ditch = old_hit_impact_normal.y > 0.0
                            && new_impact_normal.y > 0.0
                            && delta.y.abs() <= KINDA_SMALL_NUMBER
                            && new_impact_normal.dot(&old_hit_impact_normal) < 0.0;

                        let before_slide = self.curve.clone();
                        hit = self.safe_move(delta);
                        self.follow_curve(delta, 1.0);
                        if hit.time == 0.0 {
                            // Stuck in a corner: try to step sideways.
                            self.curve = before_slide;
                            let mut side = safe_normal_2d(old_hit_normal + new_impact_normal);
                            if is_nearly_zero(side, KINDA_SMALL_NUMBER) {
                                side = safe_normal(Vec3::new(old_hit_normal.z, 0.0, -old_hit_normal.x));
                            }
                            hit = self.safe_move(side);
                            self.follow_curve(side, if hit.blocking { hit.time } else { 1.0 });
                        }

                        if ditch || self.is_valid_landing_spot(self.location, &hit) || hit.time == 0.0 {
                            self.process_landed(&hit, 0.0, iterations);
                            return;
                        }

                        if self.config.perch_radius_threshold > 0.0
                            && hit.time == 1.0
                            && old_hit_impact_normal.y >= self.config.walkable_floor_y
                        {
                            self.nudge_off_perch(old_location, tick);
                        }
                    }
                }
            }

            if size_sq_2d(self.velocity) <= FALLING_LATERAL_REST_SQ {
                self.velocity.x = 0.0;
                self.velocity.z = 0.0;
            }
        }
    }

    /// Random kick for a body balanced on an edge and barely moving.
    fn nudge_off_perch(&mut self, old_location: Vec3, tick: f32) {
        let moved = self.location - old_location;
        if moved.y.abs() > 0.2 * tick || size_sq_2d(moved) > 4.0 * tick {
            return;
        }
        let max_speed = self.max_speed();
        self.velocity.x += 0.25 * max_speed * (self.rng.r#gen::<f32>() - 0.5);
        self.velocity.z += 0.25 * max_speed * (self.rng.r#gen::<f32>() - 0.5);
        self.velocity.y = (self.config.jump_y_velocity * 0.25).max(1.0);
        self.align_velocity_to_curve();
        log::trace!("nudging perched body at {:?}", self.location);

        let nudge = self.velocity * tick;
        let hit = self.safe_move(nudge);
        self.follow_curve(nudge, if hit.blocking { hit.time } else { 1.0 });
    }

    /// Air bounce: wall-jump or damped reflection, remembering a missed wall-jump.
    pub(super) fn bounce_off(&mut self, hit: &SweepHit, params: BounceParams) {
        if hit.flags.has(SurfaceTag::ApplyForce) {
            self.owner.on_surface_force(self.velocity, hit);
        }
        let owner = &mut self.owner;
        let decision = decide_bounce(
            self.velocity,
            hit.impact_normal,
            params,
            &self.config,
            self.wall_jump.jumped_this_frame,
            || owner.can_perform_wall_jump(hit),
        );

        self.velocity = decision.velocity;
        if decision.wall_jump {
            log::debug!("wall jump off {:?}", hit.collider);
            self.wall_jump.jumped_this_frame = true;
        } else if decision.might_wall_jump {
            self.wall_jump.memory = Some(WallJumpMemory {
                missed_time: self.clock,
                missed_velocity: decision.wall_jump_velocity,
                missed_impact_normal: hit.impact_normal,
                missed_impact_offset: hit.impact_point - self.location,
            });
        }
        self.acceleration.x = 0.0;
        self.acceleration.z = 0.0;

        let roll = decision.roll_value(dot_2d(self.curve.direction(), self.velocity));
        self.wall_jump.last_roll = roll;
        self.owner
            .on_bounce(decision.wall_jump, roll, hit.impact_point, hit.impact_normal);
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{RecordingOwner, capsule, half_circle, off_tangent, on_straight_curve};
    use crate::{
        collision::{StaticCollider, StaticWorld, Vec3, cuboid_at, ground_plane},
        config::MovementConfig,
        curve::CurvePosition,
        math::size_2d,
        mover::CharacterMover,
        owner::BounceParams,
        state::{MovementInput, MovementMode},
    };

    fn config() -> MovementConfig {
        MovementConfig {
            slow_down_to_max_walk_speed_in_fall: false,
            ..MovementConfig::default()
        }
    }

    /// Airborne body at x = 40 heading for a wall whose face is at x = 100.
    fn airborne_near_wall(owner: RecordingOwner) -> CharacterMover<StaticWorld, RecordingOwner> {
        let wall = StaticCollider::solid(cuboid_at(Vec3::new(10.0, 500.0, 500.0), Vec3::new(110.0, 0.0, 0.0)));
        let mut mover = CharacterMover::new(
            config(),
            StaticWorld::new(vec![wall]),
            owner,
            capsule(),
            Vec3::new(40.0, 500.0, 0.0),
        )
        .expect("valid config");
        mover.set_curve_position(on_straight_curve(40.0));
        mover.set_velocity(Vec3::new(800.0, 0.0, 0.0));
        mover
    }

    fn bouncy(allow_wall_jump: bool) -> RecordingOwner {
        RecordingOwner {
            bounce: Some(BounceParams::with_damping(0.5)),
            allow_wall_jump,
            ..RecordingOwner::default()
        }
    }

    #[test]
    fn gravity_accelerates_a_free_fall() {
        let mut mover = CharacterMover::new(
            config(),
            StaticWorld::new(Vec::new()),
            RecordingOwner::default(),
            capsule(),
            Vec3::new(0.0, 1000.0, 0.0),
        )
        .expect("valid config");
        assert_eq!(mover.mode(), MovementMode::Falling);
        mover.tick(0.1, &MovementInput::default());
        assert!((mover.velocity().y + 98.0).abs() < 0.01);
        // Average-velocity integration: 0.5 * g * t^2.
        assert!((mover.location().y - (1000.0 - 4.9)).abs() < 0.01);
    }

    #[test]
    fn falling_around_a_bend_keeps_to_the_curve() {
        let start = CurvePosition::new(half_circle(), 300.0);
        let mut mover = CharacterMover::new(
            config(),
            StaticWorld::new(Vec::new()),
            RecordingOwner::default(),
            capsule(),
            start.to_world(1000.0),
        )
        .expect("valid config");
        mover.set_curve_position(start.clone());
        mover.set_velocity(start.direction() * 300.0);
        mover.tick(0.1, &MovementInput::default());

        assert_eq!(mover.mode(), MovementMode::Falling);
        assert!((mover.curve().distance() - 330.0).abs() < 0.05);
        assert!((size_2d(mover.location()) - 200.0).abs() < 0.01);
        assert!((size_2d(mover.location() - mover.curve().to_world(0.0))) < 0.01);
        assert!(mover.location().y < 1000.0);
        assert!(off_tangent(mover.velocity(), mover.curve()) < 1.0e-2);
    }

    #[test]
    fn falling_body_lands_on_the_ground() {
        let mut mover = CharacterMover::new(
            config(),
            StaticWorld::new(vec![StaticCollider::solid(ground_plane(0.0))]),
            RecordingOwner::default(),
            capsule(),
            Vec3::new(0.0, 300.0, 0.0),
        )
        .expect("valid config");
        for _ in 0..30 {
            mover.tick(1.0 / 30.0, &MovementInput::default());
        }
        assert_eq!(mover.mode(), MovementMode::Walking);
        assert_eq!(mover.owner().landings, 1);
        assert!(mover.velocity().y.abs() < 1.0e-4);
        let floor = mover.floor();
        assert!(floor.is_walkable_floor());
        assert!(floor.floor_dist >= 1.9 - 1.0e-3 && floor.floor_dist <= 2.4 + 1.0e-3);
    }

    #[test]
    fn wall_jump_launches_away_from_the_wall() {
        let mut mover = airborne_near_wall(bouncy(true));
        mover.tick(0.05, &MovementInput::default());

        assert_eq!(mover.owner().bounces, vec![(true, -1.0)]);
        assert!(mover.wall_jump().jumped_this_frame);
        assert!((mover.velocity().x + 200.0).abs() < 1.0);
        assert!(mover.velocity().y > 850.0);
        assert!(mover.wall_jump().memory.is_none());
    }

    #[test]
    fn refused_wall_jump_bounces_and_can_be_claimed_late() {
        let mut mover = airborne_near_wall(bouncy(false));
        mover.tick(0.05, &MovementInput::default());

        assert_eq!(mover.owner().bounces.len(), 1);
        assert!(!mover.owner().bounces[0].0);
        assert!(mover.velocity().x < 0.0);
        assert!(mover.wall_jump().memory.is_some());

        assert!(mover.try_late_wall_jump());
        assert!((mover.velocity() - Vec3::new(-200.0, 950.0, 0.0)).norm() < 1.0e-3);
        assert_eq!(mover.owner().bounces.len(), 2);
        assert!(mover.owner().bounces[1].0);
    }

    #[test]
    fn late_wall_jump_expires() {
        let mut mover = airborne_near_wall(bouncy(false));
        mover.tick(0.05, &MovementInput::default());
        for _ in 0..4 {
            mover.tick(0.05, &MovementInput::default());
        }
        assert!(!mover.try_late_wall_jump());
    }

    #[test]
    fn refused_landing_bounces_off_the_floor() {
        let owner = RecordingOwner {
            refuse_landing: true,
            ..bouncy(false)
        };
        let mut mover = CharacterMover::new(
            config(),
            StaticWorld::new(vec![StaticCollider::solid(ground_plane(0.0))]),
            owner,
            capsule(),
            Vec3::new(0.0, 200.0, 0.0),
        )
        .expect("valid config");
        mover.set_curve_position(on_straight_curve(0.0));
        mover.set_velocity(Vec3::new(100.0, -400.0, 0.0));
        for _ in 0..20 {
            mover.tick(0.05, &MovementInput::default());
            if !mover.owner().bounces.is_empty() {
                break;
            }
        }

        assert_eq!(mover.owner().bounces, vec![(false, 1.0)]);
        assert_eq!(mover.owner().landings, 0);
        assert_eq!(mover.mode(), MovementMode::Falling);
        assert!(mover.velocity().y > 0.0);
        assert!(mover.location().y > 80.0);
    }

    #[test]
    fn wall_without_bounce_permission_stops_horizontal_motion() {
        let mut mover = airborne_near_wall(RecordingOwner::default());
        mover.tick(0.05, &MovementInput::default());
        assert!(mover.owner().bounces.is_empty());
        assert!(mover.location().x <= 70.0);
        assert!(mover.velocity().x.abs() < 1.0);
    }
}

/*!
Bounce and wall-jump policy.

For one impact the policy decides between a wall-jump and a damped elastic
bounce. A wall-jump that was possible but not granted is remembered for a
short grace window, so a late request can still claim it.
*/

use crate::{
    collision::Vec3,
    config::MovementConfig,
    constants::{CEILING_COS_THRESHOLD, KINDA_SMALL_NUMBER},
    math::{projected_normal, safe_normal, safe_normal_2d, up},
    owner::BounceParams,
};

/// `v` mirrored about the plane with unit normal `n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - n * (2.0 * n.dot(&v))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BounceDecision {
    pub velocity: Vec3,
    pub wall_jump: bool,
    /// The surface allowed a wall-jump this step, whether or not one happened.
    pub might_wall_jump: bool,
    /// Velocity was (anti)parallel to the normal and was simply reversed.
    pub parallel: bool,
    /// Cosine between the projected normal and straight down.
    pub ceiling_cos: f32,
    pub wall_jump_velocity: Vec3,
}

impl BounceDecision {
    /// Roll direction reported with the bounce: the sign of `along_tangent`, or 0 for
    /// ceilings and head-on hits.
    pub fn roll_value(&self, along_tangent: f32) -> f32 {
        if self.parallel || self.ceiling_cos >= CEILING_COS_THRESHOLD {
            return 0.0;
        }
        if along_tangent > 0.0 { 1.0 } else { -1.0 }
    }
}

/// Launch velocity away from a wall with projected normal `normal`.
pub fn wall_jump_velocity(normal: Vec3, params: BounceParams, config: &MovementConfig) -> Vec3 {
    let vertical = if params.launch_speed_hint > 0.0 {
        params.launch_speed_hint
    } else {
        config.wall_jump_vertical_speed
    };
    let mut v = safe_normal_2d(normal) * config.wall_jump_horizontal_speed;
    v.y = vertical;
    v
}

/// Resolve one bounce.
///
/// `can_wall_jump` is only asked when the surface is not ceiling-like and no wall-jump
/// happened this step.
pub fn decide_bounce(
    velocity: Vec3,
    impact_normal: Vec3,
    params: BounceParams,
    config: &MovementConfig,
    wall_jumped_this_frame: bool,
    can_wall_jump: impl FnOnce() -> bool,
) -> BounceDecision {
    let normal = projected_normal(velocity, impact_normal);
    let ceiling_cos = normal.dot(&-up());
    let might_wall_jump = !wall_jumped_this_frame && ceiling_cos < CEILING_COS_THRESHOLD;
    let wall_jump_velocity = wall_jump_velocity(normal, params, config);

    if might_wall_jump && can_wall_jump() {
        return BounceDecision {
            velocity: wall_jump_velocity,
            wall_jump: true,
            might_wall_jump,
            parallel: false,
            ceiling_cos,
            wall_jump_velocity,
        };
    }

    let parallel = normal.dot(&safe_normal(velocity)).abs() + KINDA_SMALL_NUMBER > 1.0;
    let reflected = if parallel {
        -velocity
    } else {
        reflect(velocity, normal)
    };
    BounceDecision {
        velocity: reflected * params.damping.clamp(0.0, 1.0),
        wall_jump: false,
        might_wall_jump,
        parallel,
        ceiling_cos,
        wall_jump_velocity,
    }
}

/// A wall-jump that was possible but not taken.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WallJumpMemory {
    pub missed_time: f64,
    pub missed_velocity: Vec3,
    pub missed_impact_normal: Vec3,
    /// Impact point relative to the body at the time of the miss.
    pub missed_impact_offset: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WallJumpState {
    pub memory: Option<WallJumpMemory>,
    /// Roll value of the most recent air bounce, replayed by a late wall-jump.
    pub last_roll: f32,
    pub jumped_this_frame: bool,
    pub late_enabled: bool,
    pub late_interval: f32,
}

impl WallJumpState {
    pub fn new(config: &MovementConfig) -> Self {
        Self {
            memory: None,
            last_roll: 0.0,
            jumped_this_frame: false,
            late_enabled: config.late_wall_jump_enabled,
            late_interval: config.late_wall_jump_interval,
        }
    }

    /// Take the remembered wall-jump if it is still inside the grace window at `now`.
    pub fn take_late_wall_jump(&mut self, now: f64) -> Option<WallJumpMemory> {
        if !self.late_enabled {
            return None;
        }
        let memory = self.memory?;
        if now - memory.missed_time < f64::from(self.late_interval) {
            self.memory = None;
            Some(memory)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(damping: f32) -> BounceParams {
        BounceParams::with_damping(damping)
    }

    #[test]
    fn wall_hit_with_permission_becomes_wall_jump() {
        let config = MovementConfig::default();
        // Moving +X into a wall facing -X.
        let d = decide_bounce(
            Vec3::new(600.0, -50.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            params(0.5),
            &config,
            false,
            || true,
        );
        assert!(d.wall_jump);
        assert!((d.velocity - Vec3::new(-200.0, 950.0, 0.0)).norm() < 1.0e-3);
    }

    #[test]
    fn second_wall_jump_in_one_step_is_refused() {
        let config = MovementConfig::default();
        let mut asked = false;
        let d = decide_bounce(
            Vec3::new(600.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            params(0.5),
            &config,
            true,
            || {
                asked = true;
                true
            },
        );
        assert!(!d.wall_jump);
        assert!(!d.might_wall_jump);
        assert!(!asked);
    }

    #[test]
    fn shallow_floor_reflects_and_damps() {
        let config = MovementConfig::default();
        let normal = Vec3::new(0.3, 0.9, 0.0).normalize();
        let v = Vec3::new(200.0, -400.0, 0.0);
        let d = decide_bounce(v, normal, params(0.5), &config, false, || false);
        assert!(!d.wall_jump);
        assert!(d.might_wall_jump);
        let expected = reflect(v, normal) * 0.5;
        assert!((d.velocity - expected).norm() < 1.0e-2);
    }

    #[test]
    fn damped_bounce_never_gains_speed() {
        let config = MovementConfig::default();
        let normals = [
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(-0.5, 0.5, 0.0).normalize(),
        ];
        for n in normals {
            for damping in [0.0, 0.3, 1.0, 4.0] {
                let v = Vec3::new(350.0, 120.0, 0.0);
                let d = decide_bounce(v, n, params(damping), &config, true, || false);
                assert!(d.velocity.norm() <= v.norm() + 1.0e-3);
            }
        }
    }

    #[test]
    fn head_on_hit_reverses_and_reports_no_roll() {
        let config = MovementConfig::default();
        let d = decide_bounce(
            Vec3::new(0.0, -300.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            params(1.0),
            &config,
            false,
            || false,
        );
        assert!(d.parallel);
        assert!((d.velocity - Vec3::new(0.0, 300.0, 0.0)).norm() < 1.0e-3);
        assert_eq!(d.roll_value(1.0), 0.0);
    }

    #[test]
    fn ceiling_is_not_a_wall_jump_surface() {
        let config = MovementConfig::default();
        let d = decide_bounce(
            Vec3::new(100.0, 400.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            params(0.5),
            &config,
            false,
            || true,
        );
        assert!(!d.wall_jump);
        assert!(!d.might_wall_jump);
        assert_eq!(d.roll_value(-1.0), 0.0);
    }

    #[test]
    fn launch_hint_overrides_vertical_speed() {
        let config = MovementConfig::default();
        let p = BounceParams {
            launch_speed_hint: 700.0,
            damping: 0.5,
        };
        let v = wall_jump_velocity(Vec3::new(0.0, 0.0, 1.0), p, &config);
        assert!((v - Vec3::new(0.0, 700.0, 200.0)).norm() < 1.0e-3);
    }

    fn missed_at(t: f64) -> WallJumpState {
        let mut state = WallJumpState::new(&MovementConfig::default());
        state.memory = Some(WallJumpMemory {
            missed_time: t,
            missed_velocity: Vec3::new(-200.0, 950.0, 0.0),
            missed_impact_normal: Vec3::new(-1.0, 0.0, 0.0),
            missed_impact_offset: Vec3::new(30.0, 0.0, 0.0),
        });
        state
    }

    #[test]
    fn late_wall_jump_inside_grace_window() {
        let mut state = missed_at(10.0);
        let taken = state.take_late_wall_jump(10.05).expect("inside the window");
        assert_eq!(taken.missed_velocity, Vec3::new(-200.0, 950.0, 0.0));
        assert!(state.memory.is_none());
        assert!(state.take_late_wall_jump(10.06).is_none());
    }

    #[test]
    fn late_wall_jump_after_grace_window_fails() {
        let mut state = missed_at(10.0);
        assert!(state.take_late_wall_jump(10.2).is_none());
        assert!(state.memory.is_some());
    }

    #[test]
    fn disabled_late_wall_jump_never_fires() {
        let mut state = missed_at(10.0);
        state.late_enabled = false;
        assert!(state.take_late_wall_jump(10.01).is_none());
    }
}

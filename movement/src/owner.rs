/*!
Character-side policy the mover calls back into.

The controlled body implements [`MovementOwner`] to decide bounces, wall-jumps and
landings, and to receive notifications. Every method has a neutral default, so a
body without special abilities can use [`NoCapabilities`].
*/

use crate::{
    collision::{SweepHit, Vec3},
    curve::CurvePosition,
    state::MovementMode,
};

/// Identifies a rematerialize location handed over with a pushed-and-stuck notification.
pub type RecoveryTargetId = u64;

/// Bounce response the owner grants for one impact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BounceParams {
    /// Vertical wall-jump speed. Zero or negative keeps the configured speed.
    pub launch_speed_hint: f32,
    /// Scale of the reflected velocity. Values outside `[0, 1]` are clamped.
    pub damping: f32,
}

impl BounceParams {
    pub fn with_damping(damping: f32) -> Self {
        Self {
            launch_speed_hint: 0.0,
            damping,
        }
    }
}

pub trait MovementOwner {
    /// `None` disallows bouncing. `hit` is `None` for bounces not caused by a sweep (push).
    fn should_bounce_on_hit(&mut self, _hit: Option<&SweepHit>) -> Option<BounceParams> {
        None
    }

    /// `stored_direction` is `+1`/`-1` along the curve tangent, or `0` for ceilings and head-on hits.
    fn on_bounce(&mut self, _wall_jump: bool, _stored_direction: f32, _impact_point: Vec3, _impact_normal: Vec3) {}

    /// Returning false aborts the landing and keeps falling.
    fn on_pre_landed(&mut self, _hit: &SweepHit) -> bool {
        true
    }

    fn on_landed(&mut self, _hit: &SweepHit) {}

    fn can_perform_wall_jump(&mut self, _hit: &SweepHit) -> bool {
        false
    }

    /// Called for every impact the mover reacts to. A returned mode is switched to immediately.
    fn on_blocked(&mut self, _hit: &SweepHit) -> Option<MovementMode> {
        None
    }

    /// The body bounced off a surface tagged `ApplyForce`.
    fn on_surface_force(&mut self, _velocity: Vec3, _hit: &SweepHit) {}

    fn on_enter_water(&mut self) {}

    fn on_movement_mode_changed(&mut self, _previous: MovementMode, _current: MovementMode) {}

    fn on_curve_changed(&mut self, _previous: &CurvePosition, _current: &CurvePosition) {}

    /// Stuck with a rematerialize target: take heavy damage instead of dying.
    fn on_crushed(&mut self, _damage: f32, _target: RecoveryTargetId) {}

    /// Stuck with no way out.
    fn kill(&mut self) {}
}

/// Owner with no bounce, wall-jump or landing policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCapabilities;

impl MovementOwner for NoCapabilities {}

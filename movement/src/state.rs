use crate::{
    collision::{SweepHit, Vec3},
    owner::RecoveryTargetId,
};

/// Project-specific modes layered on top of the built-in ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomMode {
    Swing,
}

/// Active physics mode. Switching takes effect at the next substep boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MovementMode {
    #[default]
    Walking,
    Falling,
    Flying,
    /// Entered from a water volume. Swimming physics is driven elsewhere.
    Swimming,
    Custom(CustomMode),
}

impl MovementMode {
    pub const SWING: Self = Self::Custom(CustomMode::Swing);

    #[inline]
    pub fn is_moving_on_ground(self) -> bool {
        self == Self::Walking
    }

    #[inline]
    pub fn is_falling(self) -> bool {
        self == Self::Falling
    }
}

/// Pendulum state, live only while the mode is [`MovementMode::SWING`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SwingState {
    pub center: Vec3,
    /// Arm length used by the last substep, within the configured range.
    pub arm_length: f32,
    /// Requested change of arm length, consumed by the next substep.
    pub arm_delta: f32,
    pub input_force: f32,
    /// Lateral input captured at the start of the tick.
    pub input: Vec3,
    pub is_forward: bool,
}

/// Pending pushed-and-stuck episode.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StuckState {
    pub pushed_and_stuck_last_frame: bool,
    pub rematerialize_target: Option<RecoveryTargetId>,
    pub crush_damage: f32,
    /// The episode already produced its one escalation.
    pub escalated: bool,
}

/// Which axes of animation root motion the mover honours.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootMotionDesc {
    pub horizontal: bool,
    pub vertical: bool,
    pub multiplier: f32,
}

impl Default for RootMotionDesc {
    fn default() -> Self {
        Self {
            horizontal: true,
            vertical: true,
            multiplier: 1.0,
        }
    }
}

/// Per-tick input from the controlling layer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementInput {
    /// Desired movement direction, magnitude at most 1. Only X/Z matter outside of flying.
    pub lateral: Vec3,
    /// Root-motion displacement produced by animation this tick.
    pub root_motion: Option<Vec3>,
}

/// Result of the downward floor probe.
#[derive(Clone, Copy, Debug, Default)]
pub struct FloorResult {
    pub hit: Option<SweepHit>,
    pub walkable: bool,
    /// Distance the capsule could drop before touching the floor.
    pub floor_dist: f32,
}

impl FloorResult {
    #[inline]
    pub fn is_walkable_floor(&self) -> bool {
        self.walkable && self.hit.is_some_and(|h| h.blocking)
    }

    #[inline]
    pub fn is_blocking(&self) -> bool {
        self.hit.is_some_and(|h| h.blocking)
    }
}

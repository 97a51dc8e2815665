pub mod bounce;
pub mod collision;
pub mod config;
pub mod constants;
pub mod curve;
pub mod flags;
pub mod math;
pub mod mover;
pub mod owner;
mod scoped;
pub mod state;

pub use bounce::{BounceDecision, WallJumpMemory, WallJumpState, decide_bounce, reflect};
pub use collision::{
    CapsuleSpec, CollisionWorld, StaticCollider, StaticShape, StaticWorld, SweepHit, SweepMode, Vec2, Vec3,
    cuboid_at, ground_plane,
};
pub use config::MovementConfig;
pub use curve::{AdvanceOutcome, ArcCurve, Curve, CurvePosition, PolylineCurve};
pub use flags::{SurfaceFlags, SurfaceTag};
pub use mover::CharacterMover;
pub use owner::{BounceParams, MovementOwner, NoCapabilities, RecoveryTargetId};
pub use state::{CustomMode, FloorResult, MovementInput, MovementMode, RootMotionDesc, StuckState, SwingState};

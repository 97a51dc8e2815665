/*!
Engine tolerances shared by every stepper.

These are fixed numeric guards, not designer tuning. Tunable values live in
[`crate::config::MovementConfig`].

Units are world units (centimetre scale), seconds, and Y-up.
*/

/// Substeps shorter than this are skipped entirely (no integration, no division).
pub const MIN_TICK_TIME: f32 = 1.0e-6;

/// Practical "zero" for speeds, normal components and distances.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

/// A surface whose normal Y component is at or below this is treated as vertical.
pub const VERTICAL_SLOPE_NORMAL_Y: f32 = 0.001;

/// Number of passes of the floor-movement arc-length correction.
pub const ARC_CORRECTION_PASSES: usize = 4;

/// Horizontal error between body and curve point that triggers a coordinate resync.
pub const COORDINATE_RESYNC_ERROR: f32 = 0.5;

/// Warn when a coordinate is assigned farther than this from the body.
pub const COORDINATE_ASSIGN_TOLERANCE: f32 = 1.0;

/// Wall-jumps and missed wall-jumps require `projected_normal · down` below this,
/// which rules out ceilings.
pub const CEILING_COS_THRESHOLD: f32 = 0.5;

/// Swing input is only honoured while the body hangs within this cosine of straight down.
pub const SWING_INPUT_COS_THRESHOLD: f32 = 0.7;

/// Vertical probe length used by the pushed-and-stuck escape pass.
pub const STUCK_PROBE_VERTICAL: f32 = 0.1;

/// The pushed-and-stuck overlap test shrinks the capsule by this much,
/// so the floor the body stands on does not count.
pub const STUCK_OVERLAP_SHRINK: f32 = 5.0;

/// Crush damage multiplier applied when a stuck body has a rematerialize target.
pub const CRUSH_DAMAGE_MULTIPLIER: f32 = 10.0;

/// Capsule inflation used by the no-sweep penetration test.
pub const PENETRATION_OVERLAP_INFLATION: f32 = 0.1;

/// Extra distance pushed out beyond the reported penetration depth.
pub const PENETRATION_PULLBACK_DISTANCE: f32 = 0.125;

/// Floor distance band kept while walking.
pub const MIN_FLOOR_DIST: f32 = 1.9;
pub const MAX_FLOOR_DIST: f32 = 2.4;

/// Braking with a deceleration stops dead below this speed.
pub const BRAKE_TO_STOP_VELOCITY: f32 = 10.0;

/// Braking is integrated in slices no longer than this.
pub const MAX_BRAKING_TIME_STEP: f32 = 1.0 / 33.0;

/// Floor and landing hits closer than this to the capsule's horizontal rim are rejected.
pub const SWEEP_EDGE_REJECT_DISTANCE: f32 = 0.15;

/// Distance between curve ends under which two linked curves count as connected.
pub const CURVE_CONNECTION_DISTANCE: f32 = 10.0;

/// Horizontal velocity (squared) under which falling zeroes the lateral motion.
pub const FALLING_LATERAL_REST_SQ: f32 = KINDA_SMALL_NUMBER * 10.0;

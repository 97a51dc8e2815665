/*!
Sweep and overlap tolerances.

These keep the capsule a hair away from geometry after every sweep, which
avoids re-penetrating on the next query due to float error.
*/

/// Separation kept from surfaces after a blocked sweep (world units).
pub const DEFAULT_SKIN: f32 = 0.1;

/// Minimum squared movement considered a real sweep.
pub const MIN_MOVE_SQ: f32 = 1.0e-8;

/// Contacts deeper than this count as initial penetration.
pub const PENETRATION_TOLERANCE: f32 = 1.0e-3;

/// Inflation applied to swept AABBs before pruning candidates.
pub const BROAD_PHASE_MARGIN: f32 = 0.5;

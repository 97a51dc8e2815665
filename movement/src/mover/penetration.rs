//! Depenetration and pushed-and-stuck recovery.

use super::CharacterMover;
use crate::{
    collision::{CollisionWorld, SweepHit, SweepMode, Vec3},
    constants::{
        CRUSH_DAMAGE_MULTIPLIER, PENETRATION_OVERLAP_INFLATION, PENETRATION_PULLBACK_DISTANCE, STUCK_OVERLAP_SHRINK,
        STUCK_PROBE_VERTICAL,
    },
    math::project_on_plane,
    owner::{MovementOwner, RecoveryTargetId},
    scoped::with_override,
};

impl<W: CollisionWorld, O: MovementOwner> CharacterMover<W, O> {
    /// Push-out vector for a start-penetrating hit, capped at the configured maximum.
    pub(super) fn penetration_adjustment(&self, hit: &SweepHit) -> Vec3 {
        if !hit.start_penetrating {
            return Vec3::zeros();
        }
        let depth = if hit.penetration_depth > 0.0 {
            hit.penetration_depth
        } else {
            PENETRATION_PULLBACK_DISTANCE
        };
        let adjustment = hit.normal * (depth + PENETRATION_PULLBACK_DISTANCE);
        let max = self.config.max_depenetration;
        if adjustment.norm() > max {
            adjustment.normalize() * max
        } else {
            adjustment
        }
    }

    /// Try to move out of penetration by `proposed`, constrained to the curve plane.
    ///
    /// Tries a plain teleport first, then sweeps: the adjustment, the adjustment combined with
    /// a second push-out, and finally the adjustment plus the intended move.
    pub(super) fn resolve_penetration(&mut self, proposed: Vec3, hit: &SweepHit) -> bool {
        let plane = self.curve.plane_normal();
        let adjustment = project_on_plane(proposed, plane);
        if adjustment == Vec3::zeros() {
            return false;
        }
        log::trace!("resolving penetration by {adjustment:?}");

        if !self
            .world
            .overlaps(&self.capsule, hit.trace_start + adjustment, PENETRATION_OVERLAP_INFLATION)
        {
            self.location += adjustment;
            self.follow_curve(adjustment, 1.0);
            return true;
        }

        with_override(
            self,
            |m| &mut m.sweep_mode,
            SweepMode::IgnoreDepartingOverlaps,
            |m| m.sweep_out_of_penetration(adjustment, hit, plane),
        )
    }

    fn sweep_out_of_penetration(&mut self, adjustment: Vec3, hit: &SweepHit, plane: Vec3) -> bool {
        let mut out = self.move_updated(adjustment);
        let mut moved = !out.start_penetrating;
        if moved {
            self.follow_curve(adjustment, out.time);
            return true;
        }

        let second = project_on_plane(self.penetration_adjustment(&out), plane);
        let combined = adjustment + second;
        if second != adjustment && combined != Vec3::zeros() {
            out = self.move_updated(combined);
            moved = !out.start_penetrating;
            if moved {
                self.follow_curve(combined, out.time);
                return true;
            }
        }

        let move_delta = project_on_plane(hit.trace_end - hit.trace_start, plane);
        if move_delta != Vec3::zeros() {
            let last = adjustment + move_delta;
            out = self.move_updated(last);
            moved = !out.start_penetrating;
            if moved {
                self.follow_curve(last, out.time);
            }
        }
        moved
    }

    /// Start-penetrating floor move that could not be resolved.
    pub(super) fn on_stuck_in_geometry(&mut self, hit: &SweepHit) {
        log::warn!(
            "stuck in geometry at {:?} (collider {:?}, depth {})",
            self.location,
            hit.collider,
            hit.penetration_depth
        );
        if self.stuck.pushed_and_stuck_last_frame {
            self.escalate_stuck();
        }
    }

    /// Report that something pushed the body into geometry this frame.
    ///
    /// With `force` the escalation happens immediately instead of after the escape attempt.
    pub fn notify_pushed_and_stuck(&mut self, target: Option<RecoveryTargetId>, damage: f32, force: bool) {
        self.stuck.pushed_and_stuck_last_frame = true;
        self.stuck.rematerialize_target = target;
        self.stuck.crush_damage = damage;
        if force {
            self.escalate_stuck();
        }
    }

    /// End-of-tick escape attempt for a body reported as pushed and stuck.
    ///
    /// The episode ends, and a later jam may escalate again, only once the body is free.
    pub(super) fn resolve_pushed_and_stuck(&mut self) {
        if !self.stuck.pushed_and_stuck_last_frame {
            return;
        }
        let mut free = true;
        if self.world.overlaps(&self.capsule, self.location, -STUCK_OVERLAP_SHRINK) {
            let probes = [
                Vec3::new(0.0, STUCK_PROBE_VERTICAL, 0.0),
                Vec3::new(0.0, -STUCK_PROBE_VERTICAL, 0.0),
                self.facing,
                -self.facing,
            ];
            let mut fixed = false;
            for probe in probes {
                let hit = with_override(self, |m| &mut m.sweep_mode, SweepMode::ReportAllOverlaps, |m| {
                    m.move_updated(probe)
                });
                if hit.start_penetrating {
                    let adjustment = self.penetration_adjustment(&hit);
                    fixed |= self.resolve_penetration(adjustment, &hit);
                } else {
                    fixed = true;
                }
            }
            free = fixed;
            if !fixed {
                self.escalate_stuck();
            }
        }
        if free {
            self.stuck.escalated = false;
        }
        self.stuck.pushed_and_stuck_last_frame = false;
    }

    /// Crush the body onto its rematerialize target, or kill it. Once per episode.
    pub(super) fn escalate_stuck(&mut self) {
        if self.stuck.escalated {
            return;
        }
        self.stuck.escalated = true;
        match self.stuck.rematerialize_target {
            Some(target) => {
                let damage = self.stuck.crush_damage * CRUSH_DAMAGE_MULTIPLIER;
                log::error!("body stuck at {:?}, crushing for {damage} toward target {target}", self.location);
                self.owner.on_crushed(damage, target);
            }
            None => {
                log::error!("body stuck at {:?} with no rematerialize target, killing", self.location);
                self.owner.kill();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{JammedWorld, RecordingOwner, capsule, empty_mover};
    use crate::{
        collision::{StaticCollider, StaticWorld, SweepHit, Vec3, cuboid_at},
        config::MovementConfig,
        mover::CharacterMover,
        state::MovementInput,
    };

    fn jammed() -> CharacterMover<JammedWorld, RecordingOwner> {
        CharacterMover::new(
            MovementConfig::default(),
            JammedWorld,
            RecordingOwner::default(),
            capsule(),
            Vec3::new(0.0, 100.0, 0.0),
        )
        .expect("valid config")
    }

    #[test]
    fn jammed_body_without_target_is_killed_once() {
        let mut mover = jammed();
        mover.notify_pushed_and_stuck(None, 5.0, false);
        for _ in 0..3 {
            mover.tick(1.0 / 60.0, &MovementInput::default());
        }
        assert_eq!(mover.owner().kills, 1);
        assert!(mover.owner().crushes.is_empty());
    }

    #[test]
    fn jammed_body_with_target_is_crushed() {
        let mut mover = jammed();
        mover.notify_pushed_and_stuck(Some(7), 5.0, false);
        mover.tick(1.0 / 60.0, &MovementInput::default());
        assert_eq!(mover.owner().crushes, vec![(50.0, 7)]);
        assert_eq!(mover.owner().kills, 0);
    }

    #[test]
    fn forced_escalation_is_immediate_and_not_repeated() {
        let mut mover = jammed();
        mover.notify_pushed_and_stuck(None, 5.0, true);
        assert_eq!(mover.owner().kills, 1);
        mover.tick(1.0 / 60.0, &MovementInput::default());
        assert_eq!(mover.owner().kills, 1);
    }

    #[test]
    fn jam_reported_every_frame_escalates_once() {
        let mut mover = jammed();
        for _ in 0..5 {
            mover.notify_pushed_and_stuck(Some(3), 5.0, false);
            mover.tick(1.0 / 60.0, &MovementInput::default());
        }
        assert_eq!(mover.owner().crushes, vec![(50.0, 3)]);
        assert!(mover.stuck().escalated);
    }

    #[test]
    fn getting_free_ends_the_episode() {
        let mut mover = CharacterMover::new(
            MovementConfig::default(),
            StaticWorld::new(Vec::new()),
            RecordingOwner::default(),
            capsule(),
            Vec3::new(0.0, 500.0, 0.0),
        )
        .expect("valid config");
        mover.notify_pushed_and_stuck(None, 5.0, true);
        assert_eq!(mover.owner().kills, 1);
        mover.tick(1.0 / 60.0, &MovementInput::default());
        assert!(!mover.stuck().escalated);

        mover.notify_pushed_and_stuck(None, 5.0, true);
        assert_eq!(mover.owner().kills, 2);
    }

    #[test]
    fn adjustment_is_capped() {
        let mover = empty_mover(MovementConfig::default());
        let mut hit = SweepHit::clear(Vec3::zeros(), Vec3::zeros());
        hit.blocking = true;
        hit.start_penetrating = true;
        hit.normal = Vec3::new(0.0, 1.0, 0.0);
        hit.penetration_depth = 500.0;
        assert!((mover.penetration_adjustment(&hit).y - 100.0).abs() < 1.0e-3);
        hit.penetration_depth = 0.0;
        assert!((mover.penetration_adjustment(&hit).y - 0.25).abs() < 1.0e-5);
    }

    #[test]
    fn overlapping_body_is_pushed_out_of_a_box() {
        // Box top at y = 10; capsule bottom at y = 5.
        let world = StaticWorld::new(vec![StaticCollider::solid(cuboid_at(
            Vec3::new(200.0, 10.0, 200.0),
            Vec3::new(0.0, 0.0, 0.0),
        ))]);
        let mut mover = CharacterMover::new(
            MovementConfig::default(),
            world,
            RecordingOwner::default(),
            capsule(),
            Vec3::new(0.0, 85.0, 0.0),
        )
        .expect("valid config");
        let hit = mover.safe_move(Vec3::new(0.0, -1.0, 0.0));
        assert!(!hit.start_penetrating || mover.location().y > 85.0);
        assert!(mover.location().y > 85.0);
    }
}

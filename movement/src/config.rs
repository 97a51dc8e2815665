/*!
Designer-tunable movement configuration.

One immutable [`MovementConfig`] is built at construction time and handed to
the mover; steppers only ever read it. Values can be loaded from TOML, where
any omitted key keeps its default.
*/

use anyhow::{Context, Result, bail};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MovementConfig {
    /// Horizontal speed cap while walking.
    pub max_walk_speed: f32,
    pub max_fly_speed: f32,
    pub max_swim_speed: f32,
    /// Acceleration produced by full lateral input.
    pub max_acceleration: f32,

    pub ground_friction: f32,
    pub braking_deceleration_walking: f32,
    pub braking_deceleration_flying: f32,
    /// Multiplies friction while braking (no input or over max speed).
    pub braking_friction_factor: f32,

    pub falling_lateral_friction: f32,
    pub braking_deceleration_falling: f32,
    /// Braking used instead of `braking_deceleration_falling` while faster than walk speed.
    pub braking_deceleration_falling_over_max_walk: f32,
    pub slow_down_to_max_walk_speed_in_fall: bool,

    /// Fraction of lateral acceleration available in the air.
    ///
    /// - 1.0 = full ground control in air
    /// - 0.0 = no air control
    pub air_control: f32,
    pub air_control_boost_multiplier: f32,
    pub air_control_boost_velocity_threshold: f32,

    /// Signed gravity along +Y (negative pulls down).
    pub gravity_y: f32,
    pub terminal_velocity: f32,
    pub jump_y_velocity: f32,

    pub max_step_height: f32,
    /// Minimum normal Y of a walkable surface.
    pub walkable_floor_y: f32,
    /// Zero disables the perch-escape nudge.
    pub perch_radius_threshold: f32,

    pub max_simulation_iterations: u32,
    pub max_simulation_time_step: f32,

    pub swing_arm_min: f32,
    pub swing_arm_max: f32,

    pub late_wall_jump_enabled: bool,
    /// Grace window (seconds) in which a missed wall-jump can still be claimed.
    pub late_wall_jump_interval: f32,
    pub wall_jump_horizontal_speed: f32,
    pub wall_jump_vertical_speed: f32,

    pub max_depenetration: f32,
    /// Scale applied to animation root-motion deltas.
    pub root_motion_scale: f32,
    /// Face along the velocity (projected on the curve) when moving.
    pub orient_to_movement: bool,
    /// Seed of the generator behind the perch-escape nudge.
    pub rng_seed: u64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            max_walk_speed: 500.0,
            max_fly_speed: 600.0,
            max_swim_speed: 300.0,
            max_acceleration: 2048.0,

            ground_friction: 8.0,
            braking_deceleration_walking: 2048.0,
            braking_deceleration_flying: 0.0,
            braking_friction_factor: 2.0,

            falling_lateral_friction: 0.0,
            braking_deceleration_falling: 0.0,
            braking_deceleration_falling_over_max_walk: 2000.0,
            slow_down_to_max_walk_speed_in_fall: true,

            air_control: 0.4,
            air_control_boost_multiplier: 2.0,
            air_control_boost_velocity_threshold: 25.0,

            gravity_y: -980.0,
            terminal_velocity: 4000.0,
            jump_y_velocity: 420.0,

            max_step_height: 45.0,
            walkable_floor_y: 0.71,
            perch_radius_threshold: 0.0,

            max_simulation_iterations: 8,
            max_simulation_time_step: 0.05,

            swing_arm_min: 150.0,
            swing_arm_max: 400.0,

            late_wall_jump_enabled: true,
            late_wall_jump_interval: 0.1,
            wall_jump_horizontal_speed: 200.0,
            wall_jump_vertical_speed: 950.0,

            max_depenetration: 100.0,
            root_motion_scale: 1.0,
            orient_to_movement: true,
            rng_seed: 0x5eed,
        }
    }
}

impl MovementConfig {
    /// Parse a TOML document and validate the result.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("parsing movement config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the steppers cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.swing_arm_min <= 0.0 || self.swing_arm_max < self.swing_arm_min {
            bail!(
                "swing arm range [{}, {}] is empty or non-positive",
                self.swing_arm_min,
                self.swing_arm_max
            );
        }
        if self.max_simulation_iterations == 0 {
            bail!("max_simulation_iterations must be at least 1");
        }
        if self.max_simulation_time_step <= 0.0 {
            bail!(
                "max_simulation_time_step must be positive, got {}",
                self.max_simulation_time_step
            );
        }
        if self.late_wall_jump_interval < 0.0 {
            bail!(
                "late_wall_jump_interval must not be negative, got {}",
                self.late_wall_jump_interval
            );
        }
        if !(self.walkable_floor_y > 0.0 && self.walkable_floor_y <= 1.0) {
            bail!(
                "walkable_floor_y must be in (0, 1], got {}",
                self.walkable_floor_y
            );
        }
        if self.terminal_velocity < 0.0 || self.max_walk_speed < 0.0 {
            bail!("speed limits must not be negative");
        }
        Ok(())
    }

    #[inline]
    pub fn clamp_swing_arm(&self, arm: f32) -> f32 {
        arm.clamp(self.swing_arm_min, self.swing_arm_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MovementConfig::default().validate().is_ok());
    }

    #[test]
    fn toml_overrides_keep_remaining_defaults() {
        let config = MovementConfig::from_toml_str(
            r#"
            swing_arm_max = 350.0
            late_wall_jump_interval = 0.2
            "#,
        )
        .unwrap();

        assert_eq!(config.swing_arm_max, 350.0);
        assert_eq!(config.late_wall_jump_interval, 0.2);
        assert_eq!(config.max_walk_speed, 500.0);
        assert_eq!(config.wall_jump_vertical_speed, 950.0);
    }

    #[test]
    fn inverted_swing_range_is_rejected() {
        let err = MovementConfig::from_toml_str("swing_arm_min = 500.0\nswing_arm_max = 400.0")
            .unwrap_err();
        assert!(err.to_string().contains("swing arm range"));
    }

    #[test]
    fn malformed_toml_reports_context() {
        let err = MovementConfig::from_toml_str("max_walk_speed = \"fast\"").unwrap_err();
        assert!(format!("{err:#}").contains("parsing movement config"));
    }

    #[test]
    fn swing_arm_clamps_into_range() {
        let config = MovementConfig::default();
        assert_eq!(config.clamp_swing_arm(900.0), 400.0);
        assert_eq!(config.clamp_swing_arm(10.0), 150.0);
        assert_eq!(config.clamp_swing_arm(200.0), 200.0);
    }
}

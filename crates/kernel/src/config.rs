//! Simulation and player tuning.
//!
//! Defaults reproduce the original arena: a 1.8 m tall player walking at
//! 0.12 units per frame, which at the 60 Hz tick is 7.2 m/s.

use serde::{Deserialize, Serialize};

/// Player body and movement parameters. Units are meters and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Body height, feet to top of head.
    pub height: f32,
    /// Camera height above the feet.
    pub eye_height: f32,
    /// Half-width of the body box in X and Z.
    pub radius: f32,
    pub walk_speed: f32,
    /// Fraction of walk speed available while airborne.
    pub air_control: f32,
    /// Vertical speed given by a jump.
    pub jump_speed: f32,
    /// Downward acceleration.
    pub gravity: f32,
    pub max_fall_speed: f32,
    /// Gap between the feet and the bottom of the collision box, so a
    /// standing body never overlaps the surface under it.
    pub skin: f32,
    /// How far above the feet the ground ray starts.
    pub probe_height: f32,
    /// Extra ray length that keeps the player glued to the ground.
    pub ground_snap: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            height: 1.8,
            eye_height: 1.8,
            radius: 0.3,
            walk_speed: 7.2,
            air_control: 1.0,
            jump_speed: 8.0,
            gravity: 24.0,
            max_fall_speed: 50.0,
            skin: 0.01,
            probe_height: 0.5,
            ground_snap: 0.05,
        }
    }
}

/// Fixed-step simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation ticks per second.
    pub tick_rate: f32,
    /// Feet below this height respawn the player.
    pub kill_plane_y: f32,
    /// Broad-phase cell size.
    pub cell_size: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            kill_plane_y: -20.0,
            cell_size: 4.0,
        }
    }
}

impl SimConfig {
    /// Seconds per tick.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate
    }

    pub fn is_valid(&self) -> bool {
        self.tick_rate.is_finite() && self.tick_rate > 0.0
    }
}

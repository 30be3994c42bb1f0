use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Everything the simulation needs from the player for one tick.
///
/// The kernel consumes this, never raw device events, so desktop input,
/// scripted input and recorded input all drive the same code path.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerInput {
    /// x = strafe right, y = forward. Length is clamped to 1 by the kernel.
    pub move_axis: Vec2,
    /// Absolute view yaw in radians. Yaw 0 looks down -Z.
    pub yaw: f32,
    /// Absolute view pitch in radians.
    pub pitch: f32,
    /// Held jump. Takes effect on the next tick the player is grounded.
    pub jump: bool,
    /// Interact pressed this tick.
    pub interact: bool,
}

impl PlayerInput {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn forward(yaw: f32) -> Self {
        Self {
            move_axis: Vec2::Y,
            yaw,
            ..Self::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.move_axis == Vec2::ZERO && !self.jump && !self.interact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert!(PlayerInput::default().is_idle());
        assert!(PlayerInput::idle().is_idle());
    }

    #[test]
    fn forward_keeps_yaw() {
        let input = PlayerInput::forward(1.5);
        assert_eq!(input.move_axis, Vec2::Y);
        assert_eq!(input.yaw, 1.5);
        assert!(!input.is_idle());
    }
}

use crate::action::Action;
use arena_common::PlayerInput;
use glam::Vec2;

/// Pitch limit, in radians (89 degrees).
pub const PITCH_LIMIT: f32 = 89.0_f32 * std::f32::consts::PI / 180.0;

/// Default mouse sensitivity in radians per pixel.
pub const DEFAULT_SENSITIVITY: f32 = 0.0025;

/// Held actions and view angles between simulation ticks.
///
/// The window layer feeds it actions as they arrive; the fixed-step loop
/// calls [`InputState::to_player_input`] once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct InputState {
    pub sensitivity: f32,
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    jump: bool,
    interact: bool,
    yaw: f32,
    pitch: f32,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            forward: false,
            back: false,
            left: false,
            right: false,
            jump: false,
            interact: false,
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

impl InputState {
    pub fn new(sensitivity: f32) -> Self {
        Self {
            sensitivity,
            ..Self::default()
        }
    }

    /// Apply an action. `pressed` is false for key releases.
    pub fn apply(&mut self, action: Action, pressed: bool) {
        match action {
            Action::MoveForward => self.forward = pressed,
            Action::MoveBack => self.back = pressed,
            Action::StrafeLeft => self.left = pressed,
            Action::StrafeRight => self.right = pressed,
            Action::Jump => self.jump = pressed,
            Action::Interact => {
                if pressed {
                    self.interact = true;
                }
            }
            Action::Look(delta) => self.look(delta),
            Action::Save | Action::Load | Action::ToggleHud | Action::Pause | Action::Noop => {}
        }
    }

    /// Turn by a mouse delta in pixels. Right turns right, up looks up.
    pub fn look(&mut self, delta: Vec2) {
        self.yaw = wrap_angle(self.yaw - delta.x * self.sensitivity);
        self.pitch = (self.pitch - delta.y * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Release everything held, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.forward = false;
        self.back = false;
        self.left = false;
        self.right = false;
        self.jump = false;
        self.interact = false;
    }

    /// Adopt the view of a restored world.
    pub fn set_view(&mut self, yaw: f32, pitch: f32) {
        self.yaw = wrap_angle(yaw);
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Input for the next tick. Consumes a pending interact press.
    pub fn to_player_input(&mut self) -> PlayerInput {
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f32;
        let input = PlayerInput {
            move_axis: Vec2::new(axis(self.right, self.left), axis(self.forward, self.back)),
            yaw: self.yaw,
            pitch: self.pitch,
            jump: self.jump,
            interact: self.interact,
        };
        self.interact = false;
        input
    }
}

fn wrap_angle(a: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (a + PI).rem_euclid(TAU) - PI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_build_move_axis() {
        let mut s = InputState::default();
        s.apply(Action::MoveForward, true);
        s.apply(Action::StrafeLeft, true);
        let input = s.to_player_input();
        assert_eq!(input.move_axis, Vec2::new(-1.0, 1.0));

        // Still held next tick.
        assert_eq!(s.to_player_input().move_axis, Vec2::new(-1.0, 1.0));

        s.apply(Action::MoveForward, false);
        s.apply(Action::MoveBack, true);
        assert_eq!(s.to_player_input().move_axis, Vec2::new(-1.0, -1.0));
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut s = InputState::default();
        s.apply(Action::StrafeLeft, true);
        s.apply(Action::StrafeRight, true);
        assert_eq!(s.to_player_input().move_axis.x, 0.0);
    }

    #[test]
    fn jump_is_level_triggered() {
        let mut s = InputState::default();
        s.apply(Action::Jump, true);
        assert!(s.to_player_input().jump);
        assert!(s.to_player_input().jump);
        s.apply(Action::Jump, false);
        assert!(!s.to_player_input().jump);
    }

    #[test]
    fn interact_is_edge_triggered() {
        let mut s = InputState::default();
        s.apply(Action::Interact, true);
        assert!(s.to_player_input().interact);
        assert!(!s.to_player_input().interact);
        // Release does not re-arm or cancel.
        s.apply(Action::Interact, true);
        s.apply(Action::Interact, false);
        assert!(s.to_player_input().interact);
    }

    #[test]
    fn mouse_right_turns_right() {
        let mut s = InputState::new(0.01);
        s.look(Vec2::new(100.0, 0.0));
        assert!((s.yaw() + 1.0).abs() < 1e-6);
        // Yaw -1 faces toward +X.
        assert!(-s.yaw().sin() > 0.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut s = InputState::new(0.01);
        s.apply(Action::Look(Vec2::new(0.0, -10_000.0)), true);
        assert_eq!(s.pitch(), PITCH_LIMIT);
        s.look(Vec2::new(0.0, 20_000.0));
        assert_eq!(s.pitch(), -PITCH_LIMIT);
    }

    #[test]
    fn yaw_wraps() {
        let mut s = InputState::new(1.0);
        for _ in 0..10 {
            s.look(Vec2::new(1.0, 0.0));
        }
        assert!(s.yaw().abs() <= std::f32::consts::PI);
    }

    #[test]
    fn release_all_clears_held() {
        let mut s = InputState::default();
        s.apply(Action::MoveForward, true);
        s.apply(Action::Jump, true);
        s.release_all();
        assert!(s.to_player_input().is_idle());
    }

    #[test]
    fn app_commands_do_not_touch_movement() {
        let mut s = InputState::default();
        s.apply(Action::Save, true);
        s.apply(Action::Pause, true);
        assert!(s.to_player_input().is_idle());
    }
}

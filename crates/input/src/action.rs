use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A high-level action produced by the window layer.
///
/// The simulation never sees raw key or mouse events. Movement actions are
/// held; the rest fire on press.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    MoveForward,
    MoveBack,
    StrafeLeft,
    StrafeRight,
    Jump,
    Interact,
    /// Mouse delta in pixels. Produced by motion events, never bound to a key.
    Look(Vec2),
    /// Write a save to disk.
    Save,
    /// Restore the latest save.
    Load,
    ToggleHud,
    Pause,
    /// Bound but does nothing.
    Noop,
}

impl Action {
    /// Actions whose effect lasts while the key is down.
    pub fn is_held(&self) -> bool {
        matches!(
            self,
            Self::MoveForward | Self::MoveBack | Self::StrafeLeft | Self::StrafeRight | Self::Jump
        )
    }

    /// Actions handled by the app rather than the simulation.
    pub fn is_app_command(&self) -> bool {
        matches!(self, Self::Save | Self::Load | Self::ToggleHud | Self::Pause)
    }
}

//! Input mapping: key names to actions, held actions to per-tick player input.
//!
//! # Invariants
//! - The simulation only ever receives `PlayerInput`; window events stop here.
//! - Jump follows the key while held; interact fires once per press.

pub mod action;
pub mod bindings;
pub mod state;

pub use action::Action;
pub use bindings::{BindingError, KeyBindings};
pub use state::{DEFAULT_SENSITIVITY, InputState, PITCH_LIMIT};

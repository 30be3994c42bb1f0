//! Shared types for the arena workspace.
//!
//! Everything in here is plain data: identifiers, spatial primitives and the
//! per-tick player input record. No crate below the kernel owns behaviour.

mod geometry;
mod input;
mod types;

pub use geometry::{Aabb, Ray, RayHit};
pub use input::PlayerInput;
pub use types::{EntityId, TaskId, Transform};

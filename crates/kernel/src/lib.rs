//! Arena kernel: authoritative world state, fixed-step simulation, deterministic replay.
//!
//! # Invariants
//! - `World::step` advances exactly one fixed tick; render rate never reaches physics.
//! - A step is pure with respect to its input: same world + same input = same world.
//! - All observable state changes are reported through `WorldEvent`s.

pub mod body;
pub mod collision;
pub mod config;
pub mod npc;
pub mod player;
pub mod rng;
pub mod task;
pub mod world;

pub use body::{BodyKind, StaticBody};
pub use collision::CollisionScene;
pub use config::{PlayerTuning, SimConfig};
pub use npc::{Npc, NpcMode};
pub use player::PlayerState;
pub use task::{Task, TaskError, TaskGraph, TaskStatus, TaskTrigger};
pub use world::{World, WorldError, WorldEvent};

//! Developer tooling: read-only arena inspection for the HUD and CLI.
//!
//! # Invariants
//! - Tools never mutate the world.

mod inspector;

pub use inspector::{ArenaInspector, ArenaSummary, NpcInfo, TaskInfo};

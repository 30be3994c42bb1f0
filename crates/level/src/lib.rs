//! Level definitions and world construction.
//!
//! A level is plain data (YAML or JSON, chosen by file extension). The
//! built-in arena is available as [`LevelDef::default_arena`].
//!
//! # Invariants
//! - `build` validates first; an invalid level never produces a world.
//! - Building the same level with the same seed yields identical worlds.

mod builtin;
mod def;

pub use def::{ArenaDef, LevelDef, LevelError, NpcDef, ObstacleDef, PlayerDef, TaskDef};

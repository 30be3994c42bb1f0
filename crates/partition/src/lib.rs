//! Broad-phase: a uniform grid over the XZ plane.
//!
//! # Invariants
//! - Every registered box is reachable from every cell it overlaps.
//! - Queries return a superset of the true hits; narrow phase is the caller's job.
//! - Query results are ordered sets, so iteration is deterministic.

mod grid;

pub use grid::{CellCoord, DEFAULT_CELL_SIZE, GridPartition, PartitionError};

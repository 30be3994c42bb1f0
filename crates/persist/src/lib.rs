//! Persistence: world snapshots, recorded input, and a file-backed save store.
//!
//! # Invariants
//! - Input logs are append-only and strictly ordered by tick.
//! - Snapshots are content-addressed and verifiable.
//! - Loading a save = latest snapshot + replay of the input recorded after it.
//! - Schema and hash mismatches fail closed.

mod codec;
pub mod snapshot;
pub mod store;

pub use codec::sha256_hex;
pub use snapshot::{InputFrame, InputLog, Snapshot};
pub use store::{
    INPUT_SCHEMA_VERSION, IntegrityManifest, ManifestEntry, SAVE_SCHEMA_VERSION, SaveMeta,
    SaveStore, SegmentKind, StoreError,
};

//! File-backed save store.
//!
//! Layout inside the save directory:
//! ```text
//! save.meta.json               - metadata and schema versions
//! snapshots/
//!   000001.snapshot.cbor.zst   - CBOR+zstd compressed world snapshots
//! inputs/
//!   000001.inputs.cbor.zst     - CBOR+zstd compressed input segments
//! integrity/
//!   manifest.json              - sha256 hash chain over every file above
//! ```
//!
//! The manifest is also the timeline: the latest save is the last snapshot
//! entry plus every input segment written after it.

use crate::codec::{decode, encode, sha256_hex};
use crate::snapshot::{InputFrame, InputLog, Snapshot};
use arena_kernel::World;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current schema versions.
pub const SAVE_SCHEMA_VERSION: u32 = 1;
pub const INPUT_SCHEMA_VERSION: u32 = 1;

const META_FILE: &str = "save.meta.json";
const SNAPSHOT_DIR: &str = "snapshots";
const INPUT_DIR: &str = "inputs";
const INTEGRITY_DIR: &str = "integrity";
const MANIFEST_FILE: &str = "manifest.json";

/// Errors from persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("{0} is not listed in the integrity manifest")]
    Untracked(String),
    #[error("snapshot {0} failed verification")]
    CorruptSnapshot(String),
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("input frame for tick {tick} recorded after tick {last}")]
    OutOfOrder { last: u64, tick: u64 },
    #[error("input log gap: expected tick {expected}, found {found}")]
    InputGap { expected: u64, found: u64 },
    #[error("no snapshots found")]
    NoSnapshots,
}

/// Metadata stored in save.meta.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMeta {
    pub save_schema_version: u32,
    pub input_schema_version: u32,
    pub snapshot_count: u32,
    pub input_segment_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Snapshot,
    Inputs,
}

impl SegmentKind {
    fn dir(self) -> &'static str {
        match self {
            Self::Snapshot => SNAPSHOT_DIR,
            Self::Inputs => INPUT_DIR,
        }
    }

    fn filename(self, index: u32) -> String {
        match self {
            Self::Snapshot => format!("{index:06}.snapshot.cbor.zst"),
            Self::Inputs => format!("{index:06}.inputs.cbor.zst"),
        }
    }
}

/// A single entry in the integrity manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub kind: SegmentKind,
    pub filename: String,
    /// Tick of the snapshot, or of the last frame in an input segment.
    pub tick: u64,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Integrity manifest tracking all file hashes in a chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

/// File-backed save store with schema versioning and integrity checking.
#[derive(Debug)]
pub struct SaveStore {
    root: PathBuf,
    meta: SaveMeta,
    manifest: IntegrityManifest,
}

impl SaveStore {
    /// Open or create a save store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(SNAPSHOT_DIR))?;
        std::fs::create_dir_all(root.join(INPUT_DIR))?;
        std::fs::create_dir_all(root.join(INTEGRITY_DIR))?;

        let meta_path = root.join(META_FILE);
        let manifest_path = root.join(INTEGRITY_DIR).join(MANIFEST_FILE);

        let (meta, manifest) = if meta_path.exists() {
            let meta: SaveMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            check_version(meta.save_schema_version, SAVE_SCHEMA_VERSION)?;
            check_version(meta.input_schema_version, INPUT_SCHEMA_VERSION)?;
            let manifest: IntegrityManifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (reconcile(meta, &manifest), manifest)
        } else {
            let meta = SaveMeta {
                save_schema_version: SAVE_SCHEMA_VERSION,
                input_schema_version: INPUT_SCHEMA_VERSION,
                snapshot_count: 0,
                input_segment_count: 0,
            };
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            tracing::info!(path = %root.display(), "created save store");
            (meta, manifest)
        };

        Ok(Self {
            root,
            meta,
            manifest,
        })
    }

    /// Snapshot the world and write it to disk. Returns the snapshot index.
    pub fn take_snapshot(&mut self, world: &World) -> Result<u32, StoreError> {
        let snap = Snapshot::capture(world)?;
        let index = self.next_index(SegmentKind::Snapshot);
        self.write_segment(SegmentKind::Snapshot, index, snap.tick, &snap)?;
        self.meta.snapshot_count = index;
        self.save_meta()?;
        tracing::info!(index, tick = snap.tick, hash = snap.state_hash, "snapshot written");
        Ok(index)
    }

    /// Append recorded input as a new segment. Empty input writes nothing.
    pub fn append_inputs(&mut self, frames: &[InputFrame]) -> Result<(), StoreError> {
        let Some(last) = frames.last() else {
            return Ok(());
        };
        let index = self.next_index(SegmentKind::Inputs);
        self.write_segment(SegmentKind::Inputs, index, last.tick, frames)?;
        self.meta.input_segment_count = index;
        self.save_meta()?;
        tracing::debug!(index, frames = frames.len(), "input segment written");
        Ok(())
    }

    /// Load the latest snapshot and replay the input recorded after it.
    pub fn load_latest(&self) -> Result<World, StoreError> {
        let Some(pos) = self
            .manifest
            .entries
            .iter()
            .rposition(|e| e.kind == SegmentKind::Snapshot)
        else {
            return Err(StoreError::NoSnapshots);
        };

        let entry = &self.manifest.entries[pos];
        let snap: Snapshot = self.read_segment(entry)?;
        if !snap.verify() {
            return Err(StoreError::CorruptSnapshot(entry.filename.clone()));
        }

        let mut log = InputLog::new();
        for seg in self.manifest.entries[pos + 1..]
            .iter()
            .filter(|e| e.kind == SegmentKind::Inputs)
        {
            let frames: Vec<InputFrame> = self.read_segment(seg)?;
            log.extend(&frames)?;
        }
        let world = log.replay_from(&snap)?;
        tracing::info!(
            snapshot = %entry.filename,
            snapshot_tick = snap.tick,
            replayed = log.after(snap.tick).len(),
            tick = world.tick(),
            "save loaded"
        );
        Ok(world)
    }

    /// Load a specific snapshot by index, verified against the manifest.
    pub fn load_snapshot(&self, index: u32) -> Result<Snapshot, StoreError> {
        let filename = SegmentKind::Snapshot.filename(index);
        let entry = self
            .manifest
            .entries
            .iter()
            .find(|e| e.filename == filename)
            .ok_or(StoreError::Untracked(filename))?;
        self.read_segment(entry)
    }

    /// Verify all integrity hashes in the manifest.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        let mut prev_hash: Option<String> = None;
        for entry in &self.manifest.entries {
            if entry.prev_hash != prev_hash {
                return Err(StoreError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: prev_hash.unwrap_or_else(|| "None".into()),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }
            let data = std::fs::read(self.segment_path(entry.kind, &entry.filename))?;
            check_hash(entry, &data)?;
            prev_hash = Some(entry.sha256.clone());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &SaveMeta {
        &self.meta
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.manifest.entries
    }

    pub fn has_snapshot(&self) -> bool {
        self.meta.snapshot_count > 0
    }

    /// Segment numbers come from the manifest, never from the meta counts,
    /// so a stale meta file cannot reuse a hashed filename.
    fn next_index(&self, kind: SegmentKind) -> u32 {
        listed(&self.manifest, kind) + 1
    }

    fn segment_path(&self, kind: SegmentKind, filename: &str) -> PathBuf {
        self.root.join(kind.dir()).join(filename)
    }

    fn write_segment<T: Serialize + ?Sized>(
        &mut self,
        kind: SegmentKind,
        index: u32,
        tick: u64,
        value: &T,
    ) -> Result<(), StoreError> {
        let filename = kind.filename(index);
        let compressed = encode(value)?;
        let sha256 = sha256_hex(&compressed);
        let prev_hash = self.manifest.entries.last().map(|e| e.sha256.clone());

        std::fs::write(self.segment_path(kind, &filename), &compressed)?;

        self.manifest.entries.push(ManifestEntry {
            kind,
            filename,
            tick,
            sha256,
            prev_hash,
        });
        self.save_manifest()
    }

    fn read_segment<T: for<'de> Deserialize<'de>>(
        &self,
        entry: &ManifestEntry,
    ) -> Result<T, StoreError> {
        let data = std::fs::read(self.segment_path(entry.kind, &entry.filename))?;
        check_hash(entry, &data)?;
        decode(&data)
    }

    fn save_meta(&self) -> Result<(), StoreError> {
        let path = self.root.join(META_FILE);
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), StoreError> {
        let path = self.root.join(INTEGRITY_DIR).join(MANIFEST_FILE);
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.manifest)?;
        Ok(())
    }
}

fn listed(manifest: &IntegrityManifest, kind: SegmentKind) -> u32 {
    manifest.entries.iter().filter(|e| e.kind == kind).count() as u32
}

/// Bring the meta counts in line with what the manifest actually records.
fn reconcile(mut meta: SaveMeta, manifest: &IntegrityManifest) -> SaveMeta {
    let snapshots = listed(manifest, SegmentKind::Snapshot);
    let inputs = listed(manifest, SegmentKind::Inputs);
    if meta.snapshot_count != snapshots || meta.input_segment_count != inputs {
        tracing::warn!(
            meta_snapshots = meta.snapshot_count,
            snapshots,
            meta_inputs = meta.input_segment_count,
            inputs,
            "save meta out of date, using manifest counts"
        );
        meta.snapshot_count = snapshots;
        meta.input_segment_count = inputs;
    }
    meta
}

fn check_version(file_version: u32, expected_version: u32) -> Result<(), StoreError> {
    if file_version != expected_version {
        return Err(StoreError::SchemaMismatch {
            file_version,
            expected_version,
        });
    }
    Ok(())
}

fn check_hash(entry: &ManifestEntry, data: &[u8]) -> Result<(), StoreError> {
    let actual = sha256_hex(data);
    if actual != entry.sha256 {
        tracing::warn!(file = %entry.filename, "integrity hash mismatch");
        return Err(StoreError::IntegrityMismatch {
            file: entry.filename.clone(),
            expected: entry.sha256.clone(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_common::PlayerInput;
    use arena_level::LevelDef;

    fn arena(seed: u64) -> World {
        LevelDef::default_arena().build(seed).unwrap()
    }

    /// Step `ticks` times with a varying walk, returning the recorded frames.
    fn play(world: &mut World, ticks: u64) -> Vec<InputFrame> {
        (0..ticks)
            .map(|i| {
                let input = PlayerInput {
                    jump: i % 40 == 5,
                    ..PlayerInput::forward(0.02 * i as f32)
                };
                world.step(&input);
                InputFrame {
                    tick: world.tick(),
                    input,
                }
            })
            .collect()
    }

    #[test]
    fn store_open_creates_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SaveStore::open(tmp.path().join("save")).unwrap();
        assert_eq!(store.meta().snapshot_count, 0);
        assert_eq!(store.meta().input_segment_count, 0);
        assert!(store.root().join("snapshots").is_dir());
        assert!(store.root().join("inputs").is_dir());
        assert!(store.root().join("integrity").join("manifest.json").is_file());
        assert!(store.root().join("save.meta.json").is_file());
        assert!(!store.has_snapshot());
    }

    #[test]
    fn empty_store_has_nothing_to_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SaveStore::open(tmp.path()).unwrap();
        assert!(matches!(store.load_latest(), Err(StoreError::NoSnapshots)));
    }

    #[test]
    fn snapshot_and_load_after_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("save");
        let mut world = arena(42);
        play(&mut world, 90);
        let hash = world.state_hash();

        {
            let mut store = SaveStore::open(&path).unwrap();
            assert_eq!(store.take_snapshot(&world).unwrap(), 1);
        }

        let store = SaveStore::open(&path).unwrap();
        assert_eq!(store.meta().snapshot_count, 1);
        let loaded = store.load_latest().unwrap();
        assert_eq!(loaded.tick(), world.tick());
        assert_eq!(loaded.seed(), world.seed());
        assert_eq!(loaded.state_hash(), hash);
    }

    #[test]
    fn inputs_after_snapshot_are_replayed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SaveStore::open(tmp.path()).unwrap();
        let mut world = arena(7);

        play(&mut world, 30);
        store.take_snapshot(&world).unwrap();
        let seg1 = play(&mut world, 45);
        store.append_inputs(&seg1).unwrap();
        let seg2 = play(&mut world, 45);
        store.append_inputs(&seg2).unwrap();

        let loaded = SaveStore::open(tmp.path()).unwrap().load_latest().unwrap();
        assert_eq!(loaded.tick(), 120);
        assert_eq!(loaded.state_hash(), world.state_hash());
    }

    #[test]
    fn inputs_before_latest_snapshot_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SaveStore::open(tmp.path()).unwrap();
        let mut world = arena(3);

        store.take_snapshot(&world).unwrap();
        let early = play(&mut world, 20);
        store.append_inputs(&early).unwrap();
        store.take_snapshot(&world).unwrap();
        let late = play(&mut world, 20);
        store.append_inputs(&late).unwrap();

        let loaded = store.load_latest().unwrap();
        assert_eq!(loaded.tick(), 40);
        assert_eq!(loaded.state_hash(), world.state_hash());
        assert_eq!(store.entries().len(), 4);
    }

    #[test]
    fn empty_input_segment_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SaveStore::open(tmp.path()).unwrap();
        store.append_inputs(&[]).unwrap();
        assert_eq!(store.meta().input_segment_count, 0);
        assert!(store.entries().is_empty());
    }

    #[test]
    fn manifest_forms_a_hash_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SaveStore::open(tmp.path()).unwrap();
        let mut world = arena(1);
        store.take_snapshot(&world).unwrap();
        let frames = play(&mut world, 10);
        store.append_inputs(&frames).unwrap();
        store.take_snapshot(&world).unwrap();

        let entries = store.entries();
        assert_eq!(entries[0].prev_hash, None);
        assert_eq!(entries[1].prev_hash.as_ref(), Some(&entries[0].sha256));
        assert_eq!(entries[2].prev_hash.as_ref(), Some(&entries[1].sha256));
        assert_eq!(entries[1].tick, 10);
        store.verify_integrity().unwrap();
    }

    #[test]
    fn corruption_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("save");
        let mut store = SaveStore::open(&path).unwrap();
        store.take_snapshot(&arena(7)).unwrap();

        let snap_path = path.join("snapshots").join("000001.snapshot.cbor.zst");
        let mut data = std::fs::read(&snap_path).unwrap();
        if let Some(byte) = data.last_mut() {
            *byte ^= 0xff;
        }
        std::fs::write(&snap_path, &data).unwrap();

        let store = SaveStore::open(&path).unwrap();
        assert!(matches!(
            store.verify_integrity(),
            Err(StoreError::IntegrityMismatch { .. })
        ));
        assert!(matches!(
            store.load_latest(),
            Err(StoreError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn broken_chain_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().to_path_buf();
        let mut store = SaveStore::open(&path).unwrap();
        let world = arena(2);
        store.take_snapshot(&world).unwrap();
        store.take_snapshot(&world).unwrap();

        let manifest_path = path.join("integrity").join("manifest.json");
        let mut manifest: IntegrityManifest =
            serde_json::from_reader(std::fs::File::open(&manifest_path).unwrap()).unwrap();
        manifest.entries[1].prev_hash = Some("0".repeat(64));
        serde_json::to_writer_pretty(std::fs::File::create(&manifest_path).unwrap(), &manifest)
            .unwrap();

        let store = SaveStore::open(&path).unwrap();
        assert!(store.verify_integrity().is_err());
    }

    #[test]
    fn load_snapshot_by_index() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = SaveStore::open(tmp.path()).unwrap();
        let mut world = arena(9);
        store.take_snapshot(&world).unwrap();
        play(&mut world, 5);
        store.take_snapshot(&world).unwrap();

        assert_eq!(store.load_snapshot(1).unwrap().tick, 0);
        assert_eq!(store.load_snapshot(2).unwrap().tick, 5);
        assert!(matches!(store.load_snapshot(3), Err(StoreError::Untracked(_))));
    }

    #[test]
    fn stale_meta_does_not_overwrite_hashed_segments() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("save");
        let mut world = arena(5);
        SaveStore::open(&path).unwrap().take_snapshot(&world).unwrap();

        // Meta left behind as if its write after the manifest had failed.
        let meta_path = path.join("save.meta.json");
        let mut meta: SaveMeta =
            serde_json::from_reader(std::fs::File::open(&meta_path).unwrap()).unwrap();
        meta.snapshot_count = 0;
        serde_json::to_writer_pretty(std::fs::File::create(&meta_path).unwrap(), &meta).unwrap();

        let mut store = SaveStore::open(&path).unwrap();
        assert_eq!(store.meta().snapshot_count, 1);
        assert!(store.has_snapshot());
        play(&mut world, 12);
        assert_eq!(store.take_snapshot(&world).unwrap(), 2);

        store.verify_integrity().unwrap();
        assert_eq!(store.load_snapshot(1).unwrap().tick, 0);
        assert_eq!(store.load_snapshot(2).unwrap().tick, 12);
        assert_ne!(store.entries()[0].filename, store.entries()[1].filename);
    }

    #[test]
    fn schema_mismatch_fail_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("save");
        let _store = SaveStore::open(&path).unwrap();

        let meta_path = path.join("save.meta.json");
        let mut meta: SaveMeta =
            serde_json::from_reader(std::fs::File::open(&meta_path).unwrap()).unwrap();
        meta.save_schema_version = 999;
        serde_json::to_writer_pretty(std::fs::File::create(&meta_path).unwrap(), &meta).unwrap();

        match SaveStore::open(&path) {
            Err(StoreError::SchemaMismatch {
                file_version,
                expected_version,
            }) => {
                assert_eq!(file_version, 999);
                assert_eq!(expected_version, SAVE_SCHEMA_VERSION);
            }
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}

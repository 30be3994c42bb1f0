use crate::codec::{cbor_serialize, sha256_hex};
use crate::store::StoreError;
use arena_common::PlayerInput;
use arena_kernel::World;
use serde::{Deserialize, Serialize};

/// A content-addressed snapshot of the whole world at one tick.
///
/// `sha256` covers the CBOR encoding of the world, so a snapshot that was
/// altered after capture no longer verifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub seed: u64,
    /// `World::state_hash` at capture time.
    pub state_hash: u64,
    pub sha256: String,
    world: World,
}

impl Snapshot {
    /// Capture the current world.
    pub fn capture(world: &World) -> Result<Self, StoreError> {
        let sha256 = sha256_hex(&cbor_serialize(world)?);
        Ok(Self {
            tick: world.tick(),
            seed: world.seed(),
            state_hash: world.state_hash(),
            sha256,
            world: world.clone(),
        })
    }

    /// Recompute the content hash and compare it, along with the header fields.
    pub fn verify(&self) -> bool {
        let Ok(bytes) = cbor_serialize(&self.world) else {
            return false;
        };
        sha256_hex(&bytes) == self.sha256
            && self.world.tick() == self.tick
            && self.world.seed() == self.seed
            && self.world.state_hash() == self.state_hash
    }

    /// The captured world, ready to step.
    pub fn restore(&self) -> World {
        let mut world = self.world.clone();
        world.reindex();
        world
    }

    pub fn world(&self) -> &World {
        &self.world
    }
}

/// One recorded tick of player input. `tick` is the tick the input produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    pub tick: u64,
    pub input: PlayerInput,
}

/// Append-only log of player input, one frame per simulated tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputLog {
    frames: Vec<InputFrame>,
}

impl InputLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame. Ticks must increase strictly.
    pub fn push(&mut self, tick: u64, input: PlayerInput) -> Result<(), StoreError> {
        if let Some(last) = self.frames.last().map(|f| f.tick) {
            if tick <= last {
                return Err(StoreError::OutOfOrder { last, tick });
            }
        }
        self.frames.push(InputFrame { tick, input });
        Ok(())
    }

    pub fn extend(&mut self, frames: &[InputFrame]) -> Result<(), StoreError> {
        for frame in frames {
            self.push(frame.tick, frame.input)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[InputFrame] {
        &self.frames
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.frames.last().map(|f| f.tick)
    }

    /// Frames recorded after `tick`.
    pub fn after(&self, tick: u64) -> &[InputFrame] {
        let start = self.frames.partition_point(|f| f.tick <= tick);
        &self.frames[start..]
    }

    /// Drop everything. Used after a save so the next segment starts empty.
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Restore the snapshot and re-simulate every frame recorded after it.
    ///
    /// Frames must be contiguous from `snapshot.tick + 1`; a gap means input
    /// was lost and the result would silently diverge.
    pub fn replay_from(&self, snapshot: &Snapshot) -> Result<World, StoreError> {
        let mut world = snapshot.restore();
        for frame in self.after(snapshot.tick) {
            let expected = world.tick() + 1;
            if frame.tick != expected {
                return Err(StoreError::InputGap {
                    expected,
                    found: frame.tick,
                });
            }
            world.step(&frame.input);
        }
        world.drain_events();
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_level::LevelDef;

    fn world() -> World {
        LevelDef::default_arena().build(42).unwrap()
    }

    fn record(world: &mut World, log: &mut InputLog, ticks: u64) {
        for i in 0..ticks {
            let input = PlayerInput {
                jump: i % 50 == 10,
                ..PlayerInput::forward(0.4)
            };
            world.step(&input);
            log.push(world.tick(), input).unwrap();
        }
    }

    #[test]
    fn snapshot_capture_and_verify() {
        let mut w = world();
        w.step(&PlayerInput::idle());
        let snap = Snapshot::capture(&w).unwrap();
        assert!(snap.verify());
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.state_hash, w.state_hash());
    }

    #[test]
    fn snapshot_corruption_detected() {
        let w = world();
        let mut snap = Snapshot::capture(&w).unwrap();
        snap.tick = 999;
        assert!(!snap.verify());

        let mut snap = Snapshot::capture(&w).unwrap();
        snap.sha256.replace_range(0..1, "x");
        assert!(!snap.verify());
    }

    #[test]
    fn restore_keeps_state_and_collision() {
        let mut w = world();
        for _ in 0..30 {
            w.step(&PlayerInput::forward(0.0));
        }
        let snap = Snapshot::capture(&w).unwrap();
        let mut restored = snap.restore();
        assert_eq!(restored.tick(), w.tick());
        assert_eq!(restored.state_hash(), w.state_hash());
        assert!(restored.raycast(&arena_common::Ray::down(restored.eye()), 3.0).is_some());

        restored.step(&PlayerInput::idle());
        w.step(&PlayerInput::idle());
        assert!(restored.player().grounded);
        assert_eq!(restored.state_hash(), w.state_hash());
    }

    #[test]
    fn log_rejects_out_of_order_ticks() {
        let mut log = InputLog::new();
        log.push(1, PlayerInput::idle()).unwrap();
        log.push(2, PlayerInput::idle()).unwrap();
        assert!(matches!(
            log.push(2, PlayerInput::idle()),
            Err(StoreError::OutOfOrder { last: 2, tick: 2 })
        ));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn after_skips_captured_frames() {
        let mut log = InputLog::new();
        for t in 1..=10 {
            log.push(t, PlayerInput::idle()).unwrap();
        }
        assert_eq!(log.after(4).len(), 6);
        assert_eq!(log.after(4)[0].tick, 5);
        assert!(log.after(10).is_empty());
        assert_eq!(log.after(0).len(), 10);
    }

    #[test]
    fn replay_from_snapshot_matches_live() {
        let mut live = world();
        let mut log = InputLog::new();
        record(&mut live, &mut log, 60);
        let snap = Snapshot::capture(&live).unwrap();
        record(&mut live, &mut log, 120);

        let replayed = log.replay_from(&snap).unwrap();
        assert_eq!(replayed.tick(), live.tick());
        assert_eq!(replayed.state_hash(), live.state_hash());
    }

    #[test]
    fn replay_detects_gaps() {
        let w = world();
        let snap = Snapshot::capture(&w).unwrap();
        let mut log = InputLog::new();
        log.push(1, PlayerInput::idle()).unwrap();
        log.push(3, PlayerInput::idle()).unwrap();
        assert!(matches!(
            log.replay_from(&snap),
            Err(StoreError::InputGap { expected: 2, found: 3 })
        ));
    }
}

use greatcold_kernel::{PersistError, PersistenceSink, SavedState};
use serde::{Deserialize, Serialize};

/// Simulation state at one tick plus a content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub state: SavedState,
    /// FNV-1a over the state's debug form. Every container in `SavedState` is
    /// ordered, so the text is stable.
    pub hash: u64,
}

impl Snapshot {
    pub fn capture(state: &SavedState) -> Self {
        Self {
            tick: state.tick,
            state: state.clone(),
            hash: content_hash(state),
        }
    }

    pub fn verify(&self) -> bool {
        self.tick == self.state.tick && self.hash == content_hash(&self.state)
    }
}

/// In-memory snapshot history with rollback.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: Vec<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot of `state`. Returns its index.
    pub fn take_snapshot(&mut self, state: &SavedState) -> usize {
        self.snapshots.push(Snapshot::capture(state));
        self.snapshots.len() - 1
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Return to snapshot `index`, dropping every later one.
    pub fn rollback(&mut self, index: usize) -> Option<SavedState> {
        let state = self.snapshots.get(index)?.state.clone();
        self.snapshots.truncate(index + 1);
        tracing::debug!(index, tick = state.tick, "rolled back");
        Some(state)
    }
}

impl PersistenceSink for SnapshotStore {
    fn save(&mut self, state: &SavedState) -> Result<(), PersistError> {
        self.take_snapshot(state);
        Ok(())
    }

    fn load(&mut self) -> Result<Option<SavedState>, PersistError> {
        match self.latest() {
            None => Ok(None),
            Some(snap) if snap.verify() => Ok(Some(snap.state.clone())),
            Some(snap) => Err(PersistError::Backend(format!(
                "snapshot at tick {} failed its hash check",
                snap.tick
            ))),
        }
    }
}

fn content_hash(state: &SavedState) -> u64 {
    fnv1a(format!("{state:?}").as_bytes())
}

fn fnv1a(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in data {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

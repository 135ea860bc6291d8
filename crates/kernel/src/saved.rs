use std::collections::BTreeMap;

use greatcold_common::{BlockPos, EntityId};
use serde::{Deserialize, Serialize};

use crate::freeze::FreezeState;
use crate::fuel::FuelKind;
use crate::stage::StageClock;

/// Persisted form of one heater: kind, position, fuel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedHeater {
    pub kind: FuelKind,
    pub pos: BlockPos,
    pub fuel_ms: u64,
}

/// Everything that survives a restart. Natural regions and session trackers
/// (insulation, creature exposure) are rebuilt instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedState {
    pub world: String,
    /// Simulation clock at save time.
    pub elapsed_ms: u64,
    pub tick: u64,
    pub stage: StageClock,
    pub heaters: Vec<SavedHeater>,
    pub freeze: BTreeMap<EntityId, FreezeState>,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("persistence backend failed: {0}")]
    Backend(String),
    #[error("saved state belongs to world {found:?}, expected {expected:?}")]
    WrongWorld { expected: String, found: String },
}

/// Where the simulation saves to and loads from.
pub trait PersistenceSink {
    fn save(&mut self, state: &SavedState) -> Result<(), PersistError>;

    /// Latest saved state, or `None` when nothing was ever saved.
    fn load(&mut self) -> Result<Option<SavedState>, PersistError>;
}

/// Sink that keeps nothing. For hosts that run without persistence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl PersistenceSink for Discard {
    fn save(&mut self, _state: &SavedState) -> Result<(), PersistError> {
        Ok(())
    }

    fn load(&mut self) -> Result<Option<SavedState>, PersistError> {
        Ok(None)
    }
}

use serde::{Deserialize, Serialize};

/// Highest global stage.
pub const MAX_GLOBAL_STAGE: u8 = 3;

/// Rejected global stage value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("global stage {0} out of range 0..={max}", max = MAX_GLOBAL_STAGE)]
    OutOfRange(u8),
}

/// World-wide cold severity. Selects which freeze threshold ladder applies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct GlobalStage(u8);

impl GlobalStage {
    pub const CALM: GlobalStage = GlobalStage(0);

    pub fn new(value: u8) -> Result<Self, StageError> {
        if value > MAX_GLOBAL_STAGE {
            return Err(StageError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Next stage in the auto-advance cycle; 3 wraps to 0.
    pub fn next(self) -> Self {
        Self((self.0 + 1) % (MAX_GLOBAL_STAGE + 1))
    }
}

impl TryFrom<u8> for GlobalStage {
    type Error = StageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GlobalStage> for u8 {
    fn from(stage: GlobalStage) -> u8 {
        stage.0
    }
}

impl std::fmt::Display for GlobalStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

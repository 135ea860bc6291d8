use greatcold_common::GlobalStage;
use serde::{Deserialize, Serialize};

/// Current global stage and when it ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageClock {
    pub stage: GlobalStage,
    /// Simulation time at which the stage ends; `None` while infinite.
    pub ends_at_ms: Option<u64>,
    pub infinite: bool,
    pub auto_advance: bool,
}

impl StageClock {
    /// Enter `stage` at `now_ms`, scheduling its end from `durations_secs`.
    pub fn start(&mut self, stage: GlobalStage, now_ms: u64, durations_secs: &[u64; 4]) {
        self.stage = stage;
        self.reschedule(now_ms, durations_secs);
    }

    pub fn set_infinite(&mut self, infinite: bool, now_ms: u64, durations_secs: &[u64; 4]) {
        self.infinite = infinite;
        self.reschedule(now_ms, durations_secs);
    }

    /// Move to the next stage (3 wraps to 0) once the deadline has passed and
    /// auto-advance is on. Returns the stage entered.
    pub fn advance_if_due(&mut self, now_ms: u64, durations_secs: &[u64; 4]) -> Option<GlobalStage> {
        if !self.auto_advance || self.infinite {
            return None;
        }
        let due = self.ends_at_ms.is_some_and(|end| now_ms >= end);
        if !due {
            return None;
        }
        let next = self.stage.next();
        self.start(next, now_ms, durations_secs);
        Some(next)
    }

    /// Milliseconds left in the current stage.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.ends_at_ms.map(|end| end.saturating_sub(now_ms))
    }

    fn reschedule(&mut self, now_ms: u64, durations_secs: &[u64; 4]) {
        self.ends_at_ms = if self.infinite {
            None
        } else {
            let secs = durations_secs[usize::from(self.stage.value())];
            Some(now_ms + secs * 1_000)
        };
    }
}

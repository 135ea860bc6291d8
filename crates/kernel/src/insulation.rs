use std::collections::HashMap;

use greatcold_common::{EffectSink, EntityId, InsulationWear};

use crate::config::InsulationConfig;

#[derive(Debug, Clone, Copy, Default)]
struct Wearer {
    worn_ms: u64,
    removed_ms: u64,
    wear_ms: u64,
    active: bool,
}

/// Change in one entity's insulation this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsulationChange {
    Activated,
    Deactivated,
    Broken,
}

/// Tracks heated-hat wear time per entity. Session state; never persisted.
#[derive(Debug, Clone, Default)]
pub struct InsulationTracker {
    config: InsulationConfig,
    wearers: HashMap<EntityId, Wearer>,
}

impl InsulationTracker {
    pub fn new(config: InsulationConfig) -> Self {
        Self {
            config,
            wearers: HashMap::new(),
        }
    }

    pub fn is_active(&self, id: EntityId) -> bool {
        self.wearers.get(&id).is_some_and(|w| w.active)
    }

    pub fn threshold_multiplier(&self) -> u64 {
        self.config.threshold_multiplier
    }

    /// Advance one entity. `worn` is whether the item is on right now,
    /// `in_heat` whether the entity is effectively warm.
    pub fn update(
        &mut self,
        id: EntityId,
        worn: bool,
        in_heat: bool,
        tick_ms: u64,
        sink: &mut impl EffectSink,
    ) -> Option<InsulationChange> {
        let cfg = &self.config;
        let w = self.wearers.entry(id).or_default();

        if !worn {
            w.worn_ms = 0;
            w.wear_ms = 0;
            if !w.active {
                self.wearers.remove(&id);
                return None;
            }
            w.removed_ms += tick_ms;
            if w.removed_ms >= cfg.deactivate_after_ms {
                self.wearers.remove(&id);
                return Some(InsulationChange::Deactivated);
            }
            return None;
        }

        w.removed_ms = 0;
        w.worn_ms += tick_ms;
        let mut change = None;
        if !w.active && w.worn_ms >= cfg.activate_after_ms {
            w.active = true;
            change = Some(InsulationChange::Activated);
        }

        if in_heat {
            w.wear_ms = 0;
            return change;
        }
        w.wear_ms += tick_ms;
        if w.wear_ms >= cfg.wear_interval_ms {
            w.wear_ms -= cfg.wear_interval_ms;
            if sink.wear_insulation(id, cfg.wear_units) == InsulationWear::Broken {
                let was_active = w.active;
                self.wearers.remove(&id);
                tracing::debug!(?id, "insulation broke");
                return if was_active {
                    Some(InsulationChange::Broken)
                } else {
                    change
                };
            }
        }
        change
    }

    /// Forget an entity (left the world).
    pub fn forget(&mut self, id: EntityId) {
        self.wearers.remove(&id);
    }
}

use std::collections::HashMap;

use greatcold_common::{
    EffectSink, EntityId, EntityKind, GlobalStage, MAX_GLOBAL_STAGE, TrackedEntity,
};

use crate::config::CreatureConfig;

#[derive(Debug, Clone, Copy, Default)]
struct Exposure {
    cold_ms: u64,
    damage_ms: u64,
}

/// Cold damage for villagers and livestock at the harshest global stage.
///
/// Only creatures out of heat and under open sky accumulate exposure.
/// Trackers are session state and are dropped whenever the stage is lower.
#[derive(Debug, Clone, Default)]
pub struct CreatureExposure {
    config: CreatureConfig,
    exposed: HashMap<EntityId, Exposure>,
}

impl CreatureExposure {
    pub fn new(config: CreatureConfig) -> Self {
        Self {
            config,
            exposed: HashMap::new(),
        }
    }

    pub fn tracked(&self) -> usize {
        self.exposed.len()
    }

    /// Drop all trackers unless the global stage is the harshest one.
    /// Returns whether creatures should be ticked at all.
    pub fn begin_tick(&mut self, global: GlobalStage) -> bool {
        if global.value() == MAX_GLOBAL_STAGE {
            return true;
        }
        self.exposed.clear();
        false
    }

    pub fn forget(&mut self, id: EntityId) {
        self.exposed.remove(&id);
    }

    /// Drop trackers for creatures missing from this tick's entity list.
    pub fn retain_present(&mut self, entities: &[TrackedEntity]) {
        if self.exposed.is_empty() {
            return;
        }
        self.exposed
            .retain(|id, _| entities.iter().any(|e| e.id == *id));
    }

    /// Advance one creature. Returns damage dealt.
    pub fn update(
        &mut self,
        id: EntityId,
        kind: EntityKind,
        in_heat: bool,
        open_to_sky: bool,
        tick_ms: u64,
        sink: &mut impl EffectSink,
    ) -> f32 {
        let grace = match kind {
            EntityKind::Villager => self.config.villager_grace_ms,
            EntityKind::Livestock => self.config.livestock_grace_ms,
            EntityKind::Player(_) => return 0.0,
        };
        if in_heat || !open_to_sky {
            self.exposed.remove(&id);
            return 0.0;
        }

        let e = self.exposed.entry(id).or_default();
        e.cold_ms += tick_ms;
        if e.cold_ms < grace {
            e.damage_ms = 0;
            return 0.0;
        }
        e.damage_ms += tick_ms;
        if e.damage_ms >= self.config.damage_interval_ms {
            e.damage_ms -= self.config.damage_interval_ms;
            sink.damage(id, self.config.damage);
            return self.config.damage;
        }
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greatcold_common::{GameMode, Sandbox};

    fn run(kind: EntityKind, ticks: usize, sky: bool) -> f32 {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut c = CreatureExposure::new(CreatureConfig::default());
        for _ in 0..ticks {
            c.update(id, kind, false, sky, 1_000, &mut sink);
        }
        sink.total_damage(id)
    }

    #[test]
    fn villagers_hurt_after_thirty_seconds() {
        assert_eq!(run(EntityKind::Villager, 33, true), 0.0);
        assert_eq!(run(EntityKind::Villager, 34, true), 2.0);
        assert_eq!(run(EntityKind::Villager, 45, true), 6.0);
    }

    #[test]
    fn livestock_hurt_after_a_minute() {
        assert_eq!(run(EntityKind::Livestock, 63, true), 0.0);
        assert_eq!(run(EntityKind::Livestock, 64, true), 2.0);
    }

    #[test]
    fn sheltered_or_players_unaffected() {
        assert_eq!(run(EntityKind::Villager, 100, false), 0.0);
        assert_eq!(run(EntityKind::Player(GameMode::Survival), 100, true), 0.0);
    }

    #[test]
    fn trackers_cleared_below_max_stage() {
        let mut sink = Sandbox::default();
        let mut c = CreatureExposure::new(CreatureConfig::default());
        assert!(c.begin_tick(GlobalStage::new(3).unwrap()));
        c.update(EntityId::new(), EntityKind::Villager, false, true, 1_000, &mut sink);
        assert_eq!(c.tracked(), 1);
        assert!(!c.begin_tick(GlobalStage::new(2).unwrap()));
        assert_eq!(c.tracked(), 0);
    }

    #[test]
    fn departed_creatures_are_dropped() {
        let mut sink = Sandbox::default();
        let mut c = CreatureExposure::new(CreatureConfig::default());
        let stays = TrackedEntity {
            kind: EntityKind::Villager,
            ..TrackedEntity::player(EntityId::new(), glam::Vec3::ZERO)
        };
        let gone = EntityId::new();
        let left = EntityId::new();
        for id in [stays.id, gone, left] {
            c.update(id, EntityKind::Villager, false, true, 1_000, &mut sink);
        }
        assert_eq!(c.tracked(), 3);

        c.forget(left);
        assert_eq!(c.tracked(), 2);
        c.retain_present(&[stays]);
        assert_eq!(c.tracked(), 1);
        c.retain_present(&[]);
        assert_eq!(c.tracked(), 0);
    }
}

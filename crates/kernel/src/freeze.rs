use greatcold_common::{EffectSink, EntityId, GlobalStage, StatusEffect};
use serde::{Deserialize, Serialize};

use crate::config::FreezeConfig;

const MINUTE_MS: u64 = 60_000;

/// Per-entity freeze severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum FreezeStage {
    #[default]
    None,
    Stage1,
    Stage2,
    Stage3,
    Stage4,
}

impl FreezeStage {
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> Option<Self> {
        Some(match level {
            0 => FreezeStage::None,
            1 => FreezeStage::Stage1,
            2 => FreezeStage::Stage2,
            3 => FreezeStage::Stage3,
            4 => FreezeStage::Stage4,
            _ => return None,
        })
    }

    /// Continuous time in heat that fully clears this stage. `None` for stages
    /// that never clear through warmth.
    pub fn recovery_ms(self) -> Option<u64> {
        match self {
            FreezeStage::None => None,
            FreezeStage::Stage1 => Some(30_000),
            FreezeStage::Stage2 => Some(60_000),
            FreezeStage::Stage3 => Some(150_000),
            FreezeStage::Stage4 => None,
        }
    }

    /// Interval between damage hits while exposed.
    pub fn damage_interval_ms(self) -> Option<u64> {
        match self {
            FreezeStage::None => None,
            FreezeStage::Stage1 => Some(10_000),
            FreezeStage::Stage2 => Some(7_000),
            FreezeStage::Stage3 => Some(5_000),
            FreezeStage::Stage4 => Some(1_000),
        }
    }

    /// Amplifier level of `effect` at this stage; 0 means absent.
    pub fn effect_level(self, effect: StatusEffect) -> u8 {
        use StatusEffect::*;
        match (self, effect) {
            (FreezeStage::None, _) => 0,
            (FreezeStage::Stage1, Slowness | Hunger) => 1,
            (FreezeStage::Stage1, _) => 0,
            (FreezeStage::Stage2, Slowness | Hunger) => 2,
            (FreezeStage::Stage2, MiningFatigue) => 1,
            (FreezeStage::Stage2, _) => 0,
            (FreezeStage::Stage3, Slowness | Hunger | MiningFatigue) => 3,
            (FreezeStage::Stage3, Weakness) => 1,
            (FreezeStage::Stage3, Blindness) => 0,
            (FreezeStage::Stage4, Slowness) => 10,
            (FreezeStage::Stage4, Hunger) => 5,
            (FreezeStage::Stage4, MiningFatigue) => 4,
            (FreezeStage::Stage4, Weakness) => 2,
            (FreezeStage::Stage4, Blindness) => 1,
        }
    }
}

impl std::fmt::Display for FreezeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FreezeStage::None => write!(f, "none"),
            s => write!(f, "stage {}", s.level()),
        }
    }
}

/// Stage an entity should be at after `time_without_heat_ms` of cold.
///
/// | global | surface (min)            | underground (min) |
/// |--------|--------------------------|-------------------|
/// | 0      | never                    | never             |
/// | 1      | 3, 6                     | 10, 20            |
/// | 2      | 2, 5, 7                  | 10, 20            |
/// | 3      | 1, 2, 4, 5               | 10, 20            |
pub fn desired_stage(time_without_heat_ms: u64, global: GlobalStage, underground: bool) -> FreezeStage {
    desired_stage_scaled(time_without_heat_ms, global, underground, 1)
}

/// [`desired_stage`] with every threshold multiplied by `multiplier`.
pub fn desired_stage_scaled(
    time_without_heat_ms: u64,
    global: GlobalStage,
    underground: bool,
    multiplier: u64,
) -> FreezeStage {
    const NONE: &[u64] = &[];
    let ladder: &[u64] = match (global.value(), underground) {
        (0, _) => NONE,
        (_, true) => &[10, 20],
        (1, false) => &[3, 6],
        (2, false) => &[2, 5, 7],
        _ => &[1, 2, 4, 5],
    };
    let reached = ladder
        .iter()
        .take_while(|&&min| time_without_heat_ms >= min * MINUTE_MS * multiplier.max(1))
        .count();
    FreezeStage::from_level(reached as u8).unwrap_or(FreezeStage::Stage4)
}

/// Natural heat does not count under open sky from global stage 2 on;
/// fuel heat always counts.
pub fn effective_heat(
    in_fuel_heat: bool,
    in_natural_heat: bool,
    global: GlobalStage,
    open_to_sky: bool,
) -> bool {
    in_fuel_heat || (in_natural_heat && !(global.value() >= 2 && open_to_sky))
}

/// Persistent per-entity freeze progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeState {
    pub stage: FreezeStage,
    pub time_in_heat_ms: u64,
    pub time_without_heat_ms: u64,
    pub damage_accumulator_ms: u64,
    pub in_heat: bool,
    pub heat_reset_applied: bool,
    pub time_below_depth_ms: u64,
    pub time_above_depth_ms: u64,
    pub underground: bool,
    /// Movement speed saved when stage 4 froze the entity in place.
    pub stored_movement_speed: Option<f32>,
}

impl FreezeState {
    /// Zero the heat, cold and damage clocks.
    pub fn zero_accumulators(&mut self) {
        self.time_in_heat_ms = 0;
        self.time_without_heat_ms = 0;
        self.damage_accumulator_ms = 0;
    }

    fn reset(&mut self) {
        *self = FreezeState {
            stored_movement_speed: self.stored_movement_speed,
            ..FreezeState::default()
        };
    }
}

/// Environment observed for one entity this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exposure {
    /// Effective heat, see [`effective_heat`].
    pub in_heat: bool,
    pub feet_y: i32,
    /// Insulation active: thresholds scale up and escalation caps at stage 2.
    pub insulated: bool,
}

/// What changed for one entity during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FreezeTick {
    pub raised: Option<FreezeStage>,
    /// Stage that was cleared by warmth.
    pub thawed: Option<FreezeStage>,
    /// New value of the underground flag, when it flipped.
    pub underground: Option<bool>,
    pub damage: f32,
}

/// The per-entity cold state machine.
#[derive(Debug, Clone)]
pub struct FreezeMachine {
    config: FreezeConfig,
    insulated_multiplier: u64,
}

impl FreezeMachine {
    pub fn new(config: FreezeConfig, insulated_multiplier: u64) -> Self {
        Self {
            config,
            insulated_multiplier,
        }
    }

    /// Advance one entity by `tick_ms`.
    pub fn tick(
        &self,
        id: EntityId,
        state: &mut FreezeState,
        exposure: Exposure,
        global: GlobalStage,
        tick_ms: u64,
        sink: &mut impl EffectSink,
    ) -> FreezeTick {
        let mut out = FreezeTick {
            underground: self.track_depth(state, exposure.feet_y, tick_ms),
            ..FreezeTick::default()
        };

        if !state.in_heat && exposure.in_heat {
            state.time_in_heat_ms = 0;
            state.heat_reset_applied = false;
        }
        state.in_heat = exposure.in_heat;

        if !exposure.in_heat {
            state.time_in_heat_ms = 0;
            state.time_without_heat_ms += tick_ms;

            let multiplier = if exposure.insulated {
                self.insulated_multiplier
            } else {
                1
            };
            let mut desired = desired_stage_scaled(
                state.time_without_heat_ms,
                global,
                state.underground,
                multiplier,
            );
            if state.underground && state.stage >= FreezeStage::Stage2 {
                desired = state.stage;
            }
            if exposure.insulated && state.stage < FreezeStage::Stage3 {
                desired = desired.min(FreezeStage::Stage2);
            }
            if desired > state.stage {
                tracing::debug!(?id, from = ?state.stage, to = ?desired, "freeze stage raised");
                state.stage = desired;
                state.damage_accumulator_ms = 0;
                state.time_in_heat_ms = 0;
                state.heat_reset_applied = false;
                apply_stage_effects(id, state, sink);
                out.raised = Some(desired);
            }
        } else {
            state.time_in_heat_ms += tick_ms;
            if !state.heat_reset_applied && state.time_in_heat_ms >= self.config.heat_reset_ms {
                state.time_without_heat_ms = 0;
                state.heat_reset_applied = true;
            }
            if state
                .stage
                .recovery_ms()
                .is_some_and(|needed| state.time_in_heat_ms >= needed)
            {
                let from = state.stage;
                tracing::debug!(?id, ?from, "freeze thawed");
                clear(id, state, sink);
                out.thawed = Some(from);
                return out;
            }
        }

        out.damage = self.tick_damage(id, state, tick_ms, sink);
        out
    }

    fn track_depth(&self, state: &mut FreezeState, feet_y: i32, tick_ms: u64) -> Option<bool> {
        if feet_y < self.config.underground_y {
            state.time_below_depth_ms += tick_ms;
            state.time_above_depth_ms = 0;
        } else {
            state.time_above_depth_ms += tick_ms;
            state.time_below_depth_ms = 0;
        }
        let flip = if state.underground {
            state.time_above_depth_ms >= self.config.depth_toggle_ms
        } else {
            state.time_below_depth_ms >= self.config.depth_toggle_ms
        };
        if !flip {
            return None;
        }
        state.underground = !state.underground;
        state.time_without_heat_ms = 0;
        state.time_in_heat_ms = 0;
        state.heat_reset_applied = false;
        Some(state.underground)
    }

    fn tick_damage(
        &self,
        id: EntityId,
        state: &mut FreezeState,
        tick_ms: u64,
        sink: &mut impl EffectSink,
    ) -> f32 {
        let Some(interval) = state.stage.damage_interval_ms() else {
            sink.clear_effects(id);
            state.damage_accumulator_ms = 0;
            restore_speed(id, state, sink);
            return 0.0;
        };

        apply_stage_effects(id, state, sink);
        if state.in_heat && state.stage != FreezeStage::Stage4 {
            state.damage_accumulator_ms = 0;
            return 0.0;
        }

        state.damage_accumulator_ms += tick_ms;
        let mut dealt = 0.0;
        while state.damage_accumulator_ms >= interval {
            sink.damage(id, self.config.damage);
            dealt += self.config.damage;
            state.damage_accumulator_ms -= interval;
        }
        dealt
    }
}

/// Push the stage's effect levels to the host, freezing movement at stage 4.
pub fn apply_stage_effects(id: EntityId, state: &mut FreezeState, sink: &mut impl EffectSink) {
    for effect in StatusEffect::ALL {
        match state.stage.effect_level(effect) {
            0 => sink.remove_effect(id, effect),
            level => sink.apply_effect(id, effect, level),
        }
    }
    if state.stage == FreezeStage::Stage4 && state.stored_movement_speed.is_none() {
        if let Some(speed) = sink.movement_speed(id) {
            state.stored_movement_speed = Some(speed);
            sink.set_movement_speed(id, 0.0);
        }
    }
}

/// Give back the movement speed saved at stage 4, if any.
pub fn restore_speed(id: EntityId, state: &mut FreezeState, sink: &mut impl EffectSink) {
    if let Some(speed) = state.stored_movement_speed.take() {
        sink.set_movement_speed(id, speed);
    }
}

/// Full reset: stage none, every clock zeroed, effects removed, speed restored.
/// Calling it again changes nothing.
pub fn clear(id: EntityId, state: &mut FreezeState, sink: &mut impl EffectSink) {
    restore_speed(id, state, sink);
    state.reset();
    sink.clear_effects(id);
}

/// Administrative override: jump straight to `stage` with fresh clocks.
pub fn set_stage(
    id: EntityId,
    state: &mut FreezeState,
    stage: FreezeStage,
    sink: &mut impl EffectSink,
) {
    state.stage = stage;
    state.zero_accumulators();
    if stage != FreezeStage::Stage4 {
        restore_speed(id, state, sink);
    }
    apply_stage_effects(id, state, sink);
}

/// Death demotes stage 4 to stage 3; every other stage survives death.
/// Returns whether a demotion happened.
pub fn on_death(id: EntityId, state: &mut FreezeState, sink: &mut impl EffectSink) -> bool {
    if state.stage != FreezeStage::Stage4 {
        return false;
    }
    state.stage = FreezeStage::Stage3;
    state.zero_accumulators();
    restore_speed(id, state, sink);
    apply_stage_effects(id, state, sink);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use greatcold_common::{DEFAULT_MOVEMENT_SPEED, Sandbox};

    fn g(stage: u8) -> GlobalStage {
        GlobalStage::new(stage).unwrap()
    }

    fn machine() -> FreezeMachine {
        FreezeMachine::new(FreezeConfig::default(), 3)
    }

    fn cold() -> Exposure {
        Exposure {
            in_heat: false,
            feet_y: 64,
            insulated: false,
        }
    }

    fn warm() -> Exposure {
        Exposure {
            in_heat: true,
            ..cold()
        }
    }

    #[test]
    fn ladder_per_global_stage() {
        let min = |m: u64| m * MINUTE_MS;
        assert_eq!(desired_stage(min(100), g(0), false), FreezeStage::None);
        assert_eq!(desired_stage(min(3) - 1, g(1), false), FreezeStage::None);
        assert_eq!(desired_stage(min(3), g(1), false), FreezeStage::Stage1);
        assert_eq!(desired_stage(min(60), g(1), false), FreezeStage::Stage2);
        assert_eq!(desired_stage(min(7), g(2), false), FreezeStage::Stage3);
        assert_eq!(desired_stage(min(5), g(3), false), FreezeStage::Stage4);
        assert_eq!(desired_stage(min(4), g(3), false), FreezeStage::Stage3);
        assert_eq!(desired_stage(min(10), g(3), true), FreezeStage::Stage1);
        assert_eq!(desired_stage(min(20), g(2), true), FreezeStage::Stage2);
    }

    #[test]
    fn ladder_is_monotonic_and_underground_capped() {
        for global in 0..=3 {
            for underground in [false, true] {
                let mut prev = FreezeStage::None;
                for secs in (0..=3_600).step_by(15) {
                    let s = desired_stage(secs * 1_000, g(global), underground);
                    assert!(s >= prev);
                    if underground {
                        assert!(s <= FreezeStage::Stage2);
                    }
                    prev = s;
                }
            }
        }
    }

    #[test]
    fn insulation_triples_thresholds() {
        assert_eq!(desired_stage_scaled(3 * MINUTE_MS, g(1), false, 3), FreezeStage::None);
        assert_eq!(desired_stage_scaled(9 * MINUTE_MS, g(1), false, 3), FreezeStage::Stage1);
    }

    #[test]
    fn natural_heat_ignored_under_open_sky_from_stage_two() {
        assert!(effective_heat(false, true, g(1), true));
        assert!(!effective_heat(false, true, g(2), true));
        assert!(effective_heat(false, true, g(3), false));
        assert!(effective_heat(true, false, g(3), true));
    }

    #[test]
    fn continuous_cold_reaches_stage_one_then_two() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        let m = machine();
        let mut elapsed = 0;
        let mut s1_at = None;
        let mut s2_at = None;
        while elapsed < 400_000 {
            let t = m.tick(id, &mut state, cold(), g(1), 1_000, &mut sink);
            elapsed += 1_000;
            match t.raised {
                Some(FreezeStage::Stage1) => s1_at = Some(elapsed),
                Some(FreezeStage::Stage2) => s2_at = Some(elapsed),
                _ => {}
            }
        }
        assert_eq!(s1_at, Some(180_000));
        assert_eq!(s2_at, Some(360_000));
        assert_eq!(
            sink.effect_level(id, StatusEffect::MiningFatigue),
            Some(1)
        );
    }

    #[test]
    fn damage_interval_carries_remainder() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        set_stage(id, &mut state, FreezeStage::Stage2, &mut sink);
        let m = machine();
        for _ in 0..14 {
            m.tick(id, &mut state, cold(), g(0), 1_000, &mut sink);
        }
        assert_eq!(sink.total_damage(id), 4.0);
        assert_eq!(state.damage_accumulator_ms, 0);
    }

    #[test]
    fn warmth_stops_damage_below_stage_four() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        set_stage(id, &mut state, FreezeStage::Stage3, &mut sink);
        let m = machine();
        for _ in 0..20 {
            m.tick(id, &mut state, warm(), g(3), 1_000, &mut sink);
        }
        assert_eq!(sink.total_damage(id), 0.0);
        assert_eq!(state.stage, FreezeStage::Stage3);
    }

    #[test]
    fn stage_four_freezes_movement_and_hurts_in_heat() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        set_stage(id, &mut state, FreezeStage::Stage4, &mut sink);
        assert_eq!(sink.movement_speed(id), Some(0.0));
        assert_eq!(state.stored_movement_speed, Some(DEFAULT_MOVEMENT_SPEED));

        let m = machine();
        for _ in 0..200 {
            m.tick(id, &mut state, warm(), g(3), 1_000, &mut sink);
        }
        // Stage 4 never thaws through warmth and keeps dealing damage.
        assert_eq!(state.stage, FreezeStage::Stage4);
        assert_eq!(sink.total_damage(id), 400.0);
    }

    #[test]
    fn heat_grace_zeroes_cold_clock_once() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        let m = machine();
        for _ in 0..100 {
            m.tick(id, &mut state, cold(), g(1), 1_000, &mut sink);
        }
        assert_eq!(state.time_without_heat_ms, 100_000);
        for _ in 0..29 {
            m.tick(id, &mut state, warm(), g(1), 1_000, &mut sink);
        }
        assert_eq!(state.time_without_heat_ms, 100_000);
        m.tick(id, &mut state, warm(), g(1), 1_000, &mut sink);
        assert_eq!(state.time_without_heat_ms, 0);
        assert!(state.heat_reset_applied);

        // Back in the cold the clock starts over: no stage before a full 3 min.
        for _ in 0..179 {
            let t = m.tick(id, &mut state, cold(), g(1), 1_000, &mut sink);
            assert!(t.raised.is_none());
        }
        let t = m.tick(id, &mut state, cold(), g(1), 1_000, &mut sink);
        assert_eq!(t.raised, Some(FreezeStage::Stage1));
    }

    #[test]
    fn recovery_thaws_stage_one_after_thirty_seconds() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        set_stage(id, &mut state, FreezeStage::Stage1, &mut sink);
        let m = machine();
        let mut thawed_at = None;
        for tick in 1..=40 {
            if m.tick(id, &mut state, warm(), g(1), 1_000, &mut sink).thawed.is_some() {
                thawed_at = Some(tick);
                break;
            }
        }
        assert_eq!(thawed_at, Some(30));
        assert_eq!(state, FreezeState::default());
        assert_eq!(sink.active_effects(id), 0);
    }

    #[test]
    fn underground_toggle_after_a_minute() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        let m = machine();
        let deep = Exposure {
            feet_y: 5,
            ..cold()
        };
        let mut flipped = None;
        for tick in 1..=61 {
            if let Some(u) = m.tick(id, &mut state, deep, g(3), 1_000, &mut sink).underground {
                flipped = Some((tick, u));
            }
        }
        assert_eq!(flipped, Some((60, true)));
        // Surface stage 1 would have hit at 60 s; the toggle zeroed the clock.
        assert_eq!(state.stage, FreezeStage::None);
        assert_eq!(state.time_without_heat_ms, 2_000);
        assert!(state.underground);
    }

    #[test]
    fn surfacing_for_a_minute_clears_underground() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState {
            underground: true,
            heat_reset_applied: true,
            ..FreezeState::default()
        };
        let m = machine();
        let deep = Exposure {
            feet_y: 5,
            ..cold()
        };

        // A dip below the line restarts the minute.
        for _ in 0..40 {
            assert_eq!(m.tick(id, &mut state, cold(), g(3), 1_000, &mut sink).underground, None);
        }
        m.tick(id, &mut state, deep, g(3), 1_000, &mut sink);
        assert_eq!(state.time_above_depth_ms, 0);

        let mut flipped = None;
        for tick in 1..=61 {
            if let Some(u) = m.tick(id, &mut state, cold(), g(3), 1_000, &mut sink).underground {
                flipped = Some((tick, u));
            }
        }
        assert_eq!(flipped, Some((60, false)));
        assert!(!state.underground);
        assert!(!state.heat_reset_applied);
        assert_eq!(state.time_without_heat_ms, 2_000);
        assert_eq!(state.stage, FreezeStage::None);
    }

    #[test]
    fn underground_never_escalates_past_stage_two() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState {
            underground: true,
            ..FreezeState::default()
        };
        let m = machine();
        let deep = Exposure {
            feet_y: -10,
            ..cold()
        };
        for _ in 0..3_000 {
            m.tick(id, &mut state, deep, g(3), 1_000, &mut sink);
        }
        assert_eq!(state.stage, FreezeStage::Stage2);
    }

    #[test]
    fn insulation_caps_escalation_at_stage_two() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        let m = machine();
        let hat = Exposure {
            insulated: true,
            ..cold()
        };
        for _ in 0..3_600 {
            m.tick(id, &mut state, hat, g(3), 1_000, &mut sink);
        }
        assert_eq!(state.stage, FreezeStage::Stage2);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        set_stage(id, &mut state, FreezeStage::Stage4, &mut sink);
        clear(id, &mut state, &mut sink);
        let once = state.clone();
        clear(id, &mut state, &mut sink);
        assert_eq!(state, once);
        assert_eq!(state, FreezeState::default());
        assert_eq!(sink.movement_speed(id), Some(DEFAULT_MOVEMENT_SPEED));
    }

    #[test]
    fn death_demotes_only_stage_four() {
        let mut sink = Sandbox::default();
        let id = EntityId::new();
        let mut state = FreezeState::default();
        set_stage(id, &mut state, FreezeStage::Stage3, &mut sink);
        assert!(!on_death(id, &mut state, &mut sink));
        assert_eq!(state.stage, FreezeStage::Stage3);

        set_stage(id, &mut state, FreezeStage::Stage4, &mut sink);
        state.damage_accumulator_ms = 700;
        assert!(on_death(id, &mut state, &mut sink));
        assert_eq!(state.stage, FreezeStage::Stage3);
        assert_eq!(state.damage_accumulator_ms, 0);
        assert_eq!(sink.movement_speed(id), Some(DEFAULT_MOVEMENT_SPEED));
        assert_eq!(sink.effect_level(id, StatusEffect::Blindness), None);
    }
}

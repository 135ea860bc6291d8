use greatcold_stream::{NaturalRadii, ScanConfig};
use serde::{Deserialize, Serialize};

/// Simulation tuning. Every field has a default, so a partial config file
/// only overrides what it names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// The single world the simulation runs in.
    pub world: String,
    /// Length of one simulation tick.
    pub tick_ms: u64,
    /// Upper bound between two unforced saves.
    pub save_interval_ms: u64,
    /// Melting runs on every n-th heater tick.
    pub melt_every_ticks: u64,
    /// Blocks melted per heater per melt run.
    pub max_melts_per_run: usize,
    /// How often natural regions near tracked entities are re-checked.
    pub validation_interval_ms: u64,
    /// Length of each global stage, indexed by stage.
    pub stage_duration_secs: [u64; 4],
    /// Advance the global stage when its duration runs out.
    pub auto_stage: bool,
    pub natural_radii: NaturalRadii,
    pub scan: ScanConfig,
    pub freeze: FreezeConfig,
    pub insulation: InsulationConfig,
    pub creatures: CreatureConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            world: "world".into(),
            tick_ms: 1_000,
            save_interval_ms: 60_000,
            melt_every_ticks: 5,
            max_melts_per_run: 64,
            validation_interval_ms: 30_000,
            stage_duration_secs: [3_600; 4],
            auto_stage: false,
            natural_radii: NaturalRadii::default(),
            scan: ScanConfig::default(),
            freeze: FreezeConfig::default(),
            insulation: InsulationConfig::default(),
            creatures: CreatureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeConfig {
    /// Feet below this Y count as underground.
    pub underground_y: i32,
    /// Continuous time on one side of the depth line before `underground` flips.
    pub depth_toggle_ms: u64,
    /// Time in heat after which the cold clock is zeroed once.
    pub heat_reset_ms: u64,
    pub damage: f32,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            underground_y: 20,
            depth_toggle_ms: 60_000,
            heat_reset_ms: 30_000,
            damage: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsulationConfig {
    /// Continuous wear time before insulation takes effect.
    pub activate_after_ms: u64,
    /// Time without the item before insulation is lost.
    pub deactivate_after_ms: u64,
    /// Freeze thresholds are multiplied by this while insulated.
    pub threshold_multiplier: u64,
    /// Out-of-heat interval between durability wear.
    pub wear_interval_ms: u64,
    pub wear_units: u32,
}

impl Default for InsulationConfig {
    fn default() -> Self {
        Self {
            activate_after_ms: 60_000,
            deactivate_after_ms: 1_000,
            threshold_multiplier: 3,
            wear_interval_ms: 60_000,
            wear_units: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatureConfig {
    pub villager_grace_ms: u64,
    pub livestock_grace_ms: u64,
    pub damage_interval_ms: u64,
    pub damage: f32,
}

impl Default for CreatureConfig {
    fn default() -> Self {
        Self {
            villager_grace_ms: 30_000,
            livestock_grace_ms: 60_000,
            damage_interval_ms: 5_000,
            damage: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let c = SimConfig::default();
        assert_eq!(c.tick_ms, 1_000);
        assert_eq!(c.save_interval_ms, 60_000);
        assert_eq!(c.melt_every_ticks, 5);
        assert_eq!(c.max_melts_per_run, 64);
        assert_eq!(c.freeze.underground_y, 20);
        assert_eq!(c.natural_radii.campfire, 4);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: SimConfig =
            serde_json::from_str(r#"{"tick_ms": 500, "freeze": {"damage": 4.0}}"#).unwrap();
        assert_eq!(c.tick_ms, 500);
        assert_eq!(c.freeze.damage, 4.0);
        assert_eq!(c.freeze.underground_y, 20);
        assert_eq!(c.world, "world");
    }
}

//! Cold hazard kernel: fuel heaters, terrain melting, per-entity freeze
//! progression and the global stage clock, owned by one [`Simulation`].
//!
//! # Invariants
//! - All mutation happens inside `Simulation::tick` or its explicit operations;
//!   queued host commands apply at the start of the next tick.
//! - Heater fuel stays within `0..=max_fuel_ms`; a heater is active iff fuel > 0.
//! - Freeze stage only rises while cold and only drops through recovery,
//!   death (stage 4 to 3) or an explicit override.
//! - Underground entities never escalate past stage 2.
//! - Iteration over heaters and freeze states is in key order.

pub mod config;
pub mod creatures;
pub mod freeze;
pub mod fuel;
pub mod heaters;
pub mod insulation;
pub mod melt;
pub mod saved;
pub mod sim;
pub mod stage;
pub mod timing;

pub use config::{CreatureConfig, FreezeConfig, InsulationConfig, SimConfig};
pub use freeze::{FreezeMachine, FreezeStage, FreezeState};
pub use fuel::{FUEL_BAR_SLOTS, FeedRejected, FuelHeatSource, FuelItem, FuelKind};
pub use heaters::{FuelHeatRegistry, HeaterError};
pub use melt::TerrainMelter;
pub use saved::{Discard, PersistError, PersistenceSink, SavedHeater, SavedState};
pub use sim::{SimCommand, SimEvent, SimHandle, Simulation, TickReport};
pub use stage::StageClock;
pub use timing::TickTimer;

pub fn crate_info() -> &'static str {
    "greatcold-kernel v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("kernel"));
    }
}

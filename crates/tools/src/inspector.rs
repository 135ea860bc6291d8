use std::fmt;
use std::time::Duration;

use greatcold_common::{BlockPos, EntityId, GlobalStage};
use greatcold_kernel::{FreezeStage, FuelHeatSource, FuelKind, Simulation};

/// Read-only queries against a simulation for debugging and admin output.
pub struct SimInspector;

impl SimInspector {
    pub fn summary(sim: &Simulation) -> SimSummary {
        let heaters = sim.heaters();
        SimSummary {
            tick: sim.tick_count(),
            now_ms: sim.now_ms(),
            global_stage: sim.global_stage(),
            stage_remaining_ms: sim.stage_clock().remaining_ms(sim.now_ms()),
            heaters: heaters.len(),
            active_heaters: heaters.iter().filter(|h| h.is_active()).count(),
            natural_regions: sim.natural().len(),
            pending_scans: sim.natural().scans().pending(),
            tracked_entities: sim.freeze_states().count(),
            freezing_entities: sim
                .freeze_states()
                .filter(|(_, s)| s.stage != FreezeStage::None)
                .count(),
            pending_events: sim.events().len(),
            avg_tick: sim.timer().average(),
        }
    }

    pub fn inspect_entity(sim: &Simulation, id: EntityId) -> Option<EntityFreezeInfo> {
        sim.freeze_state(id).map(|s| EntityFreezeInfo {
            id,
            stage: s.stage,
            time_without_heat_ms: s.time_without_heat_ms,
            time_in_heat_ms: s.time_in_heat_ms,
            underground: s.underground,
            insulated: sim.insulation_active(id),
        })
    }

    /// Entities at any freeze stage, harshest first.
    pub fn freezing(sim: &Simulation) -> Vec<(EntityId, FreezeStage)> {
        let mut out: Vec<_> = sim
            .freeze_states()
            .filter(|(_, s)| s.stage != FreezeStage::None)
            .map(|(id, s)| (*id, s.stage))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        out
    }

    /// Every heater in position order.
    pub fn heaters(sim: &Simulation) -> Vec<HeaterInfo> {
        sim.heaters().iter().map(HeaterInfo::from).collect()
    }

    pub fn heater(sim: &Simulation, pos: BlockPos) -> Option<HeaterInfo> {
        sim.heaters().get(pos).map(HeaterInfo::from)
    }
}

#[derive(Debug, Clone)]
pub struct SimSummary {
    pub tick: u64,
    pub now_ms: u64,
    pub global_stage: GlobalStage,
    pub stage_remaining_ms: Option<u64>,
    pub heaters: usize,
    pub active_heaters: usize,
    pub natural_regions: usize,
    pub pending_scans: usize,
    pub tracked_entities: usize,
    pub freezing_entities: usize,
    pub pending_events: usize,
    pub avg_tick: Duration,
}

impl fmt::Display for SimSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sim: tick={} t={}s stage={} heaters={}/{} natural={} scans={} entities={} freezing={} events={} avg_tick={:?}",
            self.tick,
            self.now_ms / 1_000,
            self.global_stage,
            self.active_heaters,
            self.heaters,
            self.natural_regions,
            self.pending_scans,
            self.tracked_entities,
            self.freezing_entities,
            self.pending_events,
            self.avg_tick,
        )?;
        match self.stage_remaining_ms {
            Some(ms) => write!(f, " stage_ends_in={}", format_duration(ms)),
            None => write!(f, " stage_ends_in=never"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFreezeInfo {
    pub id: EntityId,
    pub stage: FreezeStage,
    pub time_without_heat_ms: u64,
    pub time_in_heat_ms: u64,
    pub underground: bool,
    pub insulated: bool,
}

impl fmt::Display for EntityFreezeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity [{:.8}] {} cold={} warm={}",
            self.id.0.to_string(),
            self.stage,
            format_duration(self.time_without_heat_ms),
            format_duration(self.time_in_heat_ms),
        )?;
        if self.underground {
            write!(f, " underground")?;
        }
        if self.insulated {
            write!(f, " insulated")?;
        }
        Ok(())
    }
}

/// Diagnostics for one heater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaterInfo {
    pub pos: BlockPos,
    pub kind: FuelKind,
    pub active: bool,
    pub fuel_ms: u64,
    pub fuel_percent: u8,
    pub fuel_bar: String,
}

impl From<&FuelHeatSource> for HeaterInfo {
    fn from(h: &FuelHeatSource) -> Self {
        Self {
            pos: h.pos,
            kind: h.kind,
            active: h.is_active(),
            fuel_ms: h.fuel_ms(),
            fuel_percent: h.fuel_percent(),
            fuel_bar: h.fuel_bar(),
        }
    }
}

impl fmt::Display for HeaterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}% {} ({})",
            self.kind.name(),
            self.pos,
            self.fuel_bar,
            self.fuel_percent,
            format_duration(self.fuel_ms),
            if self.active { "lit" } else { "out" },
        )
    }
}

/// `1h 02m 05s`, dropping leading zero units.
fn format_duration(ms: u64) -> String {
    let secs = ms / 1_000;
    let (h, m, s) = (secs / 3_600, secs / 60 % 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m {s:02}s"),
        _ => format!("{h}h {m:02}m {s:02}s"),
    }
}

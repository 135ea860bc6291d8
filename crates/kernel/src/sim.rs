use std::collections::BTreeMap;
use std::sync::mpsc;
use std::time::Instant;

use greatcold_common::{
    BlockAccess, BlockPos, ChunkPos, EffectSink, EntityId, EntityKind, GlobalStage, Host,
    StageError, TrackedEntity,
};
use greatcold_stream::NaturalHeatRegistry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, trace, warn};

use crate::config::SimConfig;
use crate::creatures::CreatureExposure;
use crate::freeze::{self, Exposure, FreezeMachine, FreezeStage, FreezeState, effective_heat};
use crate::fuel::{FeedRejected, FuelHeatSource, FuelItem, FuelKind};
use crate::heaters::{FuelHeatRegistry, HeaterError};
use crate::insulation::{InsulationChange, InsulationTracker};
use crate::saved::{PersistError, PersistenceSink, SavedState};
use crate::stage::StageClock;
use crate::timing::TickTimer;

/// Something that happened inside the simulation. Drained by the host to
/// drive notifications and visuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    HeaterPlaced { pos: BlockPos, kind: FuelKind },
    HeaterRemoved { pos: BlockPos, kind: FuelKind },
    HeaterStateChanged { pos: BlockPos, active: bool },
    /// Heater dropped because its block was replaced while unloaded.
    HeaterInvalidated { pos: BlockPos, kind: FuelKind },
    Melted { count: usize },
    FreezeRaised { id: EntityId, stage: FreezeStage },
    FreezeThawed { id: EntityId, from: FreezeStage },
    /// Death pulled an entity back from stage 4 to stage 3.
    FreezeDemoted { id: EntityId },
    UndergroundChanged { id: EntityId, underground: bool },
    InsulationActivated { id: EntityId },
    InsulationDeactivated { id: EntityId },
    InsulationBroken { id: EntityId },
    StageChanged { stage: GlobalStage },
}

/// Host notification queued from any thread and applied at the start of the
/// next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    AreaLoaded(ChunkPos),
    AreaUnloaded(ChunkPos),
    BlockChanged(BlockPos),
    EntityDied(EntityId),
    /// Entity left the world; its session trackers are dropped.
    EntityLeft(EntityId),
}

/// Cloneable sender for [`SimCommand`]s.
#[derive(Debug, Clone)]
pub struct SimHandle {
    tx: mpsc::Sender<SimCommand>,
}

impl SimHandle {
    /// Queue a command. Returns false once the simulation is gone.
    pub fn send(&self, command: SimCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Summary of one `tick` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Fixed-length steps run for the elapsed time.
    pub steps: u32,
    pub commands: usize,
    pub natural_found: usize,
    pub melted: usize,
    pub damage: f32,
    pub saved: bool,
}

/// The hazard simulation: one owner for every registry and per-entity state.
///
/// All mutation happens on the caller's thread inside [`Simulation::tick`] or
/// the explicit operations. Elapsed time is cut into fixed steps of
/// `tick_ms`; leftovers carry to the next call.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    natural: NaturalHeatRegistry,
    heaters: FuelHeatRegistry,
    freeze: BTreeMap<EntityId, FreezeState>,
    machine: FreezeMachine,
    insulation: InsulationTracker,
    creatures: CreatureExposure,
    stage: StageClock,
    now_ms: u64,
    tick: u64,
    pending_ms: u64,
    last_save_ms: u64,
    last_validation_ms: u64,
    force_save: bool,
    events: Vec<SimEvent>,
    tx: mpsc::Sender<SimCommand>,
    rx: mpsc::Receiver<SimCommand>,
    timer: TickTimer,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut stage = StageClock {
            auto_advance: config.auto_stage,
            ..StageClock::default()
        };
        stage.start(GlobalStage::CALM, 0, &config.stage_duration_secs);
        Self {
            natural: NaturalHeatRegistry::new(config.natural_radii.clone(), config.scan.clone()),
            heaters: FuelHeatRegistry::new(config.melt_every_ticks, config.max_melts_per_run),
            freeze: BTreeMap::new(),
            machine: FreezeMachine::new(config.freeze.clone(), config.insulation.threshold_multiplier),
            insulation: InsulationTracker::new(config.insulation.clone()),
            creatures: CreatureExposure::new(config.creatures.clone()),
            stage,
            now_ms: 0,
            tick: 0,
            pending_ms: 0,
            last_save_ms: 0,
            last_validation_ms: 0,
            force_save: false,
            events: Vec::new(),
            tx,
            rx,
            timer: TickTimer::default(),
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            tx: self.tx.clone(),
        }
    }

    /// Simulation clock in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Fixed steps run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn timer(&self) -> &TickTimer {
        &self.timer
    }

    pub fn natural(&self) -> &NaturalHeatRegistry {
        &self.natural
    }

    pub fn heaters(&self) -> &FuelHeatRegistry {
        &self.heaters
    }

    pub fn stage_clock(&self) -> &StageClock {
        &self.stage
    }

    pub fn global_stage(&self) -> GlobalStage {
        self.stage.stage
    }

    pub fn freeze_state(&self, id: EntityId) -> Option<&FreezeState> {
        self.freeze.get(&id)
    }

    pub fn freeze_states(&self) -> impl Iterator<Item = (&EntityId, &FreezeState)> {
        self.freeze.iter()
    }

    /// Freeze stage of an entity; `None` for entities never seen.
    pub fn current_stage(&self, id: EntityId) -> FreezeStage {
        self.freeze.get(&id).map(|s| s.stage).unwrap_or_default()
    }

    pub fn insulation_active(&self, id: EntityId) -> bool {
        self.insulation.is_active(id)
    }

    /// Raw heat query: inside an active heater's cube or a natural region.
    /// Ignores the open-sky rule applied to entities.
    pub fn is_heated(&self, host: &impl BlockAccess, pos: BlockPos) -> bool {
        self.heaters.is_heated(host, pos) || self.natural.contains(pos)
    }

    /// Heat as an entity at `pos` feels it under the current global stage.
    pub fn is_effectively_heated(&self, host: &impl BlockAccess, pos: BlockPos) -> bool {
        let global = self.stage.stage;
        let fuel = self.heaters.is_heated(host, pos);
        let natural = !fuel && self.natural.contains(pos);
        let open = natural && global.value() >= 2 && host.is_open_to_sky(pos);
        effective_heat(fuel, natural, global, open)
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn on_area_load(&mut self, host: &mut impl BlockAccess, chunk: ChunkPos) {
        let found = self.natural.on_area_load(&*host, chunk);
        let dropped = self.heaters.on_area_load(host, chunk);
        if !dropped.is_empty() {
            self.force_save = true;
        }
        for source in dropped {
            self.events.push(SimEvent::HeaterInvalidated {
                pos: source.pos,
                kind: source.kind,
            });
        }
        trace!(%chunk, found, "area loaded");
    }

    pub fn on_area_unload(&mut self, chunk: ChunkPos) {
        let evicted = self.natural.on_area_unload(chunk);
        trace!(%chunk, evicted, "area unloaded");
    }

    pub fn on_block_changed(&mut self, host: &impl BlockAccess, pos: BlockPos) {
        self.natural.on_block_changed(host, pos);
    }

    pub fn place_fuel_source(
        &mut self,
        host: &mut impl BlockAccess,
        pos: BlockPos,
        kind: FuelKind,
    ) -> Result<(), HeaterError> {
        self.heaters.place(host, pos, kind)?;
        self.events.push(SimEvent::HeaterPlaced { pos, kind });
        self.force_save = true;
        Ok(())
    }

    pub fn remove_fuel_source(
        &mut self,
        host: &mut impl BlockAccess,
        pos: BlockPos,
    ) -> Result<FuelHeatSource, HeaterError> {
        let source = self.heaters.remove(host, pos)?;
        self.events.push(SimEvent::HeaterRemoved {
            pos,
            kind: source.kind,
        });
        self.force_save = true;
        Ok(source)
    }

    /// Feed `count` units of `unit_ms` fuel. Returns units consumed.
    pub fn feed_fuel(
        &mut self,
        host: &mut impl BlockAccess,
        pos: BlockPos,
        unit_ms: u64,
        count: u32,
        allow_partial: bool,
    ) -> Result<u32, FeedRejected> {
        let (consumed, lit) = self.heaters.feed(host, pos, unit_ms, count, allow_partial)?;
        self.after_feed(pos, lit);
        Ok(consumed)
    }

    /// Feed burnable items. Returns items consumed.
    pub fn feed_item(
        &mut self,
        host: &mut impl BlockAccess,
        pos: BlockPos,
        item: FuelItem,
        count: u32,
    ) -> Result<u32, FeedRejected> {
        let (consumed, lit) = self.heaters.feed_items(host, pos, item, count)?;
        self.after_feed(pos, lit);
        Ok(consumed)
    }

    fn after_feed(&mut self, pos: BlockPos, lit: bool) {
        if lit {
            self.events
                .push(SimEvent::HeaterStateChanged { pos, active: true });
            self.force_save = true;
        }
    }

    /// Force an entity's freeze stage with fresh clocks.
    pub fn set_stage(&mut self, id: EntityId, stage: FreezeStage, sink: &mut impl EffectSink) {
        let state = self.freeze.entry(id).or_default();
        freeze::set_stage(id, state, stage, sink);
        debug!(?id, %stage, "freeze stage set");
        self.force_save = true;
    }

    /// Reset an entity to no freeze. Safe to repeat.
    pub fn clear_freeze(&mut self, id: EntityId, sink: &mut impl EffectSink) {
        if let Some(state) = self.freeze.get_mut(&id) {
            freeze::clear(id, state, sink);
            self.force_save = true;
        }
    }

    /// Returns whether the death demoted the entity's stage.
    pub fn on_entity_death(&mut self, id: EntityId, sink: &mut impl EffectSink) -> bool {
        let demoted = self
            .freeze
            .get_mut(&id)
            .is_some_and(|state| freeze::on_death(id, state, sink));
        if demoted {
            debug!(?id, "death demoted freeze stage");
            self.events.push(SimEvent::FreezeDemoted { id });
        }
        demoted
    }

    /// Drop session trackers for an entity that left. Freeze state stays.
    pub fn forget_entity(&mut self, id: EntityId) {
        self.insulation.forget(id);
        self.creatures.forget(id);
    }

    pub fn set_global_stage(&mut self, stage: u8) -> Result<GlobalStage, StageError> {
        let stage = GlobalStage::new(stage)?;
        self.stage
            .start(stage, self.now_ms, &self.config.stage_duration_secs);
        info!(%stage, "global stage set");
        self.events.push(SimEvent::StageChanged { stage });
        self.force_save = true;
        Ok(stage)
    }

    pub fn set_auto_stage(&mut self, enabled: bool) {
        self.stage.auto_advance = enabled;
        self.force_save = true;
    }

    pub fn set_stage_infinite(&mut self, infinite: bool) {
        self.stage
            .set_infinite(infinite, self.now_ms, &self.config.stage_duration_secs);
        self.force_save = true;
    }

    /// Advance by `delta_ms` of host time.
    ///
    /// Queued commands apply first, then as many fixed steps as the elapsed
    /// time covers. A save follows when one was forced by a state change or
    /// the save interval has passed.
    pub fn tick(
        &mut self,
        delta_ms: u64,
        host: &mut impl Host,
        entities: &[TrackedEntity],
        sink: &mut impl PersistenceSink,
    ) -> TickReport {
        let started = Instant::now();
        let mut report = TickReport {
            commands: self.drain_commands(host),
            ..TickReport::default()
        };

        let step_ms = self.config.tick_ms.max(1);
        self.pending_ms += delta_ms;
        while self.pending_ms >= step_ms {
            self.pending_ms -= step_ms;
            self.step(step_ms, host, entities, &mut report);
            report.steps += 1;
        }

        report.saved = self.save_if_due(sink);
        self.timer.record(started.elapsed());
        report
    }

    fn drain_commands(&mut self, host: &mut impl Host) -> usize {
        let commands: Vec<SimCommand> = self.rx.try_iter().collect();
        for command in &commands {
            match *command {
                SimCommand::AreaLoaded(chunk) => self.on_area_load(host, chunk),
                SimCommand::AreaUnloaded(chunk) => self.on_area_unload(chunk),
                SimCommand::BlockChanged(pos) => self.on_block_changed(&*host, pos),
                SimCommand::EntityDied(id) => {
                    self.on_entity_death(id, host);
                }
                SimCommand::EntityLeft(id) => self.forget_entity(id),
            }
        }
        commands.len()
    }

    fn step(
        &mut self,
        step_ms: u64,
        host: &mut impl Host,
        entities: &[TrackedEntity],
        report: &mut TickReport,
    ) {
        self.tick += 1;
        self.now_ms += step_ms;
        let _span = info_span!("sim_step", tick = self.tick).entered();

        if let Some(stage) = self
            .stage
            .advance_if_due(self.now_ms, &self.config.stage_duration_secs)
        {
            info!(%stage, "global stage advanced");
            self.events.push(SimEvent::StageChanged { stage });
            self.force_save = true;
        }

        report.natural_found += self.natural.step(&*host);
        if self.now_ms - self.last_validation_ms >= self.config.validation_interval_ms {
            self.last_validation_ms = self.now_ms;
            self.natural
                .validate_near(&*host, entities.iter().map(TrackedEntity::block_pos));
        }

        let heat = self.heaters.tick(host, step_ms);
        for (pos, active) in heat.state_changes {
            self.events
                .push(SimEvent::HeaterStateChanged { pos, active });
            self.force_save = true;
        }
        if heat.melted > 0 {
            self.events.push(SimEvent::Melted { count: heat.melted });
            report.melted += heat.melted;
        }

        let global = self.stage.stage;
        let creatures_active = self.creatures.begin_tick(global);
        for entity in entities {
            match entity.kind {
                EntityKind::Player(mode) if mode.is_immune() => self.shelter(entity.id, host),
                EntityKind::Player(_) => {
                    report.damage += self.step_player(entity, global, step_ms, host);
                }
                EntityKind::Villager | EntityKind::Livestock if creatures_active => {
                    let pos = entity.block_pos();
                    let in_heat = self.is_effectively_heated(&*host, pos);
                    let open = host.is_open_to_sky(pos);
                    report.damage +=
                        self.creatures
                            .update(entity.id, entity.kind, in_heat, open, step_ms, host);
                }
                EntityKind::Villager | EntityKind::Livestock => {}
            }
        }
        if creatures_active {
            self.creatures.retain_present(entities);
        }
    }

    /// Immune players carry no effects and keep their speed.
    fn shelter(&mut self, id: EntityId, sink: &mut impl EffectSink) {
        if let Some(state) = self.freeze.get_mut(&id) {
            freeze::restore_speed(id, state, sink);
        }
        sink.clear_effects(id);
    }

    fn step_player(
        &mut self,
        entity: &TrackedEntity,
        global: GlobalStage,
        step_ms: u64,
        host: &mut impl Host,
    ) -> f32 {
        let id = entity.id;
        let pos = entity.block_pos();
        let in_heat = self.is_effectively_heated(&*host, pos);
        let state = self.freeze.entry(id).or_default();

        if let Some(change) = self
            .insulation
            .update(id, entity.insulated, in_heat, step_ms, host)
        {
            state.zero_accumulators();
            self.events.push(match change {
                InsulationChange::Activated => SimEvent::InsulationActivated { id },
                InsulationChange::Deactivated => SimEvent::InsulationDeactivated { id },
                InsulationChange::Broken => SimEvent::InsulationBroken { id },
            });
        }

        let exposure = Exposure {
            in_heat,
            feet_y: pos.y,
            insulated: self.insulation.is_active(id),
        };
        let out = self.machine.tick(id, state, exposure, global, step_ms, host);
        if let Some(underground) = out.underground {
            self.events
                .push(SimEvent::UndergroundChanged { id, underground });
        }
        if let Some(stage) = out.raised {
            self.events.push(SimEvent::FreezeRaised { id, stage });
        }
        if let Some(from) = out.thawed {
            self.events.push(SimEvent::FreezeThawed { id, from });
        }
        out.damage
    }

    /// Persistable view of the current state.
    pub fn snapshot(&self) -> SavedState {
        SavedState {
            world: self.config.world.clone(),
            elapsed_ms: self.now_ms,
            tick: self.tick,
            stage: self.stage.clone(),
            heaters: self.heaters.saved(),
            freeze: self.freeze.clone(),
        }
    }

    fn save_if_due(&mut self, sink: &mut impl PersistenceSink) -> bool {
        let due = self.now_ms.saturating_sub(self.last_save_ms) >= self.config.save_interval_ms;
        if !self.force_save && !due {
            return false;
        }
        self.force_save = false;
        self.last_save_ms = self.now_ms;
        match sink.save(&self.snapshot()) {
            Ok(()) => {
                debug!(tick = self.tick, "simulation state saved");
                true
            }
            Err(err) => {
                warn!(%err, "saving simulation state failed");
                false
            }
        }
    }

    /// Restore from the sink. Returns false when nothing was saved yet.
    pub fn load(&mut self, sink: &mut impl PersistenceSink) -> Result<bool, PersistError> {
        let Some(saved) = sink.load()? else {
            return Ok(false);
        };
        if saved.world != self.config.world {
            return Err(PersistError::WrongWorld {
                expected: self.config.world.clone(),
                found: saved.world,
            });
        }
        self.now_ms = saved.elapsed_ms;
        self.tick = saved.tick;
        self.last_save_ms = saved.elapsed_ms;
        self.last_validation_ms = saved.elapsed_ms;
        self.stage = saved.stage;
        self.heaters.restore(&saved.heaters);
        self.freeze = saved.freeze;
        info!(
            tick = self.tick,
            heaters = self.heaters.len(),
            entities = self.freeze.len(),
            "simulation state restored"
        );
        Ok(true)
    }

    /// Save once, synchronously. Errors go to the caller.
    pub fn shutdown(&mut self, sink: &mut impl PersistenceSink) -> Result<(), PersistError> {
        sink.save(&self.snapshot())?;
        self.force_save = false;
        self.last_save_ms = self.now_ms;
        info!(tick = self.tick, "simulation flushed on shutdown");
        Ok(())
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

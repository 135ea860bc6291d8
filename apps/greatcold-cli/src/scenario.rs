use glam::Vec3;
use greatcold_common::{
    BlockPos, BlockState, ChunkPos, EntityId, EntityKind, Material, Sandbox, TrackedEntity,
};
use greatcold_kernel::{PersistError, PersistenceSink, SavedState, SimCommand, Simulation};
use greatcold_persist::{ColdStore, SnapshotStore};
use uuid::Uuid;

/// Cells loaded around the origin.
pub const LOAD_RADIUS: i32 = 3;

/// A snowy plain with one campfire, one heater spot and a handful of entities.
///
/// Entity ids are numbered from 1, fixed entities first, so a resumed run
/// finds its saved freeze states again.
pub struct Scenario {
    pub host: Sandbox,
    pub entities: Vec<(String, TrackedEntity)>,
    pub heater: BlockPos,
    pub campfire: BlockPos,
}

impl Scenario {
    pub fn build(players: usize) -> Self {
        let mut host = Sandbox::default();
        host.load_area(ChunkPos::new(0, 0), LOAD_RADIUS);
        let (lo, hi) = (-16 * LOAD_RADIUS, 16 * LOAD_RADIUS + 15);
        host.fill(BlockPos::new(lo, 50, lo), BlockPos::new(hi, 62, hi), Material::Stone);
        host.fill(BlockPos::new(lo, 63, lo), BlockPos::new(hi, 63, hi), Material::Snow);

        let campfire = BlockPos::new(-20, 64, -20);
        host.set_block(campfire, BlockState::lit(Material::Campfire));
        let heater = BlockPos::new(20, 64, 20);

        let mut next = 0u128;
        let mut id = || {
            next += 1;
            EntityId(Uuid::from_u128(next))
        };

        let mut entities = Vec::new();
        entities.push((
            "camper".into(),
            TrackedEntity::player(id(), Vec3::new(-18.5, 64.0, -20.5)),
        ));
        entities.push((
            "miner".into(),
            TrackedEntity::player(id(), Vec3::new(0.5, 12.0, 0.5)),
        ));
        entities.push((
            "hatted".into(),
            TrackedEntity {
                insulated: true,
                ..TrackedEntity::player(id(), Vec3::new(-30.5, 64.0, 30.5))
            },
        ));
        entities.push((
            "villager".into(),
            TrackedEntity {
                kind: EntityKind::Villager,
                ..TrackedEntity::player(id(), Vec3::new(30.5, 64.0, -30.5))
            },
        ));
        entities.push((
            "cow".into(),
            TrackedEntity {
                kind: EntityKind::Livestock,
                ..TrackedEntity::player(id(), Vec3::new(40.5, 64.0, -40.5))
            },
        ));
        for i in 0..players {
            let x = 20.5 + 12.0 * i as f32;
            entities.push((
                format!("player-{i}"),
                TrackedEntity::player(id(), Vec3::new(x, 64.0, 20.5)),
            ));
        }

        Self {
            host,
            entities,
            heater,
            campfire,
        }
    }

    pub fn chunks(&self) -> impl Iterator<Item = ChunkPos> {
        ChunkPos::new(0, 0).square(LOAD_RADIUS)
    }

    pub fn tracked(&self) -> Vec<TrackedEntity> {
        self.entities.iter().map(|(_, e)| *e).collect()
    }

    /// Resume `sim` from `sink` when it holds a state, then queue the area
    /// loads. Returns whether a state was resumed.
    ///
    /// The sandbox starts blank, so restored heaters get their blocks back
    /// first; otherwise the area-load check would drop them as broken.
    pub fn attach(
        &mut self,
        sim: &mut Simulation,
        sink: &mut impl PersistenceSink,
    ) -> Result<bool, PersistError> {
        let resumed = sim.load(sink)?;
        for heater in sim.heaters().iter() {
            let material = heater.display_material(&self.host);
            self.host.set_block(heater.pos, material);
        }

        let handle = sim.handle();
        for chunk in self.chunks() {
            handle.send(SimCommand::AreaLoaded(chunk));
        }
        Ok(resumed)
    }
}

/// Where a run saves to: a store directory or snapshots kept in memory.
pub enum Sink {
    Store(ColdStore),
    Memory(SnapshotStore),
}

impl PersistenceSink for Sink {
    fn save(&mut self, state: &SavedState) -> Result<(), PersistError> {
        match self {
            Sink::Store(store) => store.save(state),
            Sink::Memory(store) => store.save(state),
        }
    }

    fn load(&mut self) -> Result<Option<SavedState>, PersistError> {
        match self {
            Sink::Store(store) => store.load(),
            Sink::Memory(store) => store.load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greatcold_kernel::{FuelItem, FuelKind, SimConfig, SimEvent};

    fn run(world: &mut Scenario, sim: &mut Simulation, sink: &mut impl PersistenceSink, secs: u64) {
        let tracked = world.tracked();
        for _ in 0..secs {
            sim.tick(1_000, &mut world.host, &tracked, sink);
        }
    }

    #[test]
    fn entity_ids_are_stable_across_builds() {
        let a = Scenario::build(2);
        let b = Scenario::build(2);
        assert_eq!(a.tracked(), b.tracked());
        assert_eq!(a.entities[0].0, "camper");
        assert_eq!(a.entities[0].1.id, EntityId(Uuid::from_u128(1)));
        assert_eq!(Scenario::build(5).entities[..5], a.entities[..5]);
    }

    #[test]
    fn resumed_run_keeps_heater_and_freeze_state() {
        let mut store = SnapshotStore::new();

        let mut world = Scenario::build(1);
        let mut sim = Simulation::new(SimConfig::default());
        assert!(!world.attach(&mut sim, &mut store).unwrap());
        sim.place_fuel_source(&mut world.host, world.heater, FuelKind::SmallHeater)
            .unwrap();
        sim.feed_item(&mut world.host, world.heater, FuelItem::CoalBlock, 1)
            .unwrap();
        sim.set_global_stage(3).unwrap();
        run(&mut world, &mut sim, &mut store, 90);
        sim.shutdown(&mut store).unwrap();
        // Natural heat does not count under open sky at stage 3.
        let camper = world.entities.iter().find(|(n, _)| n == "camper").unwrap().1.id;
        let cold_ms = sim.freeze_state(camper).unwrap().time_without_heat_ms;
        assert_eq!(cold_ms, 90_000);

        let mut world = Scenario::build(1);
        let mut sim = Simulation::new(SimConfig::default());
        assert!(world.attach(&mut sim, &mut store).unwrap());
        run(&mut world, &mut sim, &mut store, 1);

        let heater = sim.heaters().get(world.heater).unwrap();
        assert!(heater.is_active());
        assert!(
            !sim.drain_events()
                .iter()
                .any(|e| matches!(e, SimEvent::HeaterInvalidated { .. }))
        );
        assert_eq!(
            sim.freeze_state(camper).map(|s| s.time_without_heat_ms),
            Some(91_000)
        );
        // Four players; creatures keep no freeze state.
        assert_eq!(sim.freeze_states().count(), 4);
    }
}

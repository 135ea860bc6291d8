use std::collections::BTreeMap;

use greatcold_common::{BlockAccess, BlockPos, ChunkPos, Material};
use greatcold_stream::{HeatRegion, SpatialIndex};

use crate::fuel::{FeedRejected, FuelHeatSource, FuelItem, FuelKind};
use crate::melt::TerrainMelter;
use crate::saved::SavedHeater;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeaterError {
    #[error("a heater already stands at {0}")]
    Occupied(BlockPos),
    #[error("no heater at {0}")]
    Missing(BlockPos),
    #[error("cell of {0} is not loaded")]
    Unloaded(BlockPos),
}

/// Outcome of one heater tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaterTick {
    /// Heaters whose `active` flag flipped, with the new value.
    pub state_changes: Vec<(BlockPos, bool)>,
    pub melt_ran: bool,
    pub melted: usize,
}

/// Owns every placed heater.
///
/// Heaters are kept in position order for deterministic iteration and mirrored
/// in a spatial index for point queries.
#[derive(Debug, Default)]
pub struct FuelHeatRegistry {
    sources: BTreeMap<BlockPos, FuelHeatSource>,
    index: SpatialIndex<FuelKind>,
    ticks: u64,
    melt_every: u64,
    max_melts: usize,
}

impl FuelHeatRegistry {
    pub fn new(melt_every: u64, max_melts: usize) -> Self {
        Self {
            melt_every: melt_every.max(1),
            max_melts,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn get(&self, pos: BlockPos) -> Option<&FuelHeatSource> {
        self.sources.get(&pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FuelHeatSource> {
        self.sources.values()
    }

    /// Place a fresh, unfuelled heater and set its block to the inert material.
    pub fn place(
        &mut self,
        host: &mut impl BlockAccess,
        pos: BlockPos,
        kind: FuelKind,
    ) -> Result<&FuelHeatSource, HeaterError> {
        if self.sources.contains_key(&pos) {
            return Err(HeaterError::Occupied(pos));
        }
        if !host.is_chunk_loaded(pos.chunk()) {
            return Err(HeaterError::Unloaded(pos));
        }
        let source = FuelHeatSource::new(kind, pos);
        host.set_material(pos, kind.profile().inert);
        self.index
            .register(HeatRegion::new(pos, kind, source.radius));
        tracing::debug!(%pos, kind = kind.name(), "heater placed");
        Ok(self.sources.entry(pos).or_insert(source))
    }

    /// Remove a heater and clear its block.
    pub fn remove(
        &mut self,
        host: &mut impl BlockAccess,
        pos: BlockPos,
    ) -> Result<FuelHeatSource, HeaterError> {
        let source = self.evict(pos).ok_or(HeaterError::Missing(pos))?;
        if host.is_chunk_loaded(pos.chunk()) {
            host.set_material(pos, Material::Air);
        }
        tracing::debug!(%pos, "heater removed");
        Ok(source)
    }

    /// Feed fuel units. Returns units consumed and whether the heater lit up.
    pub fn feed(
        &mut self,
        host: &mut impl BlockAccess,
        pos: BlockPos,
        unit_ms: u64,
        count: u32,
        allow_partial: bool,
    ) -> Result<(u32, bool), FeedRejected> {
        let source = self.sources.get_mut(&pos).ok_or(FeedRejected::NoHeater)?;
        let was_active = source.is_active();
        let consumed = source.feed(unit_ms, count, allow_partial)?;
        let lit = !was_active && source.is_active();
        if lit {
            refresh_block(host, source);
        }
        Ok((consumed, lit))
    }

    pub fn feed_items(
        &mut self,
        host: &mut impl BlockAccess,
        pos: BlockPos,
        item: FuelItem,
        count: u32,
    ) -> Result<(u32, bool), FeedRejected> {
        let kind = self.sources.get(&pos).ok_or(FeedRejected::NoHeater)?.kind;
        self.feed(host, pos, item.unit_ms(kind), count, true)
    }

    /// Whether an active heater in a loaded cell covers `pos`.
    pub fn is_heated(&self, host: &impl BlockAccess, pos: BlockPos) -> bool {
        self.index.regions_near(pos).any(|r| {
            r.contains(pos)
                && self.sources.get(&r.anchor).is_some_and(FuelHeatSource::is_active)
                && host.is_chunk_loaded(r.anchor.chunk())
        })
    }

    /// Burn fuel on every heater and, every `melt_every` ticks, melt around
    /// the effectively active ones.
    pub fn tick(&mut self, host: &mut impl BlockAccess, tick_ms: u64) -> HeaterTick {
        let _span = tracing::info_span!("heater_tick", heaters = self.sources.len()).entered();
        let mut out = HeaterTick::default();
        self.ticks += 1;

        for source in self.sources.values_mut() {
            if source.decay(tick_ms) {
                let active = source.is_active();
                tracing::debug!(pos = %source.pos, active, "heater state changed");
                refresh_block(host, source);
                out.state_changes.push((source.pos, active));
            }
        }

        if self.ticks % self.melt_every == 0 {
            out.melt_ran = true;
            for source in self.sources.values() {
                if !host.is_chunk_loaded(source.pos.chunk()) {
                    continue;
                }
                refresh_block(host, source);
                if !source.is_effectively_active(&*host) {
                    continue;
                }
                let melter = TerrainMelter::new(self.max_melts, source.kind.profile().melt_node_cap);
                out.melted += melter.melt_around(host, source.pos, source.radius).melted;
            }
        }

        tracing::trace!(
            changes = out.state_changes.len(),
            melted = out.melted,
            "heater tick complete"
        );
        out
    }

    /// Drop heaters in a freshly loaded cell whose block no longer matches
    /// their kind. Returns the heaters dropped.
    pub fn on_area_load(
        &mut self,
        host: &mut impl BlockAccess,
        chunk: ChunkPos,
    ) -> Vec<FuelHeatSource> {
        let anchors: Vec<BlockPos> = self.index.regions_in_chunk(chunk).map(|r| r.anchor).collect();
        let mut dropped = Vec::new();
        for pos in anchors {
            let Some(source) = self.sources.get(&pos) else {
                continue;
            };
            let intact = host
                .material(pos)
                .is_some_and(|m| source.kind.owns_material(m));
            if intact {
                refresh_block(host, source);
            } else if let Some(source) = self.evict(pos) {
                tracing::debug!(%pos, "heater invalidated on load");
                dropped.push(source);
            }
        }
        dropped
    }

    /// Replace all heaters with saved ones.
    pub fn restore(&mut self, saved: &[SavedHeater]) {
        self.sources.clear();
        self.index.clear();
        for h in saved {
            let source = FuelHeatSource::with_fuel(h.kind, h.pos, h.fuel_ms);
            self.index
                .register(HeatRegion::new(h.pos, h.kind, source.radius));
            self.sources.insert(h.pos, source);
        }
    }

    pub fn saved(&self) -> Vec<SavedHeater> {
        self.sources
            .values()
            .map(|s| SavedHeater {
                kind: s.kind,
                pos: s.pos,
                fuel_ms: s.fuel_ms(),
            })
            .collect()
    }

    fn evict(&mut self, pos: BlockPos) -> Option<FuelHeatSource> {
        let source = self.sources.remove(&pos)?;
        self.index.unregister(pos);
        Some(source)
    }
}

/// Swap the heater's block to the material matching its state.
fn refresh_block(host: &mut impl BlockAccess, source: &FuelHeatSource) {
    if !host.is_chunk_loaded(source.pos.chunk()) {
        return;
    }
    let want = source.display_material(&*host);
    if host.material(source.pos) != Some(want) {
        host.set_material(source.pos, want);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greatcold_common::Sandbox;

    fn setup() -> (Sandbox, FuelHeatRegistry) {
        let mut sb = Sandbox::default();
        sb.load_area(ChunkPos::new(0, 0), 2);
        (sb, FuelHeatRegistry::new(5, 64))
    }

    #[test]
    fn place_rejects_occupied_position() {
        let (mut sb, mut reg) = setup();
        let pos = BlockPos::new(3, 64, 3);
        assert!(reg.place(&mut sb, pos, FuelKind::SmallHeater).is_ok());
        assert_eq!(sb.material(pos), Some(Material::CoalBlock));
        assert_eq!(
            reg.place(&mut sb, pos, FuelKind::SeaHeater).err(),
            Some(HeaterError::Occupied(pos))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn place_in_unloaded_cell_rejected() {
        let (mut sb, mut reg) = setup();
        let pos = BlockPos::new(500, 64, 500);
        assert_eq!(
            reg.place(&mut sb, pos, FuelKind::SmallHeater).err(),
            Some(HeaterError::Unloaded(pos))
        );
    }

    #[test]
    fn feeding_lights_the_heater() {
        let (mut sb, mut reg) = setup();
        let pos = BlockPos::new(3, 64, 3);
        reg.place(&mut sb, pos, FuelKind::SmallHeater).unwrap();
        assert!(!reg.is_heated(&sb, pos.offset(1, 0, 0)));
        assert_eq!(reg.feed_items(&mut sb, pos, FuelItem::Coal, 2), Ok((2, true)));
        assert_eq!(sb.material(pos), Some(Material::Shroomlight));
        assert!(reg.is_heated(&sb, pos.offset(15, -15, 15)));
        assert!(!reg.is_heated(&sb, pos.offset(16, 0, 0)));
        assert_eq!(
            reg.feed(&mut sb, BlockPos::new(0, 0, 0), 1, 1, false),
            Err(FeedRejected::NoHeater)
        );
    }

    #[test]
    fn coal_block_burns_out_after_exactly_4860_ticks() {
        let (mut sb, _) = setup();
        let mut reg = FuelHeatRegistry::new(u64::MAX, 64);
        let pos = BlockPos::new(8, 64, 8);
        reg.place(&mut sb, pos, FuelKind::SmallHeater).unwrap();
        reg.feed_items(&mut sb, pos, FuelItem::CoalBlock, 1).unwrap();
        assert_eq!(reg.get(pos).map(FuelHeatSource::fuel_ms), Some(4_860_000));

        for tick in 1..4_860 {
            let out = reg.tick(&mut sb, 1_000);
            assert!(out.state_changes.is_empty(), "went out early at tick {tick}");
        }
        assert!(reg.get(pos).is_some_and(FuelHeatSource::is_active));
        let out = reg.tick(&mut sb, 1_000);
        assert_eq!(out.state_changes, vec![(pos, false)]);
        assert_eq!(sb.material(pos), Some(Material::CoalBlock));
        assert!(!reg.is_heated(&sb, pos));
    }

    #[test]
    fn melts_every_fifth_tick_only() {
        let (mut sb, mut reg) = setup();
        let pos = BlockPos::new(8, 64, 8);
        sb.fill(BlockPos::new(0, 63, 0), BlockPos::new(15, 63, 15), Material::SnowBlock);
        reg.place(&mut sb, pos, FuelKind::SmallHeater).unwrap();
        reg.feed(&mut sb, pos, 60_000, 10, false).unwrap();
        for _ in 0..4 {
            assert!(!reg.tick(&mut sb, 1_000).melt_ran);
        }
        let out = reg.tick(&mut sb, 1_000);
        assert!(out.melt_ran);
        assert_eq!(out.melted, 64);
    }

    #[test]
    fn dry_sea_heater_heats_but_does_not_melt() {
        let (mut sb, mut reg) = setup();
        let pos = BlockPos::new(8, 40, 8);
        sb.set_block(pos.offset(1, 0, 0), Material::Ice);
        reg.place(&mut sb, pos, FuelKind::SeaHeater).unwrap();
        reg.feed(&mut sb, pos, 60_000, 10, false).unwrap();
        for _ in 0..5 {
            reg.tick(&mut sb, 1_000);
        }
        assert!(reg.is_heated(&sb, pos));
        assert_eq!(sb.material(pos.offset(1, 0, 0)), Some(Material::Ice));
        assert_eq!(sb.material(pos), Some(Material::DarkPrismarine));

        sb.set_block(pos.up(), Material::Water);
        for _ in 0..5 {
            reg.tick(&mut sb, 1_000);
        }
        assert_eq!(sb.material(pos.offset(1, 0, 0)), Some(Material::Water));
        assert_eq!(sb.material(pos), Some(Material::SeaLantern));
    }

    #[test]
    fn area_load_drops_heaters_with_foreign_blocks() {
        let (mut sb, mut reg) = setup();
        let keep = BlockPos::new(1, 64, 1);
        let lose = BlockPos::new(2, 64, 2);
        reg.place(&mut sb, keep, FuelKind::SmallHeater).unwrap();
        reg.place(&mut sb, lose, FuelKind::SmallHeater).unwrap();
        sb.set_block(lose, Material::Stone);

        let dropped = reg.on_area_load(&mut sb, ChunkPos::new(0, 0));
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].pos, lose);
        assert!(reg.get(keep).is_some());
        assert!(reg.get(lose).is_none());
    }

    #[test]
    fn remove_clears_block() {
        let (mut sb, mut reg) = setup();
        let pos = BlockPos::new(1, 64, 1);
        reg.place(&mut sb, pos, FuelKind::SmallHeater).unwrap();
        assert!(reg.remove(&mut sb, pos).is_ok());
        assert_eq!(sb.material(pos), Some(Material::Air));
        assert_eq!(reg.remove(&mut sb, pos).err(), Some(HeaterError::Missing(pos)));
    }

    #[test]
    fn unloaded_heater_does_not_heat() {
        let (mut sb, mut reg) = setup();
        let pos = BlockPos::new(1, 64, 1);
        reg.place(&mut sb, pos, FuelKind::SmallHeater).unwrap();
        reg.feed(&mut sb, pos, 60_000, 1, false).unwrap();
        sb.unload_chunk(ChunkPos::new(0, 0));
        assert!(!reg.is_heated(&sb, BlockPos::new(17, 64, 1)));
    }
}

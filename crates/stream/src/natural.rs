use greatcold_common::{BlockAccess, BlockPos, BlockState, ChunkPos, Material};
use serde::{Deserialize, Serialize};

use crate::budget::{ScanConfig, ScanScheduler};
use crate::grid::{HeatRegion, SpatialIndex};

/// Block kinds that can warm their surroundings without fuel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NaturalKind {
    Campfire,
    SoulCampfire,
    Lava,
    MagmaBlock,
    Fire,
    Furnace,
    BlastFurnace,
    Smoker,
}

impl NaturalKind {
    pub fn from_material(material: Material) -> Option<Self> {
        Some(match material {
            Material::Campfire => NaturalKind::Campfire,
            Material::SoulCampfire => NaturalKind::SoulCampfire,
            Material::Lava => NaturalKind::Lava,
            Material::MagmaBlock => NaturalKind::MagmaBlock,
            Material::Fire => NaturalKind::Fire,
            Material::Furnace => NaturalKind::Furnace,
            Material::BlastFurnace => NaturalKind::BlastFurnace,
            Material::Smoker => NaturalKind::Smoker,
            _ => return None,
        })
    }

    fn is_furnace_family(self) -> bool {
        matches!(
            self,
            NaturalKind::Furnace | NaturalKind::BlastFurnace | NaturalKind::Smoker
        )
    }
}

/// Heat radius per natural kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NaturalRadii {
    pub campfire: i32,
    pub soul_campfire: i32,
    pub lava: i32,
    pub magma_block: i32,
    pub fire: i32,
    pub furnace: i32,
    pub blast_furnace: i32,
    pub smoker: i32,
}

impl Default for NaturalRadii {
    fn default() -> Self {
        Self {
            campfire: 4,
            soul_campfire: 4,
            lava: 3,
            magma_block: 2,
            fire: 3,
            furnace: 3,
            blast_furnace: 3,
            smoker: 3,
        }
    }
}

impl NaturalRadii {
    pub fn radius(&self, kind: NaturalKind) -> i32 {
        match kind {
            NaturalKind::Campfire => self.campfire,
            NaturalKind::SoulCampfire => self.soul_campfire,
            NaturalKind::Lava => self.lava,
            NaturalKind::MagmaBlock => self.magma_block,
            NaturalKind::Fire => self.fire,
            NaturalKind::Furnace => self.furnace,
            NaturalKind::BlastFurnace => self.blast_furnace,
            NaturalKind::Smoker => self.smoker,
        }
    }
}

/// Whether the block at `pos` currently gives off heat.
///
/// Campfires need to be lit. Furnaces need burn time, or failing that a block
/// light level at the furnace above the level directly over it.
pub fn provides_heat(host: &impl BlockAccess, pos: BlockPos, state: BlockState) -> bool {
    let Some(kind) = NaturalKind::from_material(state.material) else {
        return false;
    };
    match kind {
        NaturalKind::Campfire | NaturalKind::SoulCampfire => state.lit,
        k if k.is_furnace_family() => {
            state.burn_time > 0 || host.block_light(pos) > host.block_light(pos.up())
        }
        _ => true,
    }
}

/// Discovers and tracks fuel-less heat sources in loaded cells.
///
/// Regions are derived from world blocks and are never persisted.
#[derive(Debug)]
pub struct NaturalHeatRegistry {
    index: SpatialIndex<NaturalKind>,
    scans: ScanScheduler,
    radii: NaturalRadii,
}

impl Default for NaturalHeatRegistry {
    fn default() -> Self {
        Self::new(NaturalRadii::default(), ScanConfig::default())
    }
}

impl NaturalHeatRegistry {
    pub fn new(radii: NaturalRadii, scan: ScanConfig) -> Self {
        Self {
            index: SpatialIndex::new(),
            scans: ScanScheduler::new(scan),
            radii,
        }
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.index.contains(pos)
    }

    pub fn index(&self) -> &SpatialIndex<NaturalKind> {
        &self.index
    }

    pub fn scans(&self) -> &ScanScheduler {
        &self.scans
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Cheap immediate pass over a freshly loaded cell, then queue the full scan.
    ///
    /// The cheap pass looks at tile entities and probes the top
    /// `surface_probe_depth` blocks of every column. Returns regions found.
    pub fn on_area_load(&mut self, host: &impl BlockAccess, chunk: ChunkPos) -> usize {
        let _span = tracing::info_span!("natural_area_load", x = chunk.x, z = chunk.z).entered();
        if !host.is_chunk_loaded(chunk) {
            return 0;
        }
        let mut found = 0;
        for pos in host.tile_entities(chunk) {
            if self.consider(host, pos) {
                found += 1;
            }
        }

        let depth = self.scans.config.surface_probe_depth;
        let (min_y, _) = host.height_range();
        for col in 0..greatcold_common::COLUMNS_PER_CHUNK {
            let (x, z) = chunk.column(col);
            let Some(top) = host.highest_block_y(x, z) else {
                continue;
            };
            for y in ((top - depth).max(min_y)..=top).rev() {
                let pos = BlockPos::new(x, y, z);
                if self.index.get(pos).is_none() && self.consider(host, pos) {
                    found += 1;
                }
            }
        }

        self.scans.enqueue(chunk);
        tracing::debug!(?chunk, found, "cheap pass done, full scan queued");
        found
    }

    /// Evict every region in `chunk` and cancel its pending scan.
    pub fn on_area_unload(&mut self, chunk: ChunkPos) -> usize {
        let evicted = self.index.remove_chunk(chunk).len();
        let cancelled = self.scans.cancel(chunk);
        tracing::debug!(?chunk, evicted, cancelled, "natural regions unloaded");
        evicted
    }

    /// Re-evaluate one block after the host reports a change (placed, broken,
    /// ignited, extinguished).
    pub fn on_block_changed(&mut self, host: &impl BlockAccess, pos: BlockPos) {
        if !self.consider(host, pos) && self.index.unregister(pos).is_some() {
            tracing::debug!(%pos, "natural heat source gone");
        }
    }

    /// Advance the background scans by one budgeted batch. Returns new regions.
    pub fn step(&mut self, host: &impl BlockAccess) -> usize {
        let batch = self.scans.next_batch();
        if batch.is_empty() {
            return 0;
        }
        let (min_y, max_y) = host.height_range();
        let top = max_y.min(host.sea_level() + self.scans.config.scan_height_above_sea);
        let mut found = 0;
        for (chunk, col) in batch {
            if !host.is_chunk_loaded(chunk) {
                self.scans.cancel(chunk);
                continue;
            }
            let (x, z) = chunk.column(col);
            for y in min_y..top {
                let pos = BlockPos::new(x, y, z);
                if self.index.get(pos).is_none() && self.consider(host, pos) {
                    found += 1;
                }
            }
        }
        tracing::trace!(
            columns = self.scans.stats().columns_this_tick,
            pending = self.scans.stats().pending_cells,
            found,
            "natural scan step"
        );
        found
    }

    /// Re-check regions anchored in the 3x3 cells around each position and
    /// evict those whose block no longer provides heat. Returns evictions.
    pub fn validate_near(
        &mut self,
        host: &impl BlockAccess,
        positions: impl IntoIterator<Item = BlockPos>,
    ) -> usize {
        let mut cells: Vec<ChunkPos> = positions
            .into_iter()
            .flat_map(|p| p.chunk().square(1))
            .collect();
        cells.sort();
        cells.dedup();

        let stale: Vec<BlockPos> = cells
            .iter()
            .flat_map(|c| self.index.regions_in_chunk(*c))
            .filter(|r| {
                !host
                    .block(r.anchor)
                    .is_some_and(|state| provides_heat(host, r.anchor, state))
            })
            .map(|r| r.anchor)
            .collect();

        for anchor in &stale {
            self.index.unregister(*anchor);
        }
        if !stale.is_empty() {
            tracing::debug!(evicted = stale.len(), "natural validation evicted regions");
        }
        stale.len()
    }

    /// Register `pos` if it provides heat. Returns whether it is registered.
    fn consider(&mut self, host: &impl BlockAccess, pos: BlockPos) -> bool {
        let Some(state) = host.block(pos) else {
            return false;
        };
        if !provides_heat(host, pos, state) {
            return false;
        }
        let Some(kind) = NaturalKind::from_material(state.material) else {
            return false;
        };
        self.index
            .register(HeatRegion::new(pos, kind, self.radii.radius(kind)));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greatcold_common::Sandbox;

    fn world() -> Sandbox {
        let mut sb = Sandbox::default();
        sb.load_area(ChunkPos::new(0, 0), 1);
        sb.fill(BlockPos::new(0, 60, 0), BlockPos::new(15, 62, 15), Material::Stone);
        sb
    }

    #[test]
    fn campfire_needs_lit_flag() {
        let mut sb = world();
        let pos = BlockPos::new(4, 63, 4);
        sb.set_block(pos, Material::Campfire);
        assert!(!provides_heat(&sb, pos, BlockState::of(Material::Campfire)));
        assert!(provides_heat(&sb, pos, BlockState::lit(Material::Campfire)));
    }

    #[test]
    fn furnace_burn_time_or_light_differential() {
        let mut sb = world();
        let pos = BlockPos::new(2, 63, 2);
        let idle = BlockState::of(Material::Furnace);
        assert!(!provides_heat(&sb, pos, idle));
        assert!(provides_heat(&sb, pos, BlockState::burning(Material::Smoker, 40)));
        sb.set_light(pos, 13);
        sb.set_light(pos.up(), 12);
        assert!(provides_heat(&sb, pos, idle));
    }

    #[test]
    fn lava_and_magma_always_heat() {
        let sb = world();
        let pos = BlockPos::new(0, 0, 0);
        assert!(provides_heat(&sb, pos, Material::Lava.into()));
        assert!(provides_heat(&sb, pos, Material::MagmaBlock.into()));
        assert!(!provides_heat(&sb, pos, Material::Stone.into()));
    }

    #[test]
    fn cheap_pass_finds_tile_entities_and_surface_sources() {
        let mut sb = world();
        let campfire = BlockPos::new(4, 63, 4);
        sb.set_block(campfire, BlockState::lit(Material::Campfire));
        let magma = BlockPos::new(9, 62, 9);
        sb.set_block(magma, Material::MagmaBlock);

        let mut reg = NaturalHeatRegistry::default();
        let found = reg.on_area_load(&sb, ChunkPos::new(0, 0));
        assert_eq!(found, 2);
        assert!(reg.contains(BlockPos::new(8, 66, 8)));
        assert!(reg.contains(BlockPos::new(11, 64, 11)));
        assert!(!reg.contains(BlockPos::new(12, 64, 12)));
        assert!(reg.scans().is_pending(ChunkPos::new(0, 0)));
    }

    #[test]
    fn deep_lava_found_only_by_full_scan() {
        let mut sb = world();
        let lava = BlockPos::new(3, -40, 3);
        sb.set_block(lava, Material::Lava);

        let mut reg = NaturalHeatRegistry::new(
            NaturalRadii::default(),
            ScanConfig {
                columns_per_tick: 128,
                ..ScanConfig::default()
            },
        );
        reg.on_area_load(&sb, ChunkPos::new(0, 0));
        assert!(!reg.contains(lava));
        reg.step(&sb);
        reg.step(&sb);
        assert!(reg.contains(lava));
        assert!(!reg.scans().is_pending(ChunkPos::new(0, 0)));
    }

    #[test]
    fn unload_evicts_and_cancels() {
        let mut sb = world();
        sb.set_block(BlockPos::new(4, 63, 4), BlockState::lit(Material::Campfire));
        let mut reg = NaturalHeatRegistry::default();
        reg.on_area_load(&sb, ChunkPos::new(0, 0));
        assert_eq!(reg.on_area_unload(ChunkPos::new(0, 0)), 1);
        assert!(reg.is_empty());
        assert_eq!(reg.scans().pending(), 0);
    }

    #[test]
    fn validation_evicts_extinguished_campfire() {
        let mut sb = world();
        let pos = BlockPos::new(4, 63, 4);
        sb.set_block(pos, BlockState::lit(Material::Campfire));
        let mut reg = NaturalHeatRegistry::default();
        reg.on_area_load(&sb, ChunkPos::new(0, 0));

        sb.set_block(pos, Material::Campfire);
        // Far away: outside the 3x3 neighbourhood, nothing is checked.
        assert_eq!(reg.validate_near(&sb, [BlockPos::new(200, 64, 200)]), 0);
        assert_eq!(reg.validate_near(&sb, [BlockPos::new(20, 64, 0)]), 1);
        assert!(!reg.contains(pos));
    }

    #[test]
    fn block_change_registers_and_evicts() {
        let mut sb = world();
        let pos = BlockPos::new(7, 63, 7);
        let mut reg = NaturalHeatRegistry::default();

        sb.set_block(pos, Material::Fire);
        reg.on_block_changed(&sb, pos);
        assert!(reg.contains(pos.offset(3, 0, 0)));

        sb.set_block(pos, Material::Air);
        reg.on_block_changed(&sb, pos);
        assert!(reg.is_empty());
    }
}

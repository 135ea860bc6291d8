use std::collections::{BTreeMap, HashMap, HashSet};

use crate::block::{BlockState, Material};
use crate::host::{BlockAccess, EffectSink, InsulationWear, StatusEffect};
use crate::types::{BlockPos, ChunkPos, EntityId};

/// Default walk speed reported for entities with no recorded speed.
pub const DEFAULT_MOVEMENT_SPEED: f32 = 0.2;

/// Durability of a fresh insulating item.
pub const INSULATION_DURABILITY: u32 = 200;

/// In-memory host world.
///
/// Blocks not explicitly set are air. Cells must be loaded before their
/// blocks are visible. Effects, damage and speed changes are recorded so
/// callers can inspect what the simulation did.
#[derive(Debug, Clone)]
pub struct Sandbox {
    blocks: HashMap<BlockPos, BlockState>,
    light: HashMap<BlockPos, u8>,
    loaded: HashSet<ChunkPos>,
    min_y: i32,
    max_y: i32,
    effects: HashMap<EntityId, BTreeMap<StatusEffect, u8>>,
    damage: HashMap<EntityId, f32>,
    speeds: HashMap<EntityId, f32>,
    insulation: HashMap<EntityId, u32>,
    writes: u64,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(-64, 320)
    }
}

impl Sandbox {
    pub fn new(min_y: i32, max_y: i32) -> Self {
        Self {
            blocks: HashMap::new(),
            light: HashMap::new(),
            loaded: HashSet::new(),
            min_y,
            max_y,
            effects: HashMap::new(),
            damage: HashMap::new(),
            speeds: HashMap::new(),
            insulation: HashMap::new(),
            writes: 0,
        }
    }

    pub fn load_chunk(&mut self, chunk: ChunkPos) {
        self.loaded.insert(chunk);
    }

    /// Load every cell within `radius` cells of `center`.
    pub fn load_area(&mut self, center: ChunkPos, radius: i32) {
        self.loaded.extend(center.square(radius));
    }

    pub fn unload_chunk(&mut self, chunk: ChunkPos) {
        self.loaded.remove(&chunk);
    }

    pub fn set_block(&mut self, pos: BlockPos, state: impl Into<BlockState>) {
        let state = state.into();
        if state.material == Material::Air {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, state);
        }
    }

    /// Fill the inclusive box between two corners.
    pub fn fill(&mut self, a: BlockPos, b: BlockPos, material: Material) {
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                for z in a.z.min(b.z)..=a.z.max(b.z) {
                    self.set_block(BlockPos::new(x, y, z), material);
                }
            }
        }
    }

    pub fn set_light(&mut self, pos: BlockPos, level: u8) {
        self.light.insert(pos, level.min(15));
    }

    pub fn total_damage(&self, id: EntityId) -> f32 {
        self.damage.get(&id).copied().unwrap_or(0.0)
    }

    pub fn effect_level(&self, id: EntityId, effect: StatusEffect) -> Option<u8> {
        self.effects.get(&id).and_then(|m| m.get(&effect)).copied()
    }

    pub fn active_effects(&self, id: EntityId) -> usize {
        self.effects.get(&id).map_or(0, BTreeMap::len)
    }

    pub fn insulation_durability(&self, id: EntityId) -> u32 {
        self.insulation
            .get(&id)
            .copied()
            .unwrap_or(INSULATION_DURABILITY)
    }

    /// Number of `set_material` calls the simulation made.
    pub fn block_writes(&self) -> u64 {
        self.writes
    }

    pub fn count_material(&self, material: Material) -> usize {
        self.blocks
            .values()
            .filter(|b| b.material == material)
            .count()
    }

    fn in_range(&self, pos: BlockPos) -> bool {
        pos.y >= self.min_y && pos.y < self.max_y
    }
}

impl BlockAccess for Sandbox {
    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool {
        self.loaded.contains(&chunk)
    }

    fn block(&self, pos: BlockPos) -> Option<BlockState> {
        if !self.in_range(pos) || !self.loaded.contains(&pos.chunk()) {
            return None;
        }
        Some(self.blocks.get(&pos).copied().unwrap_or(BlockState::AIR))
    }

    fn set_material(&mut self, pos: BlockPos, material: Material) {
        if !self.in_range(pos) {
            return;
        }
        self.writes += 1;
        self.set_block(pos, material);
    }

    fn block_light(&self, pos: BlockPos) -> u8 {
        self.light.get(&pos).copied().unwrap_or(0)
    }

    fn highest_block_y(&self, x: i32, z: i32) -> Option<i32> {
        let column = BlockPos::new(x, self.min_y, z);
        if !self.loaded.contains(&column.chunk()) {
            return None;
        }
        (self.min_y..self.max_y)
            .rev()
            .find(|&y| self.blocks.contains_key(&BlockPos::new(x, y, z)))
    }

    fn height_range(&self) -> (i32, i32) {
        (self.min_y, self.max_y)
    }

    fn tile_entities(&self, chunk: ChunkPos) -> Vec<BlockPos> {
        if !self.loaded.contains(&chunk) {
            return Vec::new();
        }
        let mut found: Vec<BlockPos> = self
            .blocks
            .iter()
            .filter(|(pos, state)| pos.chunk() == chunk && state.material.has_tile_entity())
            .map(|(pos, _)| *pos)
            .collect();
        found.sort();
        found
    }
}

impl EffectSink for Sandbox {
    fn apply_effect(&mut self, id: EntityId, effect: StatusEffect, level: u8) {
        self.effects.entry(id).or_default().insert(effect, level);
    }

    fn remove_effect(&mut self, id: EntityId, effect: StatusEffect) {
        if let Some(map) = self.effects.get_mut(&id) {
            map.remove(&effect);
        }
    }

    fn damage(&mut self, id: EntityId, amount: f32) {
        *self.damage.entry(id).or_insert(0.0) += amount;
    }

    fn movement_speed(&self, id: EntityId) -> Option<f32> {
        Some(
            self.speeds
                .get(&id)
                .copied()
                .unwrap_or(DEFAULT_MOVEMENT_SPEED),
        )
    }

    fn set_movement_speed(&mut self, id: EntityId, speed: f32) {
        self.speeds.insert(id, speed);
    }

    fn wear_insulation(&mut self, id: EntityId, units: u32) -> InsulationWear {
        let left = self.insulation.entry(id).or_insert(INSULATION_DURABILITY);
        *left = left.saturating_sub(units);
        if *left == 0 {
            InsulationWear::Broken
        } else {
            InsulationWear::Intact
        }
    }
}

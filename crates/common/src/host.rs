//! Host-facing traits: everything the simulation reads from or writes to the
//! surrounding game world goes through these.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::block::{BlockState, Material};
use crate::types::{BlockPos, ChunkPos, EntityId};

/// Read/write access to world blocks.
///
/// Queries against unloaded cells report absence (`None`, `false`, empty)
/// rather than failing.
pub trait BlockAccess {
    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool;

    /// Block at `pos`, or `None` if its cell is not loaded or `pos` is out of range.
    fn block(&self, pos: BlockPos) -> Option<BlockState>;

    fn set_material(&mut self, pos: BlockPos, material: Material);

    /// Block light level (0..=15) at `pos`.
    fn block_light(&self, pos: BlockPos) -> u8;

    /// Y of the highest non-air block in the column, if the column is loaded.
    fn highest_block_y(&self, x: i32, z: i32) -> Option<i32>;

    /// Vertical build range as `(min_y, max_y)`, `max_y` exclusive.
    fn height_range(&self) -> (i32, i32);

    fn sea_level(&self) -> i32 {
        63
    }

    /// Positions of tile-entity blocks (campfires, furnaces) in a loaded cell.
    fn tile_entities(&self, chunk: ChunkPos) -> Vec<BlockPos>;

    fn material(&self, pos: BlockPos) -> Option<Material> {
        self.block(pos).map(|b| b.material)
    }

    fn is_water(&self, pos: BlockPos) -> bool {
        self.material(pos).is_some_and(Material::is_water)
    }

    /// True when nothing above `pos` covers the sky. Light obstructions
    /// (leaves, carpets, snow layers, fences, doors, slabs, stairs, walls) are
    /// looked through.
    fn is_open_to_sky(&self, pos: BlockPos) -> bool {
        let (_, max_y) = self.height_range();
        ((pos.y + 1)..max_y).all(|y| {
            self.material(BlockPos::new(pos.x, y, pos.z))
                .is_none_or(Material::is_sky_transparent)
        })
    }
}

/// Graded status effects the freeze machine applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusEffect {
    Slowness,
    Hunger,
    MiningFatigue,
    Weakness,
    Blindness,
}

impl StatusEffect {
    pub const ALL: [StatusEffect; 5] = [
        StatusEffect::Slowness,
        StatusEffect::Hunger,
        StatusEffect::MiningFatigue,
        StatusEffect::Weakness,
        StatusEffect::Blindness,
    ];
}

/// Outcome of wearing down an insulating item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsulationWear {
    Intact,
    Broken,
}

/// Effects applied to tracked entities.
pub trait EffectSink {
    /// Apply (or refresh) an effect at the given amplifier level, 1-based.
    fn apply_effect(&mut self, id: EntityId, effect: StatusEffect, level: u8);

    fn remove_effect(&mut self, id: EntityId, effect: StatusEffect);

    fn damage(&mut self, id: EntityId, amount: f32);

    fn movement_speed(&self, id: EntityId) -> Option<f32>;

    fn set_movement_speed(&mut self, id: EntityId, speed: f32);

    /// Wear the entity's insulating item by `units` of durability.
    fn wear_insulation(&mut self, id: EntityId, units: u32) -> InsulationWear;

    fn clear_effects(&mut self, id: EntityId) {
        for effect in StatusEffect::ALL {
            self.remove_effect(id, effect);
        }
    }
}

/// Everything the simulation needs from its host in one bound.
pub trait Host: BlockAccess + EffectSink {}

impl<T: BlockAccess + EffectSink> Host for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    Survival,
    Adventure,
    Creative,
    Spectator,
}

impl GameMode {
    /// Creative and spectator players are never frozen.
    pub fn is_immune(self) -> bool {
        matches!(self, GameMode::Creative | GameMode::Spectator)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player(GameMode),
    Villager,
    /// Cows, pigs and similar farm animals.
    Livestock,
}

/// An entity the host asks the simulation to track this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedEntity {
    pub id: EntityId,
    pub position: Vec3,
    pub kind: EntityKind,
    /// Whether an insulating item (heated hat) is currently worn.
    pub insulated: bool,
}

impl TrackedEntity {
    pub fn player(id: EntityId, position: Vec3) -> Self {
        Self {
            id,
            position,
            kind: EntityKind::Player(GameMode::Survival),
            insulated: false,
        }
    }

    pub fn block_pos(&self) -> BlockPos {
        BlockPos::from_vec3(self.position)
    }
}

//! Shared types for the cold hazard engine: coordinates, materials, global
//! stage, and the host traits every other crate talks through.
//!
//! # Invariants
//! - Block coordinates are integers; continuous positions are floored.
//! - Host queries never fail: unloaded or missing data reads as absent.

mod block;
mod host;
mod sandbox;
mod stage;
mod types;

pub use block::{BlockState, Material};
pub use host::{
    BlockAccess, EffectSink, EntityKind, GameMode, Host, InsulationWear, StatusEffect,
    TrackedEntity,
};
pub use sandbox::{DEFAULT_MOVEMENT_SPEED, INSULATION_DURABILITY, Sandbox};
pub use stage::{GlobalStage, MAX_GLOBAL_STAGE, StageError};
pub use types::{BlockPos, CHUNK_SIZE, COLUMNS_PER_CHUNK, ChunkPos, EntityId};

pub fn crate_info() -> &'static str {
    "greatcold-common v0.1.0"
}

use serde::{Deserialize, Serialize};

/// Block materials the hazard simulation cares about.
///
/// Anything the host knows that has no special meaning here maps to
/// [`Material::Solid`] (opaque, not passable) or [`Material::Air`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Air,
    Solid,
    Stone,
    Dirt,
    Water,
    Lava,
    MagmaBlock,
    Fire,
    Campfire,
    SoulCampfire,
    Furnace,
    BlastFurnace,
    Smoker,
    /// Thin snow layer.
    Snow,
    SnowBlock,
    Ice,
    Leaves,
    Carpet,
    Fence,
    FenceGate,
    Door,
    Slab,
    Stairs,
    Wall,
    CoalBlock,
    Shroomlight,
    SeaLantern,
    DarkPrismarine,
}

impl Material {
    /// Liquid water.
    pub fn is_water(self) -> bool {
        matches!(self, Material::Water)
    }

    /// Materials that never count as covering the sky.
    pub fn is_sky_transparent(self) -> bool {
        matches!(
            self,
            Material::Air
                | Material::Leaves
                | Material::Carpet
                | Material::Snow
                | Material::Fence
                | Material::FenceGate
                | Material::Door
                | Material::Slab
                | Material::Stairs
                | Material::Wall
        )
    }

    /// What a meltable material becomes after melting.
    pub fn melted(self) -> Option<Material> {
        match self {
            Material::Snow | Material::SnowBlock => Some(Material::Air),
            Material::Ice => Some(Material::Water),
            _ => None,
        }
    }

    /// Whether a melt flood-fill may pass through this block.
    pub fn is_passable(self) -> bool {
        matches!(
            self,
            Material::Air
                | Material::Water
                | Material::Fire
                | Material::Snow
                | Material::SnowBlock
                | Material::Ice
                | Material::Carpet
                | Material::Leaves
        )
    }

    /// Blocks that carry a tile entity (inspected by the cheap area-load pass).
    pub fn has_tile_entity(self) -> bool {
        matches!(
            self,
            Material::Campfire
                | Material::SoulCampfire
                | Material::Furnace
                | Material::BlastFurnace
                | Material::Smoker
        )
    }
}

/// Snapshot of one block as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    pub material: Material,
    /// Lit flag for campfires.
    pub lit: bool,
    /// Remaining furnace burn time in ticks.
    pub burn_time: u32,
}

impl BlockState {
    pub const AIR: BlockState = BlockState::of(Material::Air);

    pub const fn of(material: Material) -> Self {
        Self {
            material,
            lit: false,
            burn_time: 0,
        }
    }

    pub const fn lit(material: Material) -> Self {
        Self {
            material,
            lit: true,
            burn_time: 0,
        }
    }

    pub const fn burning(material: Material, burn_time: u32) -> Self {
        Self {
            material,
            lit: false,
            burn_time,
        }
    }
}

impl From<Material> for BlockState {
    fn from(material: Material) -> Self {
        BlockState::of(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snow_melts_to_air_and_ice_to_water() {
        assert_eq!(Material::Snow.melted(), Some(Material::Air));
        assert_eq!(Material::SnowBlock.melted(), Some(Material::Air));
        assert_eq!(Material::Ice.melted(), Some(Material::Water));
        assert_eq!(Material::Stone.melted(), None);
    }

    #[test]
    fn light_obstructions_do_not_cover_sky() {
        assert!(Material::Leaves.is_sky_transparent());
        assert!(Material::Snow.is_sky_transparent());
        assert!(!Material::SnowBlock.is_sky_transparent());
        assert!(!Material::Stone.is_sky_transparent());
    }
}

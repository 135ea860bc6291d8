use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width of a grid cell ("chunk") in blocks along X and Z.
pub const CHUNK_SIZE: i32 = 16;

/// Unique identifier for a tracked entity (player, villager, livestock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer block coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Snap a continuous position to the block containing it.
    pub fn from_vec3(pos: Vec3) -> Self {
        Self {
            x: pos.x.floor() as i32,
            y: pos.y.floor() as i32,
            z: pos.z.floor() as i32,
        }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn up(self) -> Self {
        self.offset(0, 1, 0)
    }

    /// Grid cell containing this block.
    pub fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x.div_euclid(CHUNK_SIZE), self.z.div_euclid(CHUNK_SIZE))
    }

    /// Chebyshev (cube) distance: `max(|dx|, |dy|, |dz|)`.
    pub fn chebyshev(self, other: BlockPos) -> i32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        let dz = (self.z - other.z).abs();
        dx.max(dy).max(dz)
    }

    /// The six face-adjacent neighbours.
    pub fn neighbors(self) -> [BlockPos; 6] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 1, 0),
            self.offset(0, -1, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A 2D grid cell coordinate (16x16 column, full vertical extent).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// World X of the cell's first column.
    pub fn min_block_x(self) -> i32 {
        self.x * CHUNK_SIZE
    }

    /// World Z of the cell's first column.
    pub fn min_block_z(self) -> i32 {
        self.z * CHUNK_SIZE
    }

    /// World (x, z) of the column with the given local index (0..256, x-major).
    pub fn column(self, index: u16) -> (i32, i32) {
        let lx = (index as i32) / CHUNK_SIZE;
        let lz = (index as i32) % CHUNK_SIZE;
        (self.min_block_x() + lx, self.min_block_z() + lz)
    }

    /// All cells within a square radius of this one, including itself.
    pub fn square(self, radius: i32) -> impl Iterator<Item = ChunkPos> {
        (-radius..=radius)
            .flat_map(move |dx| (-radius..=radius).map(move |dz| ChunkPos::new(self.x + dx, self.z + dz)))
    }
}

impl std::fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Number of columns in one cell.
pub const COLUMNS_PER_CHUNK: u16 = (CHUNK_SIZE * CHUNK_SIZE) as u16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_uniqueness() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn block_pos_snaps_negative_coordinates_down() {
        let p = BlockPos::from_vec3(Vec3::new(-0.5, 64.9, 3.2));
        assert_eq!(p, BlockPos::new(-1, 64, 3));
    }

    #[test]
    fn chunk_of_block_uses_floor_division() {
        assert_eq!(BlockPos::new(15, 0, 0).chunk(), ChunkPos::new(0, 0));
        assert_eq!(BlockPos::new(16, 0, -1).chunk(), ChunkPos::new(1, -1));
        assert_eq!(BlockPos::new(-17, 0, -16).chunk(), ChunkPos::new(-2, -1));
    }

    #[test]
    fn chebyshev_is_max_axis_distance() {
        let a = BlockPos::new(0, 0, 0);
        assert_eq!(a.chebyshev(BlockPos::new(3, -7, 2)), 7);
        assert_eq!(a.chebyshev(a), 0);
    }

    #[test]
    fn column_index_covers_the_cell() {
        let c = ChunkPos::new(-1, 2);
        assert_eq!(c.column(0), (-16, 32));
        assert_eq!(c.column(COLUMNS_PER_CHUNK - 1), (-1, 47));
    }

    #[test]
    fn square_neighbourhood_has_nine_cells() {
        let cells: Vec<_> = ChunkPos::new(0, 0).square(1).collect();
        assert_eq!(cells.len(), 9);
        assert!(cells.contains(&ChunkPos::new(-1, 1)));
    }
}

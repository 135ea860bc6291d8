use std::collections::{HashSet, VecDeque};

use greatcold_common::{BlockAccess, BlockPos};

/// Columns probed by the fallback scan reach this far below the surface.
const COLUMN_PROBE_DEPTH: i32 = 64;

/// Result of one melt run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeltOutcome {
    pub melted: usize,
    pub visited: usize,
    /// Whether the columnar fallback ran.
    pub fallback: bool,
}

/// Bounded snow/ice removal around a heater.
///
/// A breadth-first flood from the anchor visits the 6-connected lattice inside
/// the heater's cube, only through loaded, passable blocks. If the visit cap
/// runs out before the melt cap, a top-down column scan over the same cube
/// spends what is left of the melt budget.
#[derive(Debug, Clone, Copy)]
pub struct TerrainMelter {
    pub max_melts: usize,
    pub node_cap: usize,
}

impl TerrainMelter {
    pub fn new(max_melts: usize, node_cap: usize) -> Self {
        Self {
            max_melts,
            node_cap,
        }
    }

    pub fn melt_around(
        &self,
        host: &mut impl BlockAccess,
        anchor: BlockPos,
        radius: i32,
    ) -> MeltOutcome {
        let mut out = MeltOutcome::default();
        if self.max_melts == 0 {
            return out;
        }

        let mut seen: HashSet<BlockPos> = HashSet::new();
        let mut queue: VecDeque<BlockPos> = VecDeque::new();
        // The anchor is the heater block itself; start from its neighbours.
        seen.insert(anchor);
        for n in anchor.neighbors() {
            if seen.insert(n) {
                queue.push_back(n);
            }
        }

        while let Some(pos) = queue.pop_front() {
            if out.visited >= self.node_cap || out.melted >= self.max_melts {
                break;
            }
            out.visited += 1;
            let Some(state) = host.block(pos) else {
                continue;
            };
            if !state.material.is_passable() {
                continue;
            }
            if let Some(melted) = state.material.melted() {
                host.set_material(pos, melted);
                out.melted += 1;
            }
            for n in pos.neighbors() {
                if anchor.chebyshev(n) <= radius && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }

        let cap_hit = out.visited >= self.node_cap && !queue.is_empty();
        if cap_hit && out.melted < self.max_melts {
            out.fallback = true;
            out.melted += self.melt_columns(host, anchor, radius, self.max_melts - out.melted);
        }
        if out.melted > 0 {
            tracing::trace!(
                %anchor,
                melted = out.melted,
                visited = out.visited,
                fallback = out.fallback,
                "melt run"
            );
        }
        out
    }

    /// Melt the first snow or ice found in the top of each column of the cube.
    fn melt_columns(
        &self,
        host: &mut impl BlockAccess,
        anchor: BlockPos,
        radius: i32,
        budget: usize,
    ) -> usize {
        let (min_world_y, _) = host.height_range();
        let bottom = (anchor.y - radius).max(min_world_y);
        let mut melted = 0;
        for x in (anchor.x - radius)..=(anchor.x + radius) {
            for z in (anchor.z - radius)..=(anchor.z + radius) {
                if melted >= budget {
                    return melted;
                }
                let Some(top) = host.highest_block_y(x, z) else {
                    continue;
                };
                let top = top.min(anchor.y + radius);
                let from = (top - COLUMN_PROBE_DEPTH).max(bottom);
                for y in (from..=top).rev() {
                    let pos = BlockPos::new(x, y, z);
                    let Some(target) = host.material(pos).and_then(|m| m.melted()) else {
                        continue;
                    };
                    host.set_material(pos, target);
                    melted += 1;
                    break;
                }
            }
        }
        melted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greatcold_common::{ChunkPos, Material, Sandbox};

    fn snowy_field() -> Sandbox {
        let mut sb = Sandbox::default();
        sb.load_area(ChunkPos::new(0, 0), 2);
        sb.fill(BlockPos::new(-20, 60, -20), BlockPos::new(20, 63, 20), Material::Stone);
        sb.fill(BlockPos::new(-20, 64, -20), BlockPos::new(20, 64, 20), Material::Snow);
        sb
    }

    #[test]
    fn melts_snow_and_ice_inside_cube_only() {
        let mut sb = snowy_field();
        let anchor = BlockPos::new(0, 64, 0);
        sb.set_block(anchor, Material::CoalBlock);
        sb.set_block(BlockPos::new(2, 64, 0), Material::Ice);

        let out = TerrainMelter::new(1_000, 10_000).melt_around(&mut sb, anchor, 2);
        assert!(!out.fallback);
        // 5x5 layer minus the heater block itself.
        assert_eq!(out.melted, 24);
        assert_eq!(sb.material(BlockPos::new(2, 64, 0)), Some(Material::Water));
        assert_eq!(sb.material(BlockPos::new(1, 64, 1)), Some(Material::Air));
        assert_eq!(sb.material(BlockPos::new(3, 64, 0)), Some(Material::Snow));
    }

    #[test]
    fn melt_cap_bounds_each_run() {
        let mut sb = snowy_field();
        let anchor = BlockPos::new(0, 65, 0);
        let out = TerrainMelter::new(64, 10_000).melt_around(&mut sb, anchor, 8);
        assert_eq!(out.melted, 64);
        assert_eq!(sb.count_material(Material::Snow), 41 * 41 - 64);
    }

    #[test]
    fn solid_walls_stop_the_flood() {
        let mut sb = snowy_field();
        let anchor = BlockPos::new(0, 65, 0);
        // Enclose the heater in stone: nothing passable to expand into.
        for n in anchor.neighbors() {
            sb.set_block(n, Material::Stone);
        }
        let out = TerrainMelter::new(64, 10_000).melt_around(&mut sb, anchor, 4);
        assert_eq!(out.melted, 0);
        assert_eq!(out.visited, 6);
    }

    #[test]
    fn node_cap_falls_back_to_columns() {
        let mut sb = snowy_field();
        let anchor = BlockPos::new(0, 70, 0);
        let out = TerrainMelter::new(10, 5).melt_around(&mut sb, anchor, 8);
        assert!(out.fallback);
        assert_eq!(out.melted, 10);
        assert_eq!(sb.count_material(Material::Snow), 41 * 41 - 10);
    }

    #[test]
    fn unloaded_cells_are_skipped() {
        let mut sb = snowy_field();
        sb.unload_chunk(ChunkPos::new(0, 0));
        let anchor = BlockPos::new(8, 65, 8);
        let out = TerrainMelter::new(64, 10_000).melt_around(&mut sb, anchor, 3);
        assert_eq!(out.melted, 0);
    }
}

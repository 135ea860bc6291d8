use std::collections::{BTreeMap, HashMap};

use greatcold_common::{BlockPos, CHUNK_SIZE, ChunkPos};

/// An immutable heated cube around an anchor block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatRegion<K> {
    pub anchor: BlockPos,
    pub kind: K,
    pub radius: i32,
}

impl<K> HeatRegion<K> {
    pub fn new(anchor: BlockPos, kind: K, radius: i32) -> Self {
        Self {
            anchor,
            kind,
            radius: radius.max(0),
        }
    }

    /// Chebyshev cube test: `max(|dx|, |dy|, |dz|) <= radius`.
    pub fn contains(&self, pos: BlockPos) -> bool {
        self.anchor.chebyshev(pos) <= self.radius
    }
}

/// Cell-bucketed index of heat regions.
///
/// Regions live under the cell of their anchor. A point query consults every
/// cell within `ceil(max_radius / 16)` (at least 1) cells, so a region whose
/// cube straddles a cell boundary is always found.
#[derive(Debug, Clone)]
pub struct SpatialIndex<K> {
    cells: HashMap<ChunkPos, BTreeMap<BlockPos, HeatRegion<K>>>,
    /// Registered radius -> number of regions using it.
    radii: BTreeMap<i32, usize>,
    len: usize,
}

impl<K> Default for SpatialIndex<K> {
    fn default() -> Self {
        Self {
            cells: HashMap::new(),
            radii: BTreeMap::new(),
            len: 0,
        }
    }
}

impl<K: Copy> SpatialIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a region, replacing any region anchored at the same block.
    pub fn register(&mut self, region: HeatRegion<K>) -> Option<HeatRegion<K>> {
        let replaced = self
            .cells
            .entry(region.anchor.chunk())
            .or_default()
            .insert(region.anchor, region);
        match replaced {
            Some(old) => self.forget_radius(old.radius),
            None => self.len += 1,
        }
        *self.radii.entry(region.radius).or_insert(0) += 1;
        replaced
    }

    pub fn unregister(&mut self, anchor: BlockPos) -> Option<HeatRegion<K>> {
        let chunk = anchor.chunk();
        let cell = self.cells.get_mut(&chunk)?;
        let removed = cell.remove(&anchor)?;
        if cell.is_empty() {
            self.cells.remove(&chunk);
        }
        self.len -= 1;
        self.forget_radius(removed.radius);
        Some(removed)
    }

    /// Drop every region anchored in `chunk`.
    pub fn remove_chunk(&mut self, chunk: ChunkPos) -> Vec<HeatRegion<K>> {
        let Some(cell) = self.cells.remove(&chunk) else {
            return Vec::new();
        };
        let removed: Vec<_> = cell.into_values().collect();
        for region in &removed {
            self.len -= 1;
            self.forget_radius(region.radius);
        }
        removed
    }

    pub fn get(&self, anchor: BlockPos) -> Option<&HeatRegion<K>> {
        self.cells.get(&anchor.chunk())?.get(&anchor)
    }

    /// Whether any registered region covers `pos`.
    pub fn contains(&self, pos: BlockPos) -> bool {
        self.regions_near(pos).any(|r| r.contains(pos))
    }

    /// Candidate regions whose cubes could reach `pos`.
    pub fn regions_near(&self, pos: BlockPos) -> impl Iterator<Item = &HeatRegion<K>> {
        pos.chunk()
            .square(self.search_radius())
            .filter_map(|c| self.cells.get(&c))
            .flat_map(|cell| cell.values())
    }

    /// Regions anchored in `chunk`, in anchor order.
    pub fn regions_in_chunk(&self, chunk: ChunkPos) -> impl Iterator<Item = &HeatRegion<K>> {
        self.cells.get(&chunk).into_iter().flat_map(|c| c.values())
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeatRegion<K>> {
        self.cells.values().flat_map(|c| c.values())
    }

    /// Largest radius currently registered.
    pub fn max_radius(&self) -> i32 {
        self.radii.keys().next_back().copied().unwrap_or(0)
    }

    /// Neighbouring-cell radius consulted by point queries.
    pub fn search_radius(&self) -> i32 {
        let r = self.max_radius();
        ((r + CHUNK_SIZE - 1) / CHUNK_SIZE).max(1)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.radii.clear();
        self.len = 0;
    }

    fn forget_radius(&mut self, radius: i32) {
        if let Some(n) = self.radii.get_mut(&radius) {
            *n -= 1;
            if *n == 0 {
                self.radii.remove(&radius);
            }
        }
    }
}

use std::collections::{HashMap, VecDeque};

use greatcold_common::{COLUMNS_PER_CHUNK, ChunkPos};
use serde::{Deserialize, Serialize};

/// Background scan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum number of columns scanned per tick across all pending cells.
    pub columns_per_tick: usize,
    /// How far below the surface the cheap area-load probe looks.
    pub surface_probe_depth: i32,
    /// Full scans stop this far above sea level.
    pub scan_height_above_sea: i32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            columns_per_tick: 64,
            surface_probe_depth: 64,
            scan_height_above_sea: 256,
        }
    }
}

/// Per-tick scan statistics for instrumentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStats {
    pub columns_this_tick: usize,
    pub completed_this_tick: usize,
    pub pending_cells: usize,
}

/// Cooperative full-column scan queue.
///
/// Each pending cell keeps a column cursor. `next_batch` hands out at most
/// `columns_per_tick` columns, oldest cell first; cells are dropped when their
/// last column is handed out or when cancelled.
#[derive(Debug, Default)]
pub struct ScanScheduler {
    pub config: ScanConfig,
    queue: VecDeque<ChunkPos>,
    cursors: HashMap<ChunkPos, u16>,
    stats: ScanStats,
}

impl ScanScheduler {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Queue a full scan of `chunk`, restarting it if already pending.
    pub fn enqueue(&mut self, chunk: ChunkPos) {
        if self.cursors.insert(chunk, 0).is_none() {
            self.queue.push_back(chunk);
        }
    }

    /// Stop scanning `chunk`. Returns whether a scan was pending.
    pub fn cancel(&mut self, chunk: ChunkPos) -> bool {
        if self.cursors.remove(&chunk).is_some() {
            self.queue.retain(|c| *c != chunk);
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self, chunk: ChunkPos) -> bool {
        self.cursors.contains_key(&chunk)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Take the next budgeted slice of columns as `(cell, column index)` pairs.
    pub fn next_batch(&mut self) -> Vec<(ChunkPos, u16)> {
        let budget = self.config.columns_per_tick;
        let mut batch = Vec::with_capacity(budget.min(COLUMNS_PER_CHUNK as usize));
        let mut completed = 0;

        while batch.len() < budget {
            let Some(&chunk) = self.queue.front() else {
                break;
            };
            let Some(cursor) = self.cursors.get_mut(&chunk) else {
                self.queue.pop_front();
                continue;
            };
            let take = (budget - batch.len()).min((COLUMNS_PER_CHUNK - *cursor) as usize) as u16;
            batch.extend((*cursor..*cursor + take).map(|col| (chunk, col)));
            *cursor += take;
            if *cursor >= COLUMNS_PER_CHUNK {
                self.cursors.remove(&chunk);
                self.queue.pop_front();
                completed += 1;
                tracing::debug!(?chunk, "full scan complete");
            }
        }

        self.stats = ScanStats {
            columns_this_tick: batch.len(),
            completed_this_tick: completed,
            pending_cells: self.queue.len(),
        };
        batch
    }

    /// Statistics from the last batch.
    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }
}

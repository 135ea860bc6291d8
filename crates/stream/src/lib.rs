//! Spatial heat lookup and natural heat discovery.
//!
//! # Invariants
//! - A heat region is found by any point query inside its cube, regardless of
//!   which cell its anchor lives in.
//! - Background scans never exceed their per-tick column budget and stop when
//!   their cell unloads.
//! - Natural regions are derived from loaded blocks only; nothing here is persisted.

mod budget;
mod grid;
mod natural;

pub use budget::{ScanConfig, ScanScheduler, ScanStats};
pub use grid::{HeatRegion, SpatialIndex};
pub use natural::{NaturalHeatRegistry, NaturalKind, NaturalRadii, provides_heat};

pub fn crate_info() -> &'static str {
    "greatcold-stream v0.1.0"
}

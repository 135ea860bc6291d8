//! Developer tooling: read-only inspection of a running simulation.
//!
//! # Invariants
//! - Nothing here mutates simulation state.

mod inspector;

pub use inspector::{EntityFreezeInfo, HeaterInfo, SimInspector, SimSummary};

pub fn crate_info() -> &'static str {
    "greatcold-tools v0.1.0"
}

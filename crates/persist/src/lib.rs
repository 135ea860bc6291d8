//! Persistence for simulation state: hashed snapshots kept in memory or in a
//! compressed, hash-chained directory.
//!
//! # Invariants
//! - Every snapshot carries a content hash checked before its state is used.
//! - Schema mismatches and integrity failures refuse to load; nothing is
//!   silently repaired.
//! - Only the newest snapshots are retained; the hash chain stays verifiable
//!   across pruning.

pub mod snapshot;
pub mod store;

pub use snapshot::{Snapshot, SnapshotStore};
pub use store::{ColdStore, DEFAULT_RETENTION, IntegrityManifest, ManifestEntry, StoreError, StoreMeta};

pub fn crate_info() -> &'static str {
    "greatcold-persist v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("persist"));
    }
}

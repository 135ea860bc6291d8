//! File-backed simulation persistence.
//!
//! Layout inside the store directory:
//! ```text
//! state.meta.json              - schema version, world, snapshot counter
//! snapshots/
//!   000001.snapshot.cbor.zst   - CBOR+zstd compressed snapshots
//! integrity/
//!   manifest.json              - hash chain over retained snapshots
//! ```

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use greatcold_kernel::{PersistError, PersistenceSink, SavedState};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::snapshot::Snapshot;

const STATE_SCHEMA_VERSION: u32 = 1;
const META_FILE: &str = "state.meta.json";
const SNAPSHOT_DIR: &str = "snapshots";
const MANIFEST_PATH: [&str; 2] = ["integrity", "manifest.json"];

/// Snapshots kept on disk unless configured otherwise.
pub const DEFAULT_RETENTION: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub schema_version: u32,
    /// World of the last saved state; empty until the first save.
    pub world: String,
    /// Snapshots ever written; the newest file carries this number.
    pub snapshot_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Hash chain over retained snapshot files, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityManifest {
    /// Hash of the newest pruned file; the first retained entry links to it.
    pub pruned_head: Option<String>,
    pub entries: Vec<ManifestEntry>,
}

/// Directory store keeping the newest `retention` snapshots.
#[derive(Debug)]
pub struct ColdStore {
    root: PathBuf,
    meta: StoreMeta,
    manifest: IntegrityManifest,
    retention: usize,
}

impl ColdStore {
    /// Open or create a store. Refuses stores written with another schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(SNAPSHOT_DIR))?;
        std::fs::create_dir_all(root.join(MANIFEST_PATH[0]))?;

        let meta_path = root.join(META_FILE);
        let manifest_path = root.join(MANIFEST_PATH[0]).join(MANIFEST_PATH[1]);

        let (meta, manifest) = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.schema_version != STATE_SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: STATE_SCHEMA_VERSION,
                });
            }
            let manifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (meta, manifest)
        } else {
            let meta = StoreMeta {
                schema_version: STATE_SCHEMA_VERSION,
                world: String::new(),
                snapshot_count: 0,
            };
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            (meta, manifest)
        };

        tracing::debug!(root = %root.display(), snapshots = meta.snapshot_count, "store opened");
        Ok(Self {
            root,
            meta,
            manifest,
            retention: DEFAULT_RETENTION,
        })
    }

    /// Keep at most `retention` snapshots (at least one).
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    pub fn manifest(&self) -> &IntegrityManifest {
        &self.manifest
    }

    /// File names of the retained snapshots, oldest first.
    pub fn snapshot_files(&self) -> Vec<&str> {
        self.manifest
            .entries
            .iter()
            .map(|e| e.filename.as_str())
            .collect()
    }

    /// Write a snapshot of `state`. Returns its number.
    pub fn save_state(&mut self, state: &SavedState) -> Result<u32, StoreError> {
        let snap = Snapshot::capture(state);
        let index = self.meta.snapshot_count + 1;
        let filename = snapshot_name(index);

        let compressed = zstd_compress(&cbor_serialize(&snap)?)?;
        let hash = sha256_hex(&compressed);
        let prev_hash = self
            .manifest
            .entries
            .last()
            .map(|e| e.sha256.clone())
            .or_else(|| self.manifest.pruned_head.clone());

        std::fs::write(self.root.join(SNAPSHOT_DIR).join(&filename), &compressed)?;
        self.manifest.entries.push(ManifestEntry {
            filename,
            sha256: hash,
            prev_hash,
        });
        self.meta.snapshot_count = index;
        self.meta.world.clone_from(&state.world);

        self.prune()?;
        self.save_manifest()?;
        self.save_meta()?;
        tracing::debug!(index, tick = state.tick, bytes = compressed.len(), "snapshot written");
        Ok(index)
    }

    /// Newest snapshot's state, or `None` for an empty store.
    pub fn load_latest(&self) -> Result<Option<SavedState>, StoreError> {
        let Some(entry) = self.manifest.entries.last() else {
            return Ok(None);
        };
        let compressed = std::fs::read(self.root.join(SNAPSHOT_DIR).join(&entry.filename))?;
        check_hash(entry, &compressed)?;

        let snap: Snapshot = cbor_deserialize(&zstd_decompress(&compressed)?)?;
        if !snap.verify() {
            return Err(StoreError::IntegrityMismatch {
                file: entry.filename.clone(),
                expected: "valid content hash".into(),
                actual: "content hash mismatch".into(),
            });
        }
        Ok(Some(snap.state))
    }

    /// Walk the hash chain and re-hash every retained file.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        let mut prev = self.manifest.pruned_head.clone();
        for entry in &self.manifest.entries {
            if entry.prev_hash != prev {
                return Err(StoreError::IntegrityMismatch {
                    file: entry.filename.clone(),
                    expected: prev.unwrap_or_else(|| "None".into()),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }
            let data = std::fs::read(self.root.join(SNAPSHOT_DIR).join(&entry.filename))?;
            check_hash(entry, &data)?;
            prev = Some(entry.sha256.clone());
        }
        Ok(())
    }

    fn prune(&mut self) -> Result<(), StoreError> {
        while self.manifest.entries.len() > self.retention {
            let old = self.manifest.entries.remove(0);
            let path = self.root.join(SNAPSHOT_DIR).join(&old.filename);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            tracing::trace!(file = %old.filename, "snapshot pruned");
            self.manifest.pruned_head = Some(old.sha256);
        }
        Ok(())
    }

    fn save_meta(&self) -> Result<(), StoreError> {
        let path = self.root.join(META_FILE);
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), StoreError> {
        let path = self.root.join(MANIFEST_PATH[0]).join(MANIFEST_PATH[1]);
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.manifest)?;
        Ok(())
    }
}

impl PersistenceSink for ColdStore {
    fn save(&mut self, state: &SavedState) -> Result<(), PersistError> {
        self.save_state(state)
            .map(|_| ())
            .map_err(|e| PersistError::Backend(e.to_string()))
    }

    fn load(&mut self) -> Result<Option<SavedState>, PersistError> {
        self.load_latest()
            .map_err(|e| PersistError::Backend(e.to_string()))
    }
}

fn snapshot_name(index: u32) -> String {
    format!("{index:06}.snapshot.cbor.zst")
}

fn check_hash(entry: &ManifestEntry, data: &[u8]) -> Result<(), StoreError> {
    let actual = sha256_hex(data);
    if actual != entry.sha256 {
        return Err(StoreError::IntegrityMismatch {
            file: entry.filename.clone(),
            expected: entry.sha256.clone(),
            actual,
        });
    }
    Ok(())
}

fn cbor_serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StoreError> {
    ciborium::from_reader(data).map_err(|e| StoreError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

//! Content-addressed binary store.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::{StorageError, StorageResult};

/// SHA-256 hex digest identifying a stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    /// Compute the id of `data`.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a stored id, rejecting anything that is not 64 hex digits.
    pub fn parse(s: &str) -> Option<Self> {
        (s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| Self(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binary payloads keyed by content hash.
///
/// Persisted records (jobs, history) hold only a [`BlobId`]. With a
/// directory the payloads live on disk as `<id>.bin`, survive restarts and
/// are read back on every [`get`](Self::get) without being kept in memory.
/// Without one the store is memory only.
#[derive(Debug, Default)]
pub struct BlobStore {
    memory: Mutex<HashMap<BlobId, Arc<Vec<u8>>>>,
    dir: Option<PathBuf>,
}

impl BlobStore {
    /// Memory-only store.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by `dir`, created if missing.
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::io(format!("creating {}", dir.display()), e))?;
        Ok(Self {
            memory: Mutex::new(HashMap::new()),
            dir: Some(dir),
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn path_for(&self, id: &BlobId) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.bin", id)))
    }

    /// Store `data` and return its id. Identical payloads share one entry.
    pub fn put(&self, data: Vec<u8>) -> StorageResult<BlobId> {
        let id = BlobId::of(&data);
        tracing::debug!(blob = %id, size = data.len(), "Storing blob");

        match self.path_for(&id) {
            Some(path) if path.is_file() => {}
            Some(path) => {
                let temp = path.with_extension("bin.tmp");
                fs::write(&temp, &data)
                    .map_err(|e| StorageError::io(format!("writing {}", temp.display()), e))?;
                fs::rename(&temp, &path)
                    .map_err(|e| StorageError::io(format!("renaming {}", path.display()), e))?;
            }
            None => {
                self.memory
                    .lock()
                    .entry(id.clone())
                    .or_insert_with(|| Arc::new(data));
            }
        }
        Ok(id)
    }

    /// Fetch a payload. Disk-backed stores read the file on every call.
    pub fn get(&self, id: &BlobId) -> StorageResult<Arc<Vec<u8>>> {
        let Some(path) = self.path_for(id) else {
            return self
                .memory
                .lock()
                .get(id)
                .cloned()
                .ok_or_else(|| StorageError::BlobMissing(id.clone()));
        };
        match fs::read(&path) {
            Ok(data) => Ok(Arc::new(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::BlobMissing(id.clone()))
            }
            Err(e) => Err(StorageError::io(format!("reading {}", path.display()), e)),
        }
    }

    pub fn contains(&self, id: &BlobId) -> bool {
        match self.path_for(id) {
            Some(path) => path.is_file(),
            None => self.memory.lock().contains_key(id),
        }
    }

    /// Remove a payload. Returns whether anything was removed.
    pub fn remove(&self, id: &BlobId) -> StorageResult<bool> {
        let Some(path) = self.path_for(id) else {
            return Ok(self.memory.lock().remove(id).is_some());
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(format!("removing {}", path.display()), e)),
        }
    }

    /// Every stored id, sorted.
    pub fn ids(&self) -> Vec<BlobId> {
        let Some(dir) = &self.dir else {
            let ids: BTreeSet<BlobId> = self.memory.lock().keys().cloned().collect();
            return ids.into_iter().collect();
        };
        let mut ids = BTreeSet::new();
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".bin")) else {
                    continue;
                };
                if let Some(id) = BlobId::parse(stem) {
                    ids.insert(id);
                }
            }
        }
        ids.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_payloads_share_an_id() {
        let store = BlobStore::in_memory();
        let a = store.put(b"audio".to_vec()).unwrap();
        let b = store.put(b"audio".to_vec()).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.ids().len(), 1);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn in_memory_round_trip_and_remove() {
        let store = BlobStore::in_memory();
        let id = store.put(vec![1, 2, 3]).unwrap();
        assert!(store.contains(&id));
        assert_eq!(*store.get(&id).unwrap(), vec![1, 2, 3]);

        assert!(store.remove(&id).unwrap());
        assert!(!store.contains(&id));
        assert!(matches!(store.get(&id), Err(StorageError::BlobMissing(_))));
    }

    #[test]
    fn disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = BlobStore::open(dir.path()).unwrap();
            store.put(b"persisted".to_vec()).unwrap()
        };

        let reopened = BlobStore::open(dir.path()).unwrap();
        assert!(reopened.contains(&id));
        assert_eq!(reopened.ids(), vec![id.clone()]);
        assert_eq!(reopened.get(&id).unwrap().as_slice(), b"persisted");
    }

    #[test]
    fn disk_store_reads_files_instead_of_holding_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let id = store.put(b"large video".to_vec()).unwrap();

        let first = store.get(&id).unwrap();
        assert_eq!(Arc::strong_count(&first), 1);
        assert_eq!(first.as_slice(), b"large video");

        fs::remove_file(dir.path().join(format!("{}.bin", id))).unwrap();
        assert!(!store.contains(&id));
        assert!(matches!(store.get(&id), Err(StorageError::BlobMissing(_))));
        assert!(store.ids().is_empty());
    }

    #[test]
    fn parse_rejects_non_digests() {
        assert!(BlobId::parse("abc").is_none());
        assert!(BlobId::parse(&"g".repeat(64)).is_none());
        assert!(BlobId::parse(BlobId::of(b"x").as_str()).is_some());
    }
}

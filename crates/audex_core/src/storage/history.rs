//! History of completed extractions.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::extraction::{OutputFormat, Quality};
use crate::jobs::ResultHandle;

use super::blobs::BlobStore;
use super::errors::{write_atomic, StorageError, StorageResult};

/// One completed extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Name of the source file.
    pub source_name: String,
    /// The extracted audio.
    pub result: ResultHandle,
    pub format: OutputFormat,
    pub quality: Quality,
    /// Output size in bytes.
    pub size: u64,
    /// Wall-clock time spent extracting.
    pub duration_ms: u64,
    /// RFC 3339 completion time.
    pub timestamp: String,
}

impl HistoryRecord {
    pub fn new(
        source_name: impl Into<String>,
        result: ResultHandle,
        format: OutputFormat,
        quality: Quality,
        duration_ms: u64,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            size: result.size,
            result,
            format,
            quality,
            duration_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Sink for history records. One append per completed job.
pub trait HistoryStore: Send + Sync {
    fn append(&self, record: HistoryRecord) -> StorageResult<()>;

    /// All records, oldest first.
    fn records(&self) -> Vec<HistoryRecord>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    records: Vec<HistoryRecord>,
}

/// History persisted to `history.json`.
#[derive(Debug)]
pub struct JsonHistoryStore {
    records: Mutex<Vec<HistoryRecord>>,
    path: Option<PathBuf>,
}

impl JsonHistoryStore {
    /// Load from `path`; a missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = load_records(&path);
        Self {
            records: Mutex::new(records),
            path: Some(path),
        }
    }

    /// History without persistence.
    pub fn in_memory() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            path: None,
        }
    }

    /// Drop records whose result blob is gone. Returns how many were dropped.
    pub fn rehydrate(&self, blobs: &BlobStore) -> StorageResult<usize> {
        let dropped = {
            let mut records = self.records.lock();
            let before = records.len();
            records.retain(|r| blobs.contains(&r.result.blob));
            before - records.len()
        };
        if dropped > 0 {
            tracing::info!("Dropped {} history records with missing audio", dropped);
            self.save()?;
        }
        Ok(dropped)
    }

    fn save(&self) -> StorageResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = HistoryFile {
            version: 1,
            records: self.records.lock().clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| StorageError::encode("history", e))?;
        write_atomic(path, &json)
    }
}

impl HistoryStore for JsonHistoryStore {
    fn append(&self, record: HistoryRecord) -> StorageResult<()> {
        tracing::debug!(source = %record.source_name, "Appending history record");
        self.records.lock().push(record);
        self.save()
    }

    fn records(&self) -> Vec<HistoryRecord> {
        self.records.lock().clone()
    }
}

fn load_records(path: &Path) -> Vec<HistoryRecord> {
    if !path.exists() {
        return Vec::new();
    }
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<HistoryFile>(&content) {
            Ok(file) => {
                tracing::info!("Loaded {} history records", file.records.len());
                file.records
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                Vec::new()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

//! Storage error types.

use std::io;

use thiserror::Error;

use super::blobs::BlobId;

/// Error from the blob store, the history store or job persistence.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    BlobMissing(BlobId),

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create an encoding error.
    pub fn encode(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Encode {
            what: what.into(),
            source,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Write `contents` to `path` through a sibling temp file and a rename.
pub(crate) fn write_atomic(path: &std::path::Path, contents: &str) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::io(format!("creating {}", parent.display()), e))?;
        }
    }
    let temp = path.with_extension("json.tmp");
    std::fs::write(&temp, contents)
        .map_err(|e| StorageError::io(format!("writing {}", temp.display()), e))?;
    std::fs::rename(&temp, path)
        .map_err(|e| StorageError::io(format!("renaming {}", path.display()), e))?;
    Ok(())
}

//! Binary payloads and completed-extraction history.
//!
//! Jobs and history records never embed audio bytes. They hold a
//! [`BlobId`] into the [`BlobStore`], and after a restart the stores are
//! rehydrated: references whose blob is gone are invalidated explicitly.

mod blobs;
mod errors;
mod history;

pub use blobs::{BlobId, BlobStore};
pub use errors::{StorageError, StorageResult};
pub use history::{HistoryRecord, HistoryStore, JsonHistoryStore};

pub(crate) use errors::write_atomic;

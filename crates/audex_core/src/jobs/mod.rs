//! Job registry and queue management.
//!
//! Jobs move through `pending -> processing -> completed | error`. An
//! errored job returns to `pending` only through an explicit retry, which
//! also clears its error and resets progress to 0.
//!
//! [`JobQueue`] is the provided [`JobRegistry`]: an in-memory list with
//! write-through persistence to `queue.json`. Jobs reference their source
//! and result audio by [`BlobId`](crate::storage::BlobId); after a restart
//! [`JobQueue::rehydrate`] fails jobs whose referenced data is gone.

mod key;
mod queue;
mod registry;
mod types;

pub use key::JobSetKey;
pub use queue::JobQueue;
pub use registry::JobRegistry;
pub use types::{Job, JobPatch, JobStatus, NewJob, ResultHandle, SourceHandle};

//! Batch orchestration.
//!
//! The [`BatchOrchestrator`] walks the pending jobs of a [`JobRegistry`]
//! one at a time through the extraction pipeline. Runs are single-flight:
//! an explicit two-state machine ([`BatchState`]) and the pure [`admit`]
//! guard decide whether a run may start, keyed by the [`JobSetKey`] of the
//! job ids present.
//!
//! ```text
//! Idle ──admit: Start──▶ Running ──finished──▶ Idle { last_key }
//!                           │
//!                           └── error / engine lost ──▶ Idle { previous key }
//! ```
//!
//! [`JobRegistry`]: crate::jobs::JobRegistry
//! [`JobSetKey`]: crate::jobs::JobSetKey

mod batch;
mod guard;
mod types;

pub use batch::BatchOrchestrator;
pub use guard::{admit, Admission, BatchState, Trigger};
pub use types::{
    aggregate_progress, BatchError, BatchOutcome, BatchProgress, BatchProgressCallback,
    BatchSummary,
};

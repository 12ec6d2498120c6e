//! Batch run results and errors.

use std::fmt;

use thiserror::Error;

/// Overall signal of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// At least one job completed.
    Advance,
    /// Jobs were dispatched but none completed.
    Failure,
    /// Nothing was dispatched.
    Idle,
}

/// Counts for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Jobs handed to the pipeline.
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Jobs that were pending at the start but not at dispatch time.
    pub skipped: usize,
    /// Jobs left undispatched because the engine was lost.
    pub aborted: usize,
    pub outcome: BatchOutcome,
}

impl BatchSummary {
    pub(crate) fn empty() -> Self {
        Self {
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            aborted: 0,
            outcome: BatchOutcome::Idle,
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.outcome = if self.succeeded > 0 {
            BatchOutcome::Advance
        } else if self.dispatched > 0 {
            BatchOutcome::Failure
        } else {
            BatchOutcome::Idle
        };
        self
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed",
            self.succeeded, self.failed
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.aborted > 0 {
            write!(f, ", {} not started", self.aborted)?;
        }
        Ok(())
    }
}

/// Progress of a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    /// Job currently being extracted.
    pub job_id: String,
    /// Progress of that job in percent.
    pub job_progress: f64,
    /// Run progress in percent.
    pub overall: f64,
}

/// Callback receiving batch progress.
pub type BatchProgressCallback<'a> = &'a (dyn Fn(BatchProgress) + Send + Sync);

/// Why a run did not start or did not finish.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("A batch run is already in progress")]
    AlreadyRunning,

    #[error("These jobs were already processed")]
    AlreadyProcessed,

    #[error("Engine is not ready")]
    EngineNotReady,

    #[error("Engine lost during batch run ({summary})")]
    EngineLost { summary: BatchSummary },
}

/// Aggregate run progress in percent.
///
/// Only `completed` jobs count fully; failed and skipped jobs add nothing.
/// The job in flight counts `current` percent of its `1 / total` share. The
/// result is clamped to [0, 100].
pub fn aggregate_progress(completed: usize, total: usize, current: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let current = if current.is_finite() {
        current.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let value = (completed as f64 / total as f64) * 100.0 + current / total as f64;
    value.clamp(0.0, 100.0)
}

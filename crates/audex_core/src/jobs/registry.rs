//! Contract between the job store and the pipeline/orchestrator.

use crate::extraction::ProgressKind;

use super::types::{Job, JobPatch, JobStatus, NewJob};

/// Owner of job descriptors.
///
/// The orchestrator and the pipeline are the only writers of status,
/// progress, error and result. Jobs are created and removed by the caller;
/// the core never deletes a job on its own. Mutators return `false` when the
/// id is unknown or the update is rejected.
pub trait JobRegistry: Send + Sync {
    /// Enqueue jobs as pending; returns their ids in order.
    fn add_jobs(&self, jobs: Vec<NewJob>) -> Vec<String>;

    /// Move a job to `status` if the lifecycle allows it.
    fn set_status(&self, id: &str, status: JobStatus) -> bool;

    /// Record progress in percent.
    fn set_progress(&self, id: &str, value: f64, kind: ProgressKind) -> bool;

    /// Apply a partial update.
    fn set_info(&self, id: &str, patch: JobPatch) -> bool;

    /// All jobs in queue order.
    fn snapshot(&self) -> Vec<Job>;

    fn get(&self, id: &str) -> Option<Job>;

    /// Remove one job.
    fn remove(&self, id: &str) -> Option<Job>;

    /// Remove every job.
    fn clear(&self);
}

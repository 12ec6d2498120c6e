//! Job queue state management with persistence.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::extraction::ProgressKind;
use crate::storage::{write_atomic, BlobStore, StorageError, StorageResult};

use super::registry::JobRegistry;
use super::types::{Job, JobPatch, JobStatus, NewJob};

const QUEUE_VERSION: u32 = 1;

/// Persistent queue state (saved to queue.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueState {
    /// Queue format version.
    version: u32,
    /// Jobs in queue order.
    jobs: Vec<Job>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            version: QUEUE_VERSION,
            jobs: Vec::new(),
        }
    }
}

/// In-memory job registry with optional persistence to `queue.json`.
///
/// Progress updates are kept in memory only; every other mutation is
/// written through.
#[derive(Debug)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    queue_file: Option<PathBuf>,
}

impl JobQueue {
    /// Open the queue persisted at `queue_file`, starting empty if the file
    /// is missing or unreadable.
    pub fn open(queue_file: impl Into<PathBuf>) -> Self {
        let queue_file = queue_file.into();
        let state = load_state(&queue_file);
        Self {
            state: Mutex::new(state),
            queue_file: Some(queue_file),
        }
    }

    /// Create a queue without persistence.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            queue_file: None,
        }
    }

    /// Persist the queue to disk.
    pub fn save(&self) -> StorageResult<()> {
        let Some(path) = &self.queue_file else {
            return Ok(()); // In-memory queue, nothing to save
        };
        let (json, count) = {
            let state = self.state.lock();
            let json = serde_json::to_string_pretty(&*state)
                .map_err(|e| StorageError::encode("queue", e))?;
            (json, state.jobs.len())
        };
        write_atomic(path, &json)?;
        tracing::debug!("Saved {} jobs to {}", count, path.display());
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            tracing::warn!("Failed to persist job queue: {}", e);
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().jobs.is_empty()
    }

    /// Jobs with the given status, in queue order.
    pub fn with_status(&self, status: JobStatus) -> Vec<Job> {
        self.state
            .lock()
            .jobs
            .iter()
            .filter(|j| j.status == status)
            .cloned()
            .collect()
    }

    /// Invalidate references to blobs that no longer exist, and fail jobs
    /// that were interrupted mid-extraction. Returns how many jobs changed.
    pub fn rehydrate(&self, blobs: &BlobStore) -> usize {
        let mut changed = 0;
        {
            let mut state = self.state.lock();
            for job in &mut state.jobs {
                if let Some(reason) = invalidate(job, blobs) {
                    tracing::info!(job_id = %job.id, "{}", reason);
                    job.status = JobStatus::Error;
                    job.error = Some(reason.to_string());
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.persist();
        }
        changed
    }
}

/// Why a loaded job can no longer stand as persisted.
fn invalidate(job: &mut Job, blobs: &BlobStore) -> Option<&'static str> {
    if let Some(result) = &job.result {
        if !blobs.contains(&result.blob) {
            job.result = None;
            if job.status == JobStatus::Completed {
                return Some("Result no longer available");
            }
        }
    }
    if job.status == JobStatus::Processing {
        return Some("Interrupted before completion");
    }
    if matches!(job.status, JobStatus::Pending | JobStatus::Error) && !blobs.contains(&job.source.blob) {
        if job.status == JobStatus::Error && job.error.as_deref() == Some(SOURCE_GONE) {
            return None;
        }
        return Some(SOURCE_GONE);
    }
    None
}

const SOURCE_GONE: &str = "Source file no longer available";

fn load_state(path: &Path) -> QueueState {
    if !path.exists() {
        return QueueState::default();
    }
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<QueueState>(&content) {
            Ok(state) => {
                tracing::info!("Loaded {} jobs from {}", state.jobs.len(), path.display());
                state
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                QueueState::default()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            QueueState::default()
        }
    }
}

/// Apply a progress value under the monotonic rule.
fn apply_progress(job: &mut Job, value: f64) {
    if !value.is_finite() {
        return;
    }
    let value = value.clamp(0.0, 100.0);
    if job.status == JobStatus::Processing && value < job.progress {
        return;
    }
    job.progress = value;
}

impl JobRegistry for JobQueue {
    fn add_jobs(&self, jobs: Vec<NewJob>) -> Vec<String> {
        let ids = {
            let mut state = self.state.lock();
            jobs.into_iter()
                .map(|new| {
                    let job = Job::new(new.source, new.format, new.quality);
                    let id = job.id.clone();
                    state.jobs.push(job);
                    id
                })
                .collect::<Vec<_>>()
        };
        tracing::debug!("Added {} jobs", ids.len());
        self.persist();
        ids
    }

    fn set_status(&self, id: &str, status: JobStatus) -> bool {
        {
            let mut state = self.state.lock();
            let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) else {
                return false;
            };
            if !job.status.can_transition_to(status) {
                tracing::warn!(
                    job_id = id,
                    "Rejected status change {} -> {}",
                    job.status,
                    status
                );
                return false;
            }
            if status == JobStatus::Processing {
                job.progress = 0.0;
            }
            job.status = status;
        }
        self.persist();
        true
    }

    fn set_progress(&self, id: &str, value: f64, kind: ProgressKind) -> bool {
        let mut state = self.state.lock();
        let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) else {
            return false;
        };
        apply_progress(job, value);
        tracing::trace!(job_id = id, progress = job.progress, ?kind, "Job progress");
        true
    }

    fn set_info(&self, id: &str, patch: JobPatch) -> bool {
        {
            let mut state = self.state.lock();
            let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) else {
                return false;
            };
            if let Some(error) = patch.error {
                job.error = error;
            }
            if let Some(result) = patch.result {
                job.result = result;
            }
            if let Some(progress) = patch.progress {
                apply_progress(job, progress);
            }
        }
        self.persist();
        true
    }

    fn snapshot(&self) -> Vec<Job> {
        self.state.lock().jobs.clone()
    }

    fn get(&self, id: &str) -> Option<Job> {
        self.state.lock().jobs.iter().find(|j| j.id == id).cloned()
    }

    fn remove(&self, id: &str) -> Option<Job> {
        let removed = {
            let mut state = self.state.lock();
            let index = state.jobs.iter().position(|j| j.id == id)?;
            state.jobs.remove(index)
        };
        self.persist();
        Some(removed)
    }

    fn clear(&self) {
        self.state.lock().jobs.clear();
        self.persist();
    }
}

//! Sequential batch runner over the job registry.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::engine::EngineHandle;
use crate::extraction::{Extractor, ProgressKind, SourceFile};
use crate::jobs::{Job, JobPatch, JobRegistry, JobSetKey, JobStatus, ResultHandle};
use crate::storage::{BlobStore, HistoryRecord, HistoryStore};

use super::guard::{admit, Admission, BatchState, Trigger};
use super::types::{
    aggregate_progress, BatchError, BatchProgress, BatchProgressCallback, BatchSummary,
};

/// Drives pending jobs through the extraction pipeline, one at a time.
///
/// A run snapshots the registry, dispatches every job that was pending in
/// snapshot order and re-checks each one right before dispatch. Failures are
/// recorded on the job and never stop the run; losing the engine does.
/// History is appended once per completed job after the loop.
pub struct BatchOrchestrator {
    registry: Arc<dyn JobRegistry>,
    extractor: Extractor,
    blobs: Arc<BlobStore>,
    history: Arc<dyn HistoryStore>,
    state: Mutex<BatchState>,
}

/// Resets the batch state to idle on every exit path.
struct RunGuard<'a> {
    state: &'a Mutex<BatchState>,
    last_key: Option<JobSetKey>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = BatchState::Idle {
            last_key: self.last_key.take(),
        };
    }
}

enum JobOutcome {
    Completed(HistoryRecord),
    Failed,
}

impl BatchOrchestrator {
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        extractor: Extractor,
        blobs: Arc<BlobStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            registry,
            extractor,
            blobs,
            history,
            state: Mutex::new(BatchState::default()),
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        self.extractor.handle()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().is_running()
    }

    pub fn state(&self) -> BatchState {
        self.state.lock().clone()
    }

    /// Run an automatically triggered batch.
    pub async fn auto_run(
        &self,
        on_progress: BatchProgressCallback<'_>,
    ) -> Result<BatchSummary, BatchError> {
        self.run(Trigger::Auto, on_progress).await
    }

    /// Run a batch over the currently pending jobs.
    pub async fn run(
        &self,
        trigger: Trigger,
        on_progress: BatchProgressCallback<'_>,
    ) -> Result<BatchSummary, BatchError> {
        let snapshot = self.registry.snapshot();
        let key = JobSetKey::from_jobs(&snapshot);

        let previous_key = {
            let mut state = self.state.lock();
            match admit(&state, &key, trigger) {
                Admission::AlreadyRunning => return Err(BatchError::AlreadyRunning),
                Admission::AlreadyProcessed => return Err(BatchError::AlreadyProcessed),
                Admission::Start => {}
            }
            let previous = match &*state {
                BatchState::Idle { last_key } => last_key.clone(),
                BatchState::Running { .. } => None,
            };
            *state = BatchState::Running { key: key.clone() };
            previous
        };
        let mut guard = RunGuard {
            state: &self.state,
            last_key: previous_key,
        };

        if !self.engine().is_ready() {
            tracing::warn!("Batch run requested but engine is {}", self.engine().state());
            return Err(BatchError::EngineNotReady);
        }

        let pending: Vec<String> = snapshot
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .map(|j| j.id.clone())
            .collect();
        let total = pending.len();
        let mut summary = BatchSummary::empty();

        if total == 0 {
            tracing::debug!("No pending jobs");
            guard.last_key = Some(key);
            return Ok(summary);
        }

        tracing::info!(?trigger, jobs = total, batch = %key, "Starting batch run");

        let mut records = Vec::new();
        let mut engine_lost = false;

        for (index, id) in pending.iter().enumerate() {
            if !self.engine().is_ready() {
                summary.aborted = total - index;
                engine_lost = true;
                tracing::error!(
                    remaining = summary.aborted,
                    "Engine lost, aborting remaining jobs"
                );
                break;
            }

            let job = match self.registry.get(id) {
                Some(job) if job.status == JobStatus::Pending => job,
                other => {
                    tracing::info!(
                        job_id = %id,
                        status = ?other.map(|j| j.status),
                        "Skipping job that is no longer pending"
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            if !self.registry.set_status(id, JobStatus::Processing) {
                summary.skipped += 1;
                continue;
            }
            summary.dispatched += 1;

            match self.process(&job, summary.succeeded, total, on_progress).await {
                JobOutcome::Completed(record) => {
                    summary.succeeded += 1;
                    records.push(record);
                }
                JobOutcome::Failed => summary.failed += 1,
            }

            on_progress(BatchProgress {
                job_id: id.clone(),
                job_progress: self.registry.get(id).map(|j| j.progress).unwrap_or(100.0),
                overall: aggregate_progress(summary.succeeded, total, 0.0),
            });
        }

        for record in records {
            if let Err(e) = self.history.append(record) {
                tracing::warn!("Failed to append history record: {}", e);
            }
        }

        let summary = summary.finish();
        tracing::info!("Batch run finished: {}", summary);

        if engine_lost {
            return Err(BatchError::EngineLost { summary });
        }

        guard.last_key = Some(key);
        Ok(summary)
    }

    /// Extract one job that has just entered `Processing`.
    async fn process(
        &self,
        job: &Job,
        completed: usize,
        total: usize,
        on_progress: BatchProgressCallback<'_>,
    ) -> JobOutcome {
        let started = Instant::now();

        let data = match self.blobs.get(&job.source.blob) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Source blob missing");
                return self.fail(job, "Source file no longer available");
            }
        };
        let source = SourceFile::new(
            job.source.name.clone(),
            job.source.media_type.clone(),
            Arc::try_unwrap(data).unwrap_or_else(|shared| shared.to_vec()),
        );

        let report = |value: f64, kind: ProgressKind| {
            self.registry.set_progress(&job.id, value, kind);
            on_progress(BatchProgress {
                job_id: job.id.clone(),
                job_progress: value,
                overall: aggregate_progress(completed, total, value),
            });
        };

        let resource = match self
            .extractor
            .extract(&source, job.format, job.quality, &report)
            .await
        {
            Ok(resource) => resource,
            Err(e) => return self.fail(job, &e.to_string()),
        };

        let media_type = resource.media_type;
        let size = resource.data.len() as u64;
        let blob = match self.blobs.put(resource.data) {
            Ok(blob) => blob,
            Err(e) => return self.fail(job, &format!("Failed to store result: {}", e)),
        };
        let result = ResultHandle {
            blob,
            media_type,
            size,
        };

        self.registry.set_info(&job.id, JobPatch::result(result.clone()));
        self.registry
            .set_progress(&job.id, 100.0, ProgressKind::Complete);
        self.registry.set_status(&job.id, JobStatus::Completed);

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(job_id = %job.id, source = %job.source.name, duration_ms, "Job completed");

        JobOutcome::Completed(HistoryRecord::new(
            job.source.name.clone(),
            result,
            job.format,
            job.quality,
            duration_ms,
        ))
    }

    fn fail(&self, job: &Job, message: &str) -> JobOutcome {
        tracing::warn!(job_id = %job.id, source = %job.source.name, "Job failed: {}", message);
        self.registry.set_info(&job.id, JobPatch::error(message));
        self.registry.set_status(&job.id, JobStatus::Error);
        JobOutcome::Failed
    }

    /// Re-arm every errored job: back to pending with progress 0 and no
    /// error. Returns the number of jobs re-armed.
    pub fn retry_failed(&self) -> Result<usize, BatchError> {
        let mut state = self.state.lock();
        if state.is_running() {
            return Err(BatchError::AlreadyRunning);
        }

        let mut count = 0;
        for job in self.registry.snapshot() {
            if job.status != JobStatus::Error {
                continue;
            }
            if self.registry.set_status(&job.id, JobStatus::Pending) {
                self.registry.set_info(&job.id, JobPatch::reset());
                count += 1;
            }
        }

        *state = BatchState::Idle { last_key: None };
        tracing::info!("Re-armed {} failed jobs", count);
        Ok(count)
    }
}

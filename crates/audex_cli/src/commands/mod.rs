pub mod check_engine;
pub mod clear;
pub mod extract;
pub mod history;
pub mod retry;
pub mod status;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use audex_core::engine::EngineHandle;
use audex_core::jobs::{JobRegistry, JobStatus};
use audex_core::orchestrator::{BatchError, BatchOutcome, BatchProgress, Trigger};
use parking_lot::Mutex;

use crate::app::App;

/// Single-line progress display on stderr.
#[derive(Default)]
struct ProgressLine {
    last: Mutex<Option<u32>>,
}

impl ProgressLine {
    fn report(&self, progress: &BatchProgress) {
        let percent = progress.overall.floor() as u32;
        let mut last = self.last.lock();
        if *last == Some(percent) {
            return;
        }
        *last = Some(percent);
        eprint!("\r[{:>3}%] job {:>3.0}%", percent, progress.job_progress);
    }

    fn finish(&self) {
        if self.last.lock().is_some() {
            eprintln!();
        }
    }
}

/// Ids of every pending job in queue order, which is what a manual run
/// dispatches.
pub(crate) fn pending_ids(app: &App) -> Vec<String> {
    app.queue()
        .with_status(JobStatus::Pending)
        .into_iter()
        .map(|job| job.id)
        .collect()
}

/// Run a manual batch with `handle`, write the result of every job it
/// picked up to `out_dir` and turn the outcome into the process result.
pub(crate) async fn run_batch(app: &App, handle: EngineHandle, out_dir: &Path) -> Result<()> {
    let ids = pending_ids(app);
    let orchestrator = app.orchestrator(handle.clone());
    let line = ProgressLine::default();
    let outcome = orchestrator
        .run(Trigger::Manual, &|p: BatchProgress| line.report(&p))
        .await;
    line.finish();

    let written = write_results(app, &ids, out_dir);
    handle.dispose().await;
    written?;

    match outcome {
        Ok(summary) => {
            println!("{}", summary);
            if summary.outcome == BatchOutcome::Failure {
                bail!("No file could be extracted");
            }
            Ok(())
        }
        Err(BatchError::EngineLost { summary }) => {
            println!("{}", summary);
            bail!("The engine stopped during the run; run `audex retry` to continue");
        }
        Err(e) => Err(e.into()),
    }
}

/// Write every completed job in `ids` to `out_dir` and report failures.
fn write_results(app: &App, ids: &[String], out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    for id in ids {
        let Some(job) = app.queue().get(id) else {
            continue;
        };
        match (job.status, &job.result) {
            (JobStatus::Completed, Some(result)) => {
                let data = app.blobs().get(&result.blob)?;
                let path = unique_path(out_dir, &job.output_name());
                fs::write(&path, data.as_slice())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("{} -> {}", job.source.name, path.display());
            }
            (JobStatus::Error, _) => {
                println!(
                    "{}: {}",
                    job.source.name,
                    job.error.as_deref().unwrap_or("failed")
                );
            }
            _ => {}
        }
    }
    Ok(())
}

/// `dir/name`, or `dir/stem (n).ext` when that already exists.
fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|e| e.to_str());
    (1u32..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

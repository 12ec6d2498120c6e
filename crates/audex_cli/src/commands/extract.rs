use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use audex_core::engine::EngineHandle;
use audex_core::extraction::{media_type_for_name, OutputFormat, Quality};
use audex_core::jobs::{JobRegistry, NewJob, SourceHandle};

use crate::app::App;

pub async fn execute(
    app: &App,
    files: &[PathBuf],
    format: Option<OutputFormat>,
    quality: Option<Quality>,
    output: Option<PathBuf>,
) -> Result<()> {
    let defaults = &app.settings().extraction;
    let format = format.unwrap_or(defaults.default_format);
    let quality = quality.unwrap_or(defaults.default_quality);
    let out_dir = app.output_dir(output);

    let handle = EngineHandle::new();
    app.load_engine(&handle).await?;

    let ids = match enqueue_files(app, files, format, quality) {
        Ok(ids) => ids,
        Err(e) => {
            handle.dispose().await;
            return Err(e);
        }
    };
    println!("Queued {} file(s) as {} ({})", ids.len(), format, quality);

    super::run_batch(app, handle, &out_dir).await
}

/// Store each file as a blob and add one pending job per file.
pub(crate) fn enqueue_files(
    app: &App,
    files: &[PathBuf],
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<String>> {
    let mut jobs = Vec::with_capacity(files.len());
    for path in files {
        let data =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input")
            .to_string();
        let media_type = media_type_for_name(&name).to_string();
        let size = data.len() as u64;
        let blob = app.blobs().put(data)?;
        jobs.push(NewJob {
            source: SourceHandle {
                name,
                media_type,
                size,
                blob,
            },
            format,
            quality,
        });
    }
    Ok(app.queue().add_jobs(jobs))
}

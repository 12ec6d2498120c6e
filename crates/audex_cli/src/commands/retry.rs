use std::path::PathBuf;

use anyhow::Result;
use audex_core::engine::EngineHandle;

use crate::app::App;

pub async fn execute(app: &App, output: Option<PathBuf>) -> Result<()> {
    let handle = EngineHandle::new();
    let reset = app.orchestrator(handle.clone()).retry_failed()?;

    let pending = super::pending_ids(app).len();
    if pending == 0 {
        println!("Nothing to retry");
        return Ok(());
    }
    println!("Retrying {} failed job(s), {} pending in total", reset, pending);

    app.load_engine(&handle).await?;
    super::run_batch(app, handle, &app.output_dir(output)).await
}

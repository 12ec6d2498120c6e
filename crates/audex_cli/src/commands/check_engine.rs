use anyhow::Result;
use audex_core::engine::EngineHandle;

use crate::app::App;

pub async fn execute(app: &App) -> Result<()> {
    let handle = EngineHandle::new();
    app.load_engine(&handle).await?;
    println!(
        "Engine {} (source: {})",
        handle.state(),
        handle.source_name().unwrap_or_default()
    );
    handle.dispose().await;
    Ok(())
}

use anyhow::Result;
use audex_core::storage::HistoryStore;

use crate::app::App;

pub fn execute(app: &App) -> Result<()> {
    let records = app.history().records();
    if records.is_empty() {
        println!("No extractions yet");
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  {}  {}/{}  {:.1} KiB  {:.1}s",
            record.timestamp,
            record.source_name,
            record.format,
            record.quality,
            record.size as f64 / 1024.0,
            record.duration_ms as f64 / 1000.0
        );
    }
    Ok(())
}

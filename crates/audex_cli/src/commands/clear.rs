use std::collections::HashSet;

use anyhow::Result;
use audex_core::jobs::JobRegistry;
use audex_core::storage::HistoryStore;

use crate::app::App;

/// Drop every job, then every blob that no history record still points at.
pub fn execute(app: &App) -> Result<()> {
    let jobs = app.queue().len();
    app.queue().clear();

    let keep: HashSet<_> = app
        .history()
        .records()
        .into_iter()
        .map(|r| r.result.blob)
        .collect();
    let mut removed = 0;
    for id in app.blobs().ids() {
        if !keep.contains(&id) && app.blobs().remove(&id)? {
            removed += 1;
        }
    }

    println!("Removed {} job(s) and {} blob(s)", jobs, removed);
    Ok(())
}

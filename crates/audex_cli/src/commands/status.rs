use anyhow::Result;
use audex_core::jobs::JobRegistry;

use crate::app::App;

pub fn execute(app: &App) -> Result<()> {
    let jobs = app.queue().snapshot();
    if jobs.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }

    println!("{:<8}  {:<10}  {:>6}  {:<6}  SOURCE", "ID", "STATUS", "DONE", "FORMAT");
    for job in &jobs {
        let short_id = job.id.get(..8).unwrap_or(&job.id);
        print!(
            "{:<8}  {:<10}  {:>5.1}%  {:<6}  {}",
            short_id,
            job.status,
            job.progress,
            job.format,
            job.source.name
        );
        match &job.error {
            Some(error) => println!("  ({})", error),
            None => println!(),
        }
    }
    Ok(())
}

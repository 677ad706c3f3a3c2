use std::path::Path;

use anyhow::Result;

use tabsync_engine::orchestrator::RunOptions;
use tabsync_engine::{parse_config, PipelineError};

/// Execute a full pipeline run.
pub async fn execute(pipeline: &Path, delete_catalog: bool) -> Result<()> {
    let config = parse_config(pipeline)?;
    let orchestrator = super::build_orchestrator(config)?;

    match orchestrator.run(RunOptions { delete_catalog }).await {
        Ok(report) => {
            println!(
                "Loaded {} table(s), {} row(s) in {:.1}s",
                report.tables_loaded.len(),
                report.rows_written,
                report.duration_secs
            );
            for table in &report.tables_loaded {
                println!("  ok      {table}");
            }
            for table in &report.tables_failed {
                println!("  FAILED  {table}");
            }
            if report.tables_failed.is_empty() {
                Ok(())
            } else {
                anyhow::bail!(
                    "{} table(s) were not fully loaded and were rolled back from the catalog",
                    report.tables_failed.len()
                )
            }
        }
        Err(err) if err.is_clean_stop() => {
            println!("Nothing new to load.");
            Ok(())
        }
        Err(PipelineError::Infrastructure(err)) => Err(err),
        Err(err) => Err(err.into()),
    }
}

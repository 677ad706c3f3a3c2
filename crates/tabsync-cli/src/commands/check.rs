use std::path::Path;

use anyhow::Result;

use tabsync_engine::parse_config;

/// Validate configuration and both collaborators.
pub async fn execute(pipeline: &Path) -> Result<()> {
    let config = parse_config(pipeline)?;
    let orchestrator = super::build_orchestrator(config)?;

    let report = orchestrator.check().await;
    let mark = |ok: bool| if ok { "ok" } else { "FAILED" };
    println!("storage   {:<7} {}", mark(report.storage.ok), report.storage.message);
    println!("database  {:<7} {}", mark(report.database.ok), report.database.message);

    if report.all_ok() {
        Ok(())
    } else {
        anyhow::bail!("one or more checks failed")
    }
}

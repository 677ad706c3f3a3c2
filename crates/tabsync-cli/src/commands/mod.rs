pub mod catalog;
pub mod check;
pub mod run;

use std::sync::Arc;

use anyhow::{Context, Result};

use tabsync_engine::destination::PgDestination;
use tabsync_engine::{Orchestrator, PipelineConfig};
use tabsync_state::FsBlobStore;

/// Wire the orchestrator up from a parsed pipeline config.
pub(crate) fn build_orchestrator(config: PipelineConfig) -> Result<Orchestrator> {
    let blob = FsBlobStore::open(&config.storage.root).with_context(|| {
        format!(
            "Failed to open blob store root: {}",
            config.storage.root.display()
        )
    })?;
    let destination = PgDestination::new(config.database.clone());
    Ok(Orchestrator::new(config, Arc::new(blob), Arc::new(destination)))
}

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use tabsync_engine::parse_config;
use tabsync_state::{CatalogStore, FsBlobStore};

/// Show or clear the processed-file catalog.
pub fn execute(pipeline: &Path, clear: bool) -> Result<()> {
    let config = parse_config(pipeline)?;
    let blob = FsBlobStore::open(&config.storage.root).with_context(|| {
        format!(
            "Failed to open blob store root: {}",
            config.storage.root.display()
        )
    })?;
    let catalog = CatalogStore::new(Arc::new(blob), &config.project);

    if clear {
        catalog.clear()?;
        println!("Catalog cleared.");
        return Ok(());
    }

    match catalog.audit()? {
        Some(entries) => {
            println!("{} catalogued file(s):", entries.len());
            for entry in entries {
                println!(
                    "  {}  {}",
                    entry.processed_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.file_identifier
                );
            }
        }
        None => println!("No catalog yet."),
    }
    Ok(())
}

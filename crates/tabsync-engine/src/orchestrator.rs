//! End-to-end pipeline: listing, catalog diff, parsing, loading, and
//! catalog reconciliation.
//!
//! The catalog advances with every file selected for the run, then entries
//! for files the loader rejected are rolled back, so the catalog never
//! claims data that is absent downstream.

use std::sync::Arc;
use std::time::Instant;

use tabsync_state::{BlobStore, CatalogStore};
use tabsync_types::batch::TableBatch;

use crate::config::PipelineConfig;
use crate::destination::SqlDestination;
use crate::error::PipelineError;
use crate::loader::{BulkLoader, LoaderOptions};
use crate::result::{CheckReport, RunReport, ValidationOutcome};
use crate::tabular;

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Clear the catalog before diffing — every candidate file becomes new.
    /// Intended only for controlled re-runs.
    pub delete_catalog: bool,
}

/// Drives the whole pipeline against the two collaborators.
pub struct Orchestrator {
    config: PipelineConfig,
    blob: Arc<dyn BlobStore>,
    catalog: CatalogStore,
    destination: Arc<dyn SqlDestination>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        blob: Arc<dyn BlobStore>,
        destination: Arc<dyn SqlDestination>,
    ) -> Self {
        let catalog = CatalogStore::new(blob.clone(), &config.project);
        Self {
            config,
            blob,
            catalog,
            destination,
        }
    }

    /// The catalog this run reads and reconciles.
    #[must_use]
    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    /// Run the pipeline once.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NothingNew`] when the catalog diff selects
    /// no files — a terminal clean stop, not a failure. Catalog write
    /// failures and cache persistence failures propagate.
    pub async fn run(&self, options: RunOptions) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        tracing::info!(project = %self.config.project, "starting run");

        if options.delete_catalog {
            tracing::warn!("clearing catalog before run");
            self.catalog.clear()?;
        }

        let candidates = self.list_candidates()?;
        tracing::info!(candidates = candidates.len(), "listed source files");

        let had_catalog = self.catalog.audit()?.is_some();
        let new_files = self.catalog.diff(&candidates)?;
        if new_files.is_empty() {
            return Err(PipelineError::NothingNew);
        }
        tracing::info!(files = new_files.len(), "files selected for loading");

        let mut batches: Vec<TableBatch> = Vec::with_capacity(new_files.len());
        let mut sources: Vec<(String, String)> = Vec::with_capacity(new_files.len());
        let mut failed_files: Vec<String> = Vec::new();
        for file in &new_files {
            match self.parse_file(file) {
                Ok(batch) => {
                    tracing::info!(file = %file, table = %batch.name, rows = batch.len(), "parsed file");
                    sources.push((batch.name.clone(), file.clone()));
                    batches.push(batch);
                }
                Err(err) => {
                    tracing::warn!(file = %file, error = %err, "file skipped, will be rolled back");
                    failed_files.push(file.clone());
                }
            }
        }

        let loader = BulkLoader::new(
            self.destination.clone(),
            LoaderOptions::from(&self.config.loader),
        );
        let outcome = loader.load(&batches).await?;

        // Advance first, then strip the rejects: the catalog must describe
        // exactly what made it downstream.
        if had_catalog {
            self.catalog.advance(&new_files)?;
        } else {
            self.catalog.create(&new_files, true)?;
        }
        for table in &outcome.failed_tables {
            if let Some((_, file)) = sources.iter().find(|(name, _)| name == table) {
                failed_files.push(file.clone());
            }
        }
        self.catalog.remove(&failed_files)?;
        if !failed_files.is_empty() {
            tracing::warn!(
                files = failed_files.len(),
                "rolled catalog entries back for files that did not load"
            );
        }

        let tables_loaded = sources
            .iter()
            .filter(|(name, _)| !outcome.failed_tables.contains(name))
            .map(|(name, _)| name.clone())
            .collect();

        let report = RunReport {
            new_files,
            tables_loaded,
            tables_failed: outcome.failed_tables,
            rows_written: outcome.rows_written,
            duration_secs: start.elapsed().as_secs_f64(),
        };
        tracing::info!(
            tables = report.tables_loaded.len(),
            failed = report.tables_failed.len(),
            rows = report.rows_written,
            "run finished"
        );
        Ok(report)
    }

    /// Validate both collaborators without moving data.
    pub async fn check(&self) -> CheckReport {
        let storage = match self.list_candidates() {
            Ok(files) => ValidationOutcome {
                ok: true,
                message: format!(
                    "listed {} candidate file(s) under '{}'",
                    files.len(),
                    self.config.storage.prefix
                ),
            },
            Err(err) => ValidationOutcome {
                ok: false,
                message: format!("object store listing failed: {err}"),
            },
        };

        let database = match self.ping_destination().await {
            Ok(tables) => ValidationOutcome {
                ok: true,
                message: format!(
                    "connected to {} ({} existing table(s) in schema '{}')",
                    self.config.database.host, tables, self.config.database.schema
                ),
            },
            Err(err) => ValidationOutcome {
                ok: false,
                message: format!("destination check failed: {err}"),
            },
        };

        CheckReport { storage, database }
    }

    async fn ping_destination(&self) -> Result<usize, PipelineError> {
        let conn = self.destination.connect().await?;
        Ok(conn.list_tables().await?.len())
    }

    /// Candidate source files: everything under the prefix, minus the
    /// exclusion substring (which keeps the catalog artifact out).
    fn list_candidates(&self) -> Result<Vec<String>, PipelineError> {
        let files = self.blob.list(&self.config.storage.prefix)?;
        Ok(filter_candidates(
            files,
            &self.config.storage.exclude,
        ))
    }

    fn parse_file(&self, file: &str) -> Result<TableBatch, PipelineError> {
        let bytes = self.blob.get(file)?;
        let mut batch = tabular::read_batch(&bytes, file)?;
        tabular::stamp_period(&mut batch, file);
        tabular::apply_column_policy(&mut batch, &self.config.columns);
        Ok(batch)
    }
}

fn filter_candidates(files: Vec<String>, exclude: &str) -> Vec<String> {
    files
        .into_iter()
        .filter(|f| f.ends_with(".csv"))
        .filter(|f| exclude.is_empty() || !f.contains(exclude))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_drops_catalog_and_non_tabular_files() {
        let files = vec![
            "incoming/a.csv".to_string(),
            "demo/catalog.csv".to_string(),
            "incoming/readme.txt".to_string(),
            "incoming/b.csv".to_string(),
        ];
        assert_eq!(
            filter_candidates(files, "catalog"),
            vec!["incoming/a.csv", "incoming/b.csv"]
        );
    }

    #[test]
    fn empty_exclude_keeps_everything_tabular() {
        let files = vec!["a.csv".to_string(), "catalog.csv".to_string()];
        assert_eq!(
            filter_candidates(files, ""),
            vec!["a.csv", "catalog.csv"]
        );
    }
}

//! Resilient, deduplicating bulk loader.
//!
//! One table is loaded fully before the next begins; within a table,
//! chunks are processed strictly in order with at most one in-flight
//! write. Every insert attempt opens a fresh connection and drops it when
//! the attempt resolves.
//!
//! The dedup cache makes retries and re-runs idempotent: after every
//! successful chunk insert the written fingerprints are merged and the
//! cache is persisted, so an interruption at any point leaves a cache file
//! whose contents the next run skips. When the whole pass finishes the
//! cache file is deleted — it is a work-in-progress log, not a permanent
//! record, and deletion happens even when some tables failed: failed
//! tables are reconciled through the catalog rollback, while the cache
//! only guards against interruption.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tabsync_state::{ChunkDiff, DedupCache};
use tabsync_types::batch::{TableBatch, TableSpec};
use tabsync_types::error::StoreError;
use tabsync_types::value::{normalize_row, Value};

use crate::chunk::{self, ChunkPolicy};
use crate::config::LoaderConfig;
use crate::destination::SqlDestination;
use crate::error::PipelineError;
use crate::result::LoadOutcome;
use crate::schema::SchemaInferencer;

/// Loader tuning, resolved from [`LoaderConfig`].
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub chunking: ChunkPolicy,
    pub interruption_mode: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub cache_path: PathBuf,
    pub char_length: usize,
    pub override_length: bool,
    pub strict_lengths: bool,
}

impl From<&LoaderConfig> for LoaderOptions {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            chunking: ChunkPolicy {
                auto_resolve: config.auto_resolve,
                frac: config.frac,
                chunk_size: config.chunk_size,
                large_batch_threshold: config.large_batch_threshold,
            },
            interruption_mode: config.interruption_mode,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            cache_path: config.cache_path.clone(),
            char_length: config.char_length,
            override_length: config.override_length,
            strict_lengths: config.strict_lengths,
        }
    }
}

/// Whether this attempt must diff the chunk against the cache first.
///
/// Interruption mode always dedups. Otherwise the first attempt inserts
/// the full chunk optimistically and only retries dedup — a failed batch
/// insert may have partially committed rows, so the retry must not
/// reinsert them. Intentional asymmetry; do not collapse the two arms.
fn use_dedup(interruption_mode: bool, attempt: u32) -> bool {
    interruption_mode || attempt > 0
}

/// How one chunk resolved.
enum ChunkResolution {
    /// Rows written (possibly 0 after in-chunk dedup collapsed everything).
    Inserted(u64),
    /// Every row was already cached; no insert issued.
    AlreadyCached,
    /// Retries exhausted on a transient error; chunk rows absent downstream.
    RetriesExhausted,
    /// Non-retryable failure; abort the remainder of this table.
    TableFatal,
}

/// Consumes tabular batches and writes them to the destination store.
pub struct BulkLoader {
    destination: Arc<dyn SqlDestination>,
    options: LoaderOptions,
}

impl BulkLoader {
    #[must_use]
    pub fn new(destination: Arc<dyn SqlDestination>, options: LoaderOptions) -> Self {
        Self {
            destination,
            options,
        }
    }

    /// Load every batch, one table at a time, returning the tables that
    /// could not be fully loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::State`] when the dedup cache cannot be
    /// persisted; per-table store failures are reported through
    /// [`LoadOutcome::failed_tables`] instead of an error.
    pub async fn load(&self, batches: &[TableBatch]) -> Result<LoadOutcome, PipelineError> {
        let mut cache = DedupCache::load(&self.options.cache_path);
        if !cache.is_empty() {
            tracing::info!(
                fingerprints = cache.len(),
                "previous run left a dedup cache; cached rows will be skipped"
            );
        }

        let mut outcome = LoadOutcome::default();
        let mut failed = BTreeSet::new();

        for batch in batches {
            if batch.is_empty() {
                tracing::info!(table = %batch.name, "batch is empty, nothing to load");
                continue;
            }
            if let Err(()) = self.load_table(batch, &mut cache, &mut outcome).await? {
                failed.insert(batch.name.clone());
            }
        }

        // Success marker: a run that reaches this point finished its pass,
        // so the interruption log is done. Failed tables are rolled back
        // via the catalog, not the cache.
        match DedupCache::remove_file(&self.options.cache_path) {
            Ok(()) => tracing::info!(path = %self.options.cache_path.display(), "dedup cache deleted"),
            Err(err) => {
                tracing::warn!(path = %self.options.cache_path.display(), error = %err, "failed to delete dedup cache");
            }
        }

        outcome.failed_tables = failed.into_iter().collect();
        Ok(outcome)
    }

    /// Load all chunks of one table. `Ok(Err(()))` marks the table failed.
    async fn load_table(
        &self,
        batch: &TableBatch,
        cache: &mut DedupCache,
        outcome: &mut LoadOutcome,
    ) -> Result<Result<(), ()>, PipelineError> {
        let chunks = chunk::plan(batch.len(), &self.options.chunking);
        tracing::info!(
            table = %batch.name,
            rows = batch.len(),
            chunks = chunks.len(),
            "loading table"
        );

        // Null-normalize once, before sizing, fingerprinting, and binding.
        let normalized: Vec<Vec<Value>> = batch.rows.iter().cloned().map(normalize_row).collect();

        let inferencer = SchemaInferencer::new(self.options.char_length, self.options.override_length);
        let sizing_rows = if self.options.strict_lengths {
            &normalized[..]
        } else {
            &normalized[chunks[0].clone()]
        };
        let spec = inferencer.infer(&batch.name, &batch.columns, sizing_rows);

        // Existence is queried once, lazily, and remembered for the rest of
        // this table's load.
        let mut table_exists: Option<bool> = None;
        let mut chunks_lost = 0u64;

        for (chunk_idx, range) in chunks.iter().enumerate() {
            let rows = &normalized[range.clone()];

            let resolution = self
                .run_chunk(batch, &spec, rows, chunk_idx, &mut table_exists, cache)
                .await?;

            match resolution {
                ChunkResolution::Inserted(n) => {
                    // Persist immediately so a later interruption resumes
                    // from this point; a cache that cannot be written is a
                    // hard stop, not a warning.
                    cache.save(&self.options.cache_path)?;
                    outcome.rows_written += n;
                    outcome.chunks_attempted += 1;
                }
                ChunkResolution::AlreadyCached => {
                    outcome.chunks_skipped += 1;
                }
                // An exhausted chunk leaves its rows absent but later
                // chunks still get their shot.
                ChunkResolution::RetriesExhausted => {
                    outcome.chunks_attempted += 1;
                    chunks_lost += 1;
                }
                ChunkResolution::TableFatal => return Ok(Err(())),
            }
        }

        if chunks_lost > 0 {
            tracing::warn!(table = %batch.name, chunks_lost, "table not fully loaded");
            return Ok(Err(()));
        }
        tracing::info!(table = %batch.name, "table loaded");
        Ok(Ok(()))
    }

    /// Drive one chunk through its bounded retry loop.
    async fn run_chunk(
        &self,
        batch: &TableBatch,
        spec: &TableSpec,
        rows: &[Vec<Value>],
        chunk_idx: usize,
        table_exists: &mut Option<bool>,
        cache: &mut DedupCache,
    ) -> Result<ChunkResolution, PipelineError> {
        for attempt in 0..self.options.max_retries {
            let step = self
                .attempt_chunk(batch, spec, rows, attempt, table_exists, cache)
                .await;

            match step {
                Ok(resolution) => return Ok(resolution),
                Err(err) if err.retryable && attempt + 1 < self.options.max_retries => {
                    tracing::warn!(
                        table = %batch.name,
                        chunk = chunk_idx,
                        attempt = attempt + 1,
                        max_retries = self.options.max_retries,
                        category = %err.category,
                        error = %err,
                        "transient store error, will retry"
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(err) if err.retryable => {
                    tracing::error!(
                        table = %batch.name,
                        chunk = chunk_idx,
                        attempts = self.options.max_retries,
                        error = %err,
                        "retries exhausted, chunk not loaded"
                    );
                    return Ok(ChunkResolution::RetriesExhausted);
                }
                Err(err) => {
                    tracing::error!(
                        table = %batch.name,
                        chunk = chunk_idx,
                        category = %err.category,
                        error = %err,
                        "non-retryable store error, aborting table"
                    );
                    return Ok(ChunkResolution::TableFatal);
                }
            }
        }
        // max_retries >= 1 is enforced by config validation.
        Ok(ChunkResolution::RetriesExhausted)
    }

    /// One insert attempt: fresh connection, lazy existence check, one-shot
    /// table creation, dedup decision, insert, cache persist.
    async fn attempt_chunk(
        &self,
        batch: &TableBatch,
        spec: &TableSpec,
        rows: &[Vec<Value>],
        attempt: u32,
        table_exists: &mut Option<bool>,
        cache: &mut DedupCache,
    ) -> Result<ChunkResolution, StoreError> {
        let conn = self.destination.connect().await?;

        if table_exists.is_none() {
            let tables = conn.list_tables().await?;
            *table_exists = Some(tables.iter().any(|t| t == &batch.name));
        }

        if *table_exists == Some(false) {
            tracing::info!(table = %batch.name, columns = %spec.columns_ddl(), "creating table");
            if let Err(err) = conn.create_table(spec).await {
                // Creation failure is fatal for this table regardless of
                // category: naming conflicts and privilege errors do not
                // heal on retry.
                tracing::error!(table = %batch.name, error = %err, "table creation failed");
                return Ok(ChunkResolution::TableFatal);
            }
            *table_exists = Some(true);
        }

        let (to_insert, fingerprints) = if use_dedup(self.options.interruption_mode, attempt) {
            let ChunkDiff {
                all_duplicate,
                new_rows,
                new_fingerprints,
            } = cache.difference(rows);
            if all_duplicate {
                tracing::info!(table = %batch.name, "chunk already cached, skipping insert");
                return Ok(ChunkResolution::AlreadyCached);
            }
            (new_rows, new_fingerprints)
        } else {
            // Optimistic first attempt: insert the whole chunk without
            // paying for fingerprint lookups.
            let fingerprints = rows.iter().cloned().collect();
            (rows.to_vec(), fingerprints)
        };

        let written = conn
            .insert_rows(&batch.name, &batch.columns, &to_insert)
            .await?;

        cache.merge(fingerprints);
        tracing::info!(table = %batch.name, rows = written, "chunk inserted");
        Ok(ChunkResolution::Inserted(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_always_on_in_interruption_mode() {
        assert!(use_dedup(true, 0));
        assert!(use_dedup(true, 1));
    }

    #[test]
    fn optimistic_first_attempt_then_dedup_on_retry() {
        assert!(!use_dedup(false, 0));
        assert!(use_dedup(false, 1));
        assert!(use_dedup(false, 2));
    }

    #[test]
    fn options_resolve_from_config() {
        let config = LoaderConfig::default();
        let options = LoaderOptions::from(&config);
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_delay, Duration::from_secs(5));
        assert_eq!(options.chunking.chunk_size, 20);
        assert!(!options.interruption_mode);
    }
}

//! Run result types.

/// Result of one `BulkLoader::load` pass over a set of batches.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Tables that were not fully loaded (creation failed or a chunk
    /// exhausted its retries). The orchestrator rolls their source files
    /// back out of the catalog.
    pub failed_tables: Vec<String>,
    /// Rows actually written across all tables.
    pub rows_written: u64,
    /// Chunks skipped because every row was already cached.
    pub chunks_skipped: u64,
    /// Chunks that went through an insert attempt.
    pub chunks_attempted: u64,
}

impl LoadOutcome {
    /// Returns `true` when every table loaded completely.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_tables.is_empty()
    }
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Files the catalog diff selected for this run.
    pub new_files: Vec<String>,
    /// Tables loaded completely.
    pub tables_loaded: Vec<String>,
    /// Tables that failed and were rolled back out of the catalog.
    pub tables_failed: Vec<String>,
    pub rows_written: u64,
    pub duration_secs: f64,
}

/// One validation check outcome.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub message: String,
}

/// Result of `tabsync check`.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub storage: ValidationOutcome,
    pub database: ValidationOutcome,
}

impl CheckReport {
    /// Returns `true` when every collaborator validated.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.storage.ok && self.database.ok
    }
}

//! Disk-persisted set of row fingerprints for idempotent retried inserts.
//!
//! The cache is a work-in-progress log, not a permanent record: created
//! empty at load start, extended after every successful chunk insert, and
//! deleted once the whole load pass completes. A leftover cache file is
//! evidence the previous run did not finish cleanly, and loading it makes
//! the re-run skip the rows that were already written.

use std::collections::HashSet;
use std::path::Path;

use tabsync_types::value::{normalize_row, RowFingerprint, Value};

use crate::error::{Result, StateError};

/// Result of diffing a chunk against the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDiff {
    /// `true` iff every row of the chunk is already cached.
    pub all_duplicate: bool,
    /// Rows not in the cache, duplicates within the chunk collapsed.
    pub new_rows: Vec<Vec<Value>>,
    /// Fingerprints of `new_rows`.
    pub new_fingerprints: HashSet<RowFingerprint>,
}

/// Set of previously-inserted row fingerprints.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DedupCache {
    entries: HashSet<RowFingerprint>,
}

impl DedupCache {
    /// Read the persisted cache.
    ///
    /// A missing, unreadable, or truncated file degrades to an empty cache:
    /// "assume nothing cached" never fails the load.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => return Self::default(),
        };
        match bincode::deserialize::<HashSet<RowFingerprint>>(&bytes) {
            Ok(entries) => Self { entries },
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "corrupt dedup cache treated as empty");
                Self::default()
            }
        }
    }

    /// Overwrite the cache file wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the parent directory cannot be created or
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes =
            bincode::serialize(&self.entries).map_err(|e| StateError::Encode(e.to_string()))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Delete the cache file. Missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] on any other file-system failure.
    pub fn remove_file(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Compute `rows − cache`.
    ///
    /// Rows must already be normalized. Duplicates within `rows` collapse to
    /// one occurrence; row order is preserved for the survivors.
    #[must_use]
    pub fn difference(&self, rows: &[Vec<Value>]) -> ChunkDiff {
        let mut new_rows = Vec::new();
        let mut new_fingerprints = HashSet::new();
        for row in rows {
            if self.entries.contains(row) || new_fingerprints.contains(row) {
                continue;
            }
            new_fingerprints.insert(row.clone());
            new_rows.push(row.clone());
        }
        ChunkDiff {
            all_duplicate: new_rows.is_empty(),
            new_rows,
            new_fingerprints,
        }
    }

    /// Union newly-written fingerprints into the cache. Idempotent.
    pub fn merge(&mut self, fingerprints: impl IntoIterator<Item = RowFingerprint>) {
        self.entries.extend(fingerprints);
    }

    /// Fingerprint rows (normalizing first) and merge them.
    pub fn merge_rows(&mut self, rows: &[Vec<Value>]) {
        self.merge(rows.iter().cloned().map(normalize_row));
    }

    /// Number of cached fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` when the fingerprint is cached.
    #[must_use]
    pub fn contains(&self, fingerprint: &[Value]) -> bool {
        self.entries.contains(fingerprint)
    }
}

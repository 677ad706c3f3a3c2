//! Catalog of already-processed source files.
//!
//! The catalog is one CSV artifact (`catalog.csv`) in the object store,
//! read and written wholesale — a single mutable value with full-overwrite
//! semantics, never an append-only log. Single-threaded access is assumed;
//! there is no cross-process coordination.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blob::BlobStore;
use crate::error::{Result, StateError};

/// Artifact key under the catalog directory.
const CATALOG_FILE: &str = "catalog.csv";

/// One processed source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub file_identifier: String,
    pub processed_at: DateTime<Utc>,
}

/// Persisted record of which source files have been processed.
pub struct CatalogStore {
    store: Arc<dyn BlobStore>,
    key: String,
}

impl CatalogStore {
    /// Catalog rooted at `directory` inside the given store.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>, directory: &str) -> Self {
        let dir = directory.trim_matches('/');
        let key = if dir.is_empty() {
            CATALOG_FILE.to_string()
        } else {
            format!("{dir}/{CATALOG_FILE}")
        };
        Self { store, key }
    }

    /// Artifact key this catalog reads and writes.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the persisted catalog.
    ///
    /// Returns `Ok(None)` when no catalog exists yet, or when the artifact
    /// is empty or unreadable — the expected bootstrap state, not an error.
    ///
    /// # Errors
    ///
    /// Never fails on a missing or corrupt artifact; reserved for future
    /// backends where listing itself can fail.
    pub fn audit(&self) -> Result<Option<Vec<CatalogEntry>>> {
        let bytes = match self.store.get(&self.key) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(None),
        };
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let mut entries = Vec::new();
        for record in reader.deserialize::<CatalogEntry>() {
            match record {
                Ok(entry) => entries.push(entry),
                // Unparseable artifact degrades to bootstrap-empty.
                Err(err) => {
                    tracing::warn!(key = %self.key, error = %err, "unreadable catalog treated as empty");
                    return Ok(None);
                }
            }
        }
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(entries))
    }

    /// Candidate files minus catalogued identifiers, sorted.
    ///
    /// An empty result means there is nothing new — a terminal, non-error
    /// condition the caller turns into a clean stop.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on storage failure.
    pub fn diff(&self, candidates: &[String]) -> Result<Vec<String>> {
        let catalogued: BTreeSet<String> = match self.audit()? {
            Some(entries) => entries.into_iter().map(|e| e.file_identifier).collect(),
            None => return Ok(dedup_sorted(candidates)),
        };
        Ok(dedup_sorted(candidates)
            .into_iter()
            .filter(|f| !catalogued.contains(f))
            .collect())
    }

    /// Write an initial catalog stamping every file with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::CatalogExists`] when a catalog is already
    /// present and `overwrite` is `false`; write failures propagate.
    pub fn create(&self, files: &[String], overwrite: bool) -> Result<()> {
        if !overwrite && self.store.exists(&self.key) {
            return Err(StateError::CatalogExists(self.key.clone()));
        }
        self.write_entries(&Self::stamp(files))
    }

    /// Append entries for `files` to the existing catalog.
    ///
    /// Read full catalog, concatenate, write back as one overwrite of the
    /// backing artifact; there is no partial remote update.
    ///
    /// # Errors
    ///
    /// Write failures propagate — the catalog must not silently diverge.
    pub fn advance(&self, files: &[String]) -> Result<()> {
        let mut entries = self.audit()?.unwrap_or_default();
        entries.extend(Self::stamp(files));
        self.write_entries(&entries)
    }

    /// Drop every entry whose identifier contains any of `identifiers`
    /// (substring match) and overwrite the catalog.
    ///
    /// Used to roll back entries for files whose load failed, keeping the
    /// catalog consistent with what is actually present downstream.
    ///
    /// # Errors
    ///
    /// Write failures propagate.
    pub fn remove(&self, identifiers: &[String]) -> Result<()> {
        if identifiers.is_empty() {
            return Ok(());
        }
        let entries = self.audit()?.unwrap_or_default();
        let kept: Vec<CatalogEntry> = entries
            .into_iter()
            .filter(|e| !identifiers.iter().any(|id| e.file_identifier.contains(id.as_str())))
            .collect();
        self.write_entries(&kept)
    }

    /// Overwrite the catalog with an empty set. Irreversible; intended only
    /// for controlled re-runs.
    ///
    /// # Errors
    ///
    /// Write failures propagate.
    pub fn clear(&self) -> Result<()> {
        self.write_entries(&[])
    }

    fn stamp(files: &[String]) -> Vec<CatalogEntry> {
        let now = Utc::now();
        dedup_sorted(files)
            .into_iter()
            .map(|file_identifier| CatalogEntry {
                file_identifier,
                processed_at: now,
            })
            .collect()
    }

    fn write_entries(&self, entries: &[CatalogEntry]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for entry in entries {
            writer.serialize(entry)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| StateError::Encode(e.to_string()))?;
        self.store.put(&self.key, &bytes)
    }
}

fn dedup_sorted(files: &[String]) -> Vec<String> {
    let set: BTreeSet<&String> = files.iter().collect();
    set.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;

    fn catalog() -> CatalogStore {
        CatalogStore::new(Arc::new(MemoryBlobStore::new()), "demo")
    }

    fn files(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn audit_on_missing_catalog_is_bootstrap_empty() {
        assert!(catalog().audit().unwrap().is_none());
    }

    #[test]
    fn audit_on_empty_artifact_is_bootstrap_empty() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        store.put("demo/catalog.csv", b"").unwrap();
        let cat = CatalogStore::new(store, "demo");
        assert!(cat.audit().unwrap().is_none());
    }

    #[test]
    fn audit_on_garbage_artifact_is_bootstrap_empty() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        store
            .put("demo/catalog.csv", b"file_identifier,processed_at\nx,not-a-time\n")
            .unwrap();
        let cat = CatalogStore::new(store, "demo");
        assert!(cat.audit().unwrap().is_none());
    }

    #[test]
    fn diff_without_catalog_returns_everything() {
        let all = files(&["b.csv", "a.csv", "a.csv"]);
        assert_eq!(catalog().diff(&all).unwrap(), files(&["a.csv", "b.csv"]));
    }

    #[test]
    fn create_then_diff_is_empty() {
        let cat = catalog();
        let all = files(&["a.csv", "b.csv"]);
        cat.create(&all, false).unwrap();
        assert!(cat.diff(&all).unwrap().is_empty());
    }

    #[test]
    fn diff_returns_only_new_files_and_is_idempotent() {
        let cat = catalog();
        cat.create(&files(&["a.csv"]), false).unwrap();
        let all = files(&["a.csv", "b.csv", "c.csv"]);
        assert_eq!(cat.diff(&all).unwrap(), files(&["b.csv", "c.csv"]));
        assert_eq!(cat.diff(&all).unwrap(), files(&["b.csv", "c.csv"]));
    }

    #[test]
    fn create_refuses_to_replace_without_overwrite() {
        let cat = catalog();
        cat.create(&files(&["a.csv"]), false).unwrap();
        assert!(matches!(
            cat.create(&files(&["b.csv"]), false),
            Err(StateError::CatalogExists(_))
        ));
        cat.create(&files(&["b.csv"]), true).unwrap();
        assert_eq!(cat.diff(&files(&["a.csv", "b.csv"])).unwrap(), files(&["a.csv"]));
    }

    #[test]
    fn advance_appends_to_existing_entries() {
        let cat = catalog();
        cat.create(&files(&["a.csv"]), false).unwrap();
        cat.advance(&files(&["b.csv"])).unwrap();
        let entries = cat.audit().unwrap().unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.file_identifier.as_str()).collect();
        assert_eq!(ids, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn advance_without_catalog_creates_one() {
        let cat = catalog();
        cat.advance(&files(&["a.csv"])).unwrap();
        assert_eq!(cat.audit().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn remove_matches_by_substring() {
        let cat = catalog();
        cat.create(
            &files(&["2024/north/sales.csv", "2024/south/sales.csv", "2024/stock.csv"]),
            false,
        )
        .unwrap();
        cat.remove(&files(&["north", "stock"])).unwrap();
        let entries = cat.audit().unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_identifier, "2024/south/sales.csv");
    }

    #[test]
    fn remove_with_no_identifiers_is_a_no_op() {
        let cat = catalog();
        cat.create(&files(&["a.csv"]), false).unwrap();
        cat.remove(&[]).unwrap();
        assert_eq!(cat.audit().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn clear_empties_the_catalog() {
        let cat = catalog();
        cat.create(&files(&["a.csv", "b.csv"]), false).unwrap();
        cat.clear().unwrap();
        assert!(cat.audit().unwrap().is_none());
        // Everything is new again after a clear.
        assert_eq!(cat.diff(&files(&["a.csv"])).unwrap(), files(&["a.csv"]));
    }

    #[test]
    fn entries_roundtrip_with_timestamps() {
        let cat = catalog();
        cat.create(&files(&["a.csv"]), false).unwrap();
        let entries = cat.audit().unwrap().unwrap();
        assert_eq!(entries[0].file_identifier, "a.csv");
        assert!(entries[0].processed_at <= Utc::now());
    }

    #[test]
    fn root_directory_catalog_key() {
        let cat = CatalogStore::new(Arc::new(MemoryBlobStore::new()), "/");
        assert_eq!(cat.key(), "catalog.csv");
        let cat = CatalogStore::new(Arc::new(MemoryBlobStore::new()), "proj/");
        assert_eq!(cat.key(), "proj/catalog.csv");
    }
}

//! Object-store collaborator trait and its two implementations.
//!
//! [`BlobStore`] is the seam the catalog persists through. Implementations
//! must be `Send + Sync` for use behind `Arc<dyn BlobStore>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, StateError};

/// Named-blob source/sink. Paths are `/`-separated keys relative to the
/// store root.
pub trait BlobStore: Send + Sync {
    /// List blob keys starting with `prefix`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on storage failure.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Read a whole blob.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotFound`] when the key does not exist.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Write a whole blob, replacing any existing content.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on storage failure.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Delete a blob. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on storage failure.
    fn delete(&self, key: &str) -> Result<()>;

    /// Returns `true` when the key exists.
    fn exists(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }
}

/// Directory-rooted blob store.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the root cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::walk(&path, root, out)?;
            } else if let Ok(rel) = path.strip_prefix(root) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

impl BlobStore for FsBlobStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        Self::walk(&self.root, &self.root, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        match std::fs::read(self.resolve(key)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StateError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.resolve(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob store (for testing).
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.blobs.lock().map_err(|_| StateError::LockPoisoned)
    }
}

impl BlobStore for MemoryBlobStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| StateError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn BlobStore`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn BlobStore) {}
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryBlobStore::new();
        store.put("incoming/a.csv", b"x,y\n1,2\n").unwrap();
        assert_eq!(store.get("incoming/a.csv").unwrap(), b"x,y\n1,2\n");
        assert!(store.exists("incoming/a.csv"));
        assert!(!store.exists("incoming/b.csv"));
    }

    #[test]
    fn memory_store_list_filters_by_prefix() {
        let store = MemoryBlobStore::new();
        store.put("incoming/a.csv", b"").unwrap();
        store.put("incoming/b.csv", b"").unwrap();
        store.put("processed/c.csv", b"").unwrap();
        assert_eq!(
            store.list("incoming/").unwrap(),
            vec!["incoming/a.csv", "incoming/b.csv"]
        );
    }

    #[test]
    fn memory_store_missing_key_is_not_found() {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            store.get("nope"),
            Err(StateError::NotFound(ref k)) if k == "nope"
        ));
        store.delete("nope").unwrap();
    }

    #[test]
    fn fs_store_roundtrip_and_nested_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        store.put("deep/nested/key.bin", b"payload").unwrap();
        assert_eq!(store.get("deep/nested/key.bin").unwrap(), b"payload");
        assert_eq!(store.list("deep/").unwrap(), vec!["deep/nested/key.bin"]);
        store.delete("deep/nested/key.bin").unwrap();
        assert!(!store.exists("deep/nested/key.bin"));
    }

    #[test]
    fn fs_store_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        store.delete("never-there").unwrap();
    }
}

//! Persistent "what is already done" state for tabsync.
//!
//! Two stores with deliberately different notions of done:
//!
//! - [`CatalogStore`] tracks *source files* across runs, persisted as a
//!   single catalog artifact in the object store.
//! - [`DedupCache`] tracks *rows written during the in-flight load*,
//!   persisted on local disk and deleted when a load pass finishes.
//!
//! A file can be catalogued while its rows are absent from the cache; the
//! cache only matters within one load invocation.

pub mod blob;
pub mod catalog;
pub mod dedup;
pub mod error;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use catalog::{CatalogEntry, CatalogStore};
pub use dedup::{ChunkDiff, DedupCache};
pub use error::StateError;

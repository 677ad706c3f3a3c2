//! State store error types.

/// Errors produced by catalog and cache operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// File-system I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog artifact could not be encoded or decoded.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Cache artifact could not be encoded.
    #[error("cache encode error: {0}")]
    Encode(String),

    /// Blob does not exist.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// A catalog already exists and overwrite was not requested.
    #[error("catalog already exists at {0}")]
    CatalogExists(String),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("blob store lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

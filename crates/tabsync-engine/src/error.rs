//! Pipeline error model.
//!
//! `Store` wraps a typed [`StoreError`] with retry metadata; everything
//! else is never retryable at the loader level. `NothingNew` is a terminal
//! clean-stop condition, not a failure — the CLI maps it to exit code 0.

use tabsync_state::StateError;
use tabsync_types::error::StoreError;

/// Categorized pipeline error for retry and exit-code decisions.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Typed destination-store error with retry metadata.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Catalog or cache state failure.
    #[error(transparent)]
    State(#[from] StateError),

    /// A source file could not be parsed into a tabular batch.
    #[error("failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    /// Diff against the catalog yielded no new files. Terminal, clean stop.
    #[error("there is nothing new to load")]
    NothingNew,

    /// Host-side error (config, I/O wiring).
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl PipelineError {
    /// Returns `true` if this wraps a store error marked retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.retryable,
            _ => false,
        }
    }

    /// Returns `true` for the terminal nothing-new condition.
    #[must_use]
    pub fn is_clean_stop(&self) -> bool {
        matches!(self, Self::NothingNew)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_store_error_is_retryable() {
        let err = PipelineError::from(StoreError::transient_db("DEADLOCK", "deadlock detected"));
        assert!(err.is_retryable());
        assert!(!err.is_clean_stop());
    }

    #[test]
    fn schema_store_error_is_not_retryable() {
        let err = PipelineError::from(StoreError::schema("BAD_DDL", "rejected"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn nothing_new_is_a_clean_stop() {
        let err = PipelineError::NothingNew;
        assert!(err.is_clean_stop());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "there is nothing new to load");
    }

    #[test]
    fn state_errors_are_never_retryable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = PipelineError::from(StateError::Io(io));
        assert!(!err.is_retryable());
    }
}

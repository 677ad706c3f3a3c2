//! Structured error model for destination-store operations.
//!
//! [`StoreError`] carries classification and retry metadata. Construct via
//! category-specific factory methods; the loader's retry loop keys off
//! [`StoreError::retryable`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a destination-store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid configuration.
    Config,
    /// Transient network error (retryable).
    TransientNetwork,
    /// Transient database error (retryable).
    TransientDb,
    /// Schema mismatch, DDL rejection, naming conflict.
    Schema,
    /// Invalid or corrupt data.
    Data,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::TransientNetwork => "transient_network",
            Self::TransientDb => "transient_db",
            Self::Schema => "schema",
            Self::Data => "data",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Structured error from a destination-store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct StoreError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl StoreError {
    fn new(
        category: ErrorCategory,
        retryable: bool,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Configuration error (not retryable).
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, false, code, message)
    }

    /// Transient network error (retryable).
    #[must_use]
    pub fn transient_network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::TransientNetwork, true, code, message)
    }

    /// Transient database error (retryable).
    #[must_use]
    pub fn transient_db(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::TransientDb, true, code, message)
    }

    /// Schema or DDL error (not retryable; fatal for the affected table).
    #[must_use]
    pub fn schema(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Schema, false, code, message)
    }

    /// Data error (not retryable).
    #[must_use]
    pub fn data(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Data, false, code, message)
    }

    /// Internal error (not retryable).
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, false, code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(StoreError::transient_network("TIMEOUT", "timed out").retryable);
        assert!(StoreError::transient_db("DEADLOCK", "deadlock detected").retryable);
    }

    #[test]
    fn schema_and_config_errors_are_not_retryable() {
        assert!(!StoreError::schema("DUPLICATE_TABLE", "already exists").retryable);
        assert!(!StoreError::config("MISSING_HOST", "host is required").retryable);
    }

    #[test]
    fn display_format() {
        let err = StoreError::transient_db("CONN_RESET", "connection reset by peer");
        assert_eq!(
            err.to_string(),
            "[transient_db] CONN_RESET: connection reset by peer"
        );
    }

    #[test]
    fn serde_roundtrip() {
        let err = StoreError::schema("BAD_DDL", "syntax error");
        let json = serde_json::to_string(&err).unwrap();
        let back: StoreError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}

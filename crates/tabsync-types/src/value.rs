//! Cell values and null normalization.
//!
//! [`Value`] is the single cell type flowing through the loader. Missing
//! data arrives in several spellings (empty string, the `"<NA>"`
//! placeholder, float NaN); [`Value::normalize`] collapses them all to
//! [`Value::Null`] so that two logically-identical rows compare and hash
//! identically. Row fingerprints are built from normalized values only.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Textual placeholder for missing values in source files.
pub const NA_PLACEHOLDER: &str = "<NA>";

/// A single cell value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Missing value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer (covers both INTEGER and BIGINT columns).
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Naive timestamp (no timezone; source files carry none).
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Collapse all missing-value spellings into [`Value::Null`].
    ///
    /// Blank or whitespace-only strings, the `"<NA>"` placeholder, and NaN
    /// floats are all the same "missing" datum. Must run before
    /// fingerprinting and before insertion.
    #[must_use]
    pub fn normalize(self) -> Self {
        match self {
            Self::Float(f) if f.is_nan() => Self::Null,
            Self::Text(ref s) if s.trim().is_empty() || s == NA_PLACEHOLDER => Self::Null,
            other => other,
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// String length of a text value, 0 for everything else.
    ///
    /// Used by text-column sizing; non-text cells contribute nothing.
    #[must_use]
    pub fn text_len(&self) -> usize {
        match self {
            Self::Text(s) => s.chars().count(),
            _ => 0,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            // Bit equality: NaN never reaches here post-normalization.
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::Timestamp(ts) => ts.hash(state),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(ts) => write!(f, "{ts}"),
        }
    }
}

/// An ordered tuple of a row's normalized values, the dedup key.
pub type RowFingerprint = Vec<Value>;

/// Normalize every cell of a row.
#[must_use]
pub fn normalize_row(row: Vec<Value>) -> Vec<Value> {
    row.into_iter().map(Value::normalize).collect()
}

//! Shared model types for tabsync.
//!
//! Pure data types used across the state and engine crates: the cell
//! [`value::Value`] model with its null-normalization rules, the tabular
//! batch model, and the structured [`error::StoreError`] with retry
//! classification. Kept dependency-light so every crate can share them
//! without cycles.

pub mod batch;
pub mod error;
pub mod value;

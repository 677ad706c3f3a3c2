//! Tabular batch model: the unit of work handed to the bulk loader.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Semantic type of a column, mapped to a SQL type at table creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// 64-bit float column.
    Float,
    /// 32-bit integer column.
    Integer,
    /// 64-bit integer column.
    BigInt,
    /// Date/time column.
    Timestamp,
    /// Free text column.
    Text,
    /// Boolean column.
    Boolean,
}

impl ColumnKind {
    /// Stable lowercase name, used in logs and config.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Timestamp => "timestamp",
            Self::Text => "text",
            Self::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A normalized table: ordered columns plus row tuples.
///
/// Rows are positional; `rows[i].len()` must equal `columns.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBatch {
    /// Destination table name.
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl TableBatch {
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the batch carries no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Column kinds in declaration order.
    #[must_use]
    pub fn column_kinds(&self) -> Vec<ColumnKind> {
        self.columns.iter().map(|c| c.kind).collect()
    }
}

/// Resolved destination layout for one table: column names paired with
/// concrete SQL type strings. Derived once, at the first chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<(String, String)>,
}

impl TableSpec {
    /// Render the column list of a CREATE TABLE statement body.
    #[must_use]
    pub fn columns_ddl(&self) -> String {
        self.columns
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_accessors() {
        let mut batch = TableBatch::new(
            "sales",
            vec![
                Column::new("id", ColumnKind::BigInt),
                Column::new("region", ColumnKind::Text),
            ],
        );
        assert!(batch.is_empty());
        batch
            .rows
            .push(vec![Value::Int(1), Value::Text("north".into())]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.column_names(), vec!["id", "region"]);
        assert_eq!(
            batch.column_kinds(),
            vec![ColumnKind::BigInt, ColumnKind::Text]
        );
    }

    #[test]
    fn table_spec_renders_ddl_body() {
        let spec = TableSpec {
            name: "sales".into(),
            columns: vec![
                ("id".into(), "BIGINT".into()),
                ("region".into(), "VARCHAR(32)".into()),
            ],
        };
        assert_eq!(spec.columns_ddl(), "id BIGINT, region VARCHAR(32)");
    }

    #[test]
    fn column_kind_display() {
        assert_eq!(ColumnKind::BigInt.to_string(), "bigint");
        assert_eq!(ColumnKind::Timestamp.to_string(), "timestamp");
    }
}

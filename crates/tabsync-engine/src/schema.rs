//! Column-kind to SQL type mapping and target-table layout inference.
//!
//! Layout is derived once per table, at the first chunk, and not revisited
//! for later chunks of the same load. Text columns are sized from the
//! maximum string length observed in that first chunk — columns whose
//! longest value appears in a later chunk risk truncation. That is a known
//! limitation of the one-shot sizing, kept deliberately; `strict_lengths`
//! sizes from the whole batch instead.

use tabsync_types::batch::{Column, ColumnKind, TableSpec};
use tabsync_types::value::Value;

/// Fixed SQL type for every non-text column kind.
#[must_use]
pub fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Float => "DOUBLE PRECISION",
        ColumnKind::Integer => "INTEGER",
        ColumnKind::BigInt => "BIGINT",
        ColumnKind::Timestamp => "TIMESTAMP",
        ColumnKind::Text => "VARCHAR", // length resolved per table
        ColumnKind::Boolean => "BOOLEAN",
    }
}

/// Derives a [`TableSpec`] from a tabular batch's columns and sample rows.
#[derive(Debug, Clone, Copy)]
pub struct SchemaInferencer {
    /// Fallback VARCHAR length.
    pub char_length: usize,
    /// Always use `char_length`, ignoring observed maxima.
    pub override_length: bool,
}

impl SchemaInferencer {
    #[must_use]
    pub fn new(char_length: usize, override_length: bool) -> Self {
        Self {
            char_length,
            override_length,
        }
    }

    /// Map every column through the fixed type mapping; size text columns
    /// from `rows` (the first chunk, or the whole batch in strict mode).
    #[must_use]
    pub fn infer(&self, table: &str, columns: &[Column], rows: &[Vec<Value>]) -> TableSpec {
        let resolved = columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let ty = if column.kind == ColumnKind::Text {
                    format!("VARCHAR({})", self.text_length(idx, rows))
                } else {
                    sql_type(column.kind).to_string()
                };
                (column.name.clone(), ty)
            })
            .collect();
        TableSpec {
            name: table.to_string(),
            columns: resolved,
        }
    }

    /// Observed maximum length of a text column, or `char_length` when the
    /// maximum is zero or lengths are overridden.
    fn text_length(&self, column_idx: usize, rows: &[Vec<Value>]) -> usize {
        let observed = rows
            .iter()
            .filter_map(|row| row.get(column_idx))
            .map(Value::text_len)
            .max()
            .unwrap_or(0);
        if observed == 0 || self.override_length {
            self.char_length
        } else {
            observed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("id", ColumnKind::BigInt),
            Column::new("region", ColumnKind::Text),
            Column::new("amount", ColumnKind::Float),
            Column::new("active", ColumnKind::Boolean),
            Column::new("seen_at", ColumnKind::Timestamp),
            Column::new("bucket", ColumnKind::Integer),
        ]
    }

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec![
                Value::Int(1),
                Value::Text("north".into()),
                Value::Float(1.5),
                Value::Bool(true),
                Value::Null,
                Value::Int(3),
            ],
            vec![
                Value::Int(2),
                Value::Text("northeast".into()),
                Value::Null,
                Value::Bool(false),
                Value::Null,
                Value::Int(4),
            ],
        ]
    }

    #[test]
    fn fixed_mapping_for_non_text_kinds() {
        let spec = SchemaInferencer::new(256, true).infer("t", &columns(), &rows());
        let types: Vec<&str> = spec.columns.iter().map(|(_, ty)| ty.as_str()).collect();
        assert_eq!(
            types,
            vec![
                "BIGINT",
                "VARCHAR(256)",
                "DOUBLE PRECISION",
                "BOOLEAN",
                "TIMESTAMP",
                "INTEGER"
            ]
        );
    }

    #[test]
    fn text_sized_to_longest_observed_value() {
        let spec = SchemaInferencer::new(256, false).infer("t", &columns(), &rows());
        // "northeast" is 9 chars.
        assert_eq!(spec.columns[1].1, "VARCHAR(9)");
    }

    #[test]
    fn zero_observed_length_falls_back_to_char_length() {
        let cols = vec![Column::new("note", ColumnKind::Text)];
        let all_null = vec![vec![Value::Null], vec![Value::Null]];
        let spec = SchemaInferencer::new(128, false).infer("t", &cols, &all_null);
        assert_eq!(spec.columns[0].1, "VARCHAR(128)");
    }

    #[test]
    fn override_wins_over_observed_length() {
        let cols = vec![Column::new("note", ColumnKind::Text)];
        let rows = vec![vec![Value::Text("a rather long note".into())]];
        let spec = SchemaInferencer::new(64, true).infer("t", &cols, &rows);
        assert_eq!(spec.columns[0].1, "VARCHAR(64)");
    }

    #[test]
    fn empty_rows_fall_back_to_char_length() {
        let cols = vec![Column::new("note", ColumnKind::Text)];
        let spec = SchemaInferencer::new(32, false).infer("t", &cols, &[]);
        assert_eq!(spec.columns[0].1, "VARCHAR(32)");
    }
}

//! CSV blob to [`TableBatch`] reader.
//!
//! Thin parsing collaborator: reads headers, sniffs a kind per column from
//! the non-missing cells, and materializes typed rows. Missing spellings
//! (empty, whitespace, `"<NA>"`) become [`Value::Null`] at parse time.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use tabsync_types::batch::{Column, ColumnKind, TableBatch};
use tabsync_types::value::{Value, NA_PLACEHOLDER};

use crate::config::ColumnPolicy;
use crate::error::PipelineError;

/// `YYYY-MM-DD` anywhere in the file name.
static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid period regex"));

/// Fallback: a trailing plain year.
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([1-2][0-9]{3})").expect("valid year regex"));

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse one CSV blob into a batch named after the file stem.
///
/// # Errors
///
/// Returns [`PipelineError::Parse`] when the content is not valid CSV or
/// has no header row.
pub fn read_batch(bytes: &[u8], file: &str) -> Result<TableBatch, PipelineError> {
    let parse_err = |message: String| PipelineError::Parse {
        file: file.to_string(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| parse_err(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() {
        return Err(parse_err("no header row".to_string()));
    }

    let mut cells: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| parse_err(e.to_string()))?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        // Short rows pad with missing cells.
        row.resize(headers.len(), String::new());
        row.truncate(headers.len());
        cells.push(row);
    }

    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| Column::new(name.clone(), sniff_kind(&cells, idx)))
        .collect();

    let rows = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&columns)
                .map(|(cell, column)| coerce_cell(&cell, column.kind))
                .collect()
        })
        .collect();

    Ok(TableBatch {
        name: table_name(file),
        columns,
        rows,
    })
}

/// Destination table name from the file stem: lowercase, non-alphanumeric
/// runs collapsed to `_`.
#[must_use]
pub fn table_name(file: &str) -> String {
    let segment = file.rsplit('/').next().unwrap_or(file);
    let stem = segment
        .rsplit_once('.')
        .map_or(segment, |(stem, _)| stem)
        .to_string();
    let mut name = String::with_capacity(stem.len());
    let mut last_was_sep = true;
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() {
            name.extend(ch.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            name.push('_');
            last_was_sep = true;
        }
    }
    let name = name.trim_end_matches('_').to_string();
    if name.is_empty() {
        "table".to_string()
    } else {
        name
    }
}

fn is_missing(cell: &str) -> bool {
    cell.trim().is_empty() || cell == NA_PLACEHOLDER
}

/// Pick the narrowest kind that parses every non-missing cell of a column.
fn sniff_kind(cells: &[Vec<String>], idx: usize) -> ColumnKind {
    let values: Vec<&str> = cells
        .iter()
        .filter_map(|row| row.get(idx))
        .map(String::as_str)
        .filter(|cell| !is_missing(cell))
        .collect();
    if values.is_empty() {
        return ColumnKind::Text;
    }

    if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        let wide = values
            .iter()
            .filter_map(|v| v.parse::<i64>().ok())
            .any(|v| i32::try_from(v).is_err());
        return if wide {
            ColumnKind::BigInt
        } else {
            ColumnKind::Integer
        };
    }
    if values.iter().all(|v| v.parse::<f64>().is_ok()) {
        return ColumnKind::Float;
    }
    if values.iter().all(|v| parse_bool(v).is_some()) {
        return ColumnKind::Boolean;
    }
    if values.iter().all(|v| parse_timestamp(v).is_some()) {
        return ColumnKind::Timestamp;
    }
    ColumnKind::Text
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(cell, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Convert one cell to a value of the column's kind. Cells that stopped
/// parsing after sniffing (short rows, stray text) degrade to text or null
/// rather than failing the file.
fn coerce_cell(cell: &str, kind: ColumnKind) -> Value {
    if is_missing(cell) {
        return Value::Null;
    }
    match kind {
        ColumnKind::Integer | ColumnKind::BigInt => cell
            .parse::<i64>()
            .map_or_else(|_| Value::Text(cell.to_string()), Value::Int),
        ColumnKind::Float => cell
            .parse::<f64>()
            .map_or_else(|_| Value::Text(cell.to_string()), Value::Float),
        ColumnKind::Boolean => {
            parse_bool(cell).map_or_else(|| Value::Text(cell.to_string()), Value::Bool)
        }
        ColumnKind::Timestamp => {
            parse_timestamp(cell).map_or_else(|| Value::Text(cell.to_string()), Value::Timestamp)
        }
        ColumnKind::Text => Value::Text(cell.to_string()),
    }
}

/// Append a `periodo` text column extracted from the file name, unless the
/// batch already has one.
///
/// Looks for `YYYY-MM-DD` first, then a plain year; stamps the empty
/// string (normalized to null at insert) when neither matches.
pub fn stamp_period(batch: &mut TableBatch, file: &str) {
    if batch.columns.iter().any(|c| c.name == "periodo") {
        return;
    }
    let period = PERIOD_RE
        .find(file)
        .map(|m| m.as_str().to_string())
        .or_else(|| YEAR_RE.find(file).map(|m| m.as_str().to_string()))
        .unwrap_or_default();
    batch.columns.push(Column::new("periodo", ColumnKind::Text));
    for row in &mut batch.rows {
        row.push(Value::Text(period.clone()));
    }
}

/// Apply the explicit rename/drop policy to a batch.
pub fn apply_column_policy(batch: &mut TableBatch, policy: &ColumnPolicy) {
    if !policy.drop.is_empty() {
        let keep: Vec<bool> = batch
            .columns
            .iter()
            .map(|c| !policy.drop.contains(&c.name))
            .collect();
        let old = std::mem::take(&mut batch.columns);
        batch.columns = old
            .into_iter()
            .zip(&keep)
            .filter_map(|(c, &k)| k.then_some(c))
            .collect();
        for row in &mut batch.rows {
            let mut idx = 0;
            row.retain(|_| {
                let kept = keep[idx];
                idx += 1;
                kept
            });
        }
    }
    for column in &mut batch.columns {
        if let Some(new_name) = policy.rename.get(&column.name) {
            column.name.clone_from(new_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_typed_columns() {
        let csv = b"id,amount,active,seen,region\n1,1.5,true,2024-03-01,north\n2,2.5,false,2024-03-02,south\n";
        let batch = read_batch(csv, "incoming/sales-2024.csv").unwrap();
        assert_eq!(batch.name, "sales_2024");
        let kinds = batch.column_kinds();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Integer,
                ColumnKind::Float,
                ColumnKind::Boolean,
                ColumnKind::Timestamp,
                ColumnKind::Text
            ]
        );
        assert_eq!(batch.rows[0][0], Value::Int(1));
        assert_eq!(batch.rows[1][4], Value::Text("south".into()));
    }

    #[test]
    fn wide_integers_sniff_as_bigint() {
        let csv = b"id\n1\n4294967296\n";
        let batch = read_batch(csv, "ids.csv").unwrap();
        assert_eq!(batch.columns[0].kind, ColumnKind::BigInt);
    }

    #[test]
    fn missing_spellings_parse_as_null() {
        let csv = b"id,note\n1,\n2,<NA>\n3,   \n";
        let batch = read_batch(csv, "notes.csv").unwrap();
        assert!(batch.rows.iter().all(|r| r[1].is_null()));
        // All-missing column falls back to text.
        assert_eq!(batch.columns[1].kind, ColumnKind::Text);
    }

    #[test]
    fn short_rows_pad_with_nulls() {
        let csv = b"a,b,c\n1,2\n";
        let batch = read_batch(csv, "short.csv").unwrap();
        assert_eq!(batch.rows[0].len(), 3);
        assert!(batch.rows[0][2].is_null());
    }

    #[test]
    fn mixed_column_degrades_to_text() {
        let csv = b"v\n1\ntwo\n";
        let batch = read_batch(csv, "mixed.csv").unwrap();
        assert_eq!(batch.columns[0].kind, ColumnKind::Text);
        assert_eq!(batch.rows[0][0], Value::Text("1".into()));
    }

    #[test]
    fn table_name_sanitizes() {
        assert_eq!(table_name("incoming/2024 Sales Report.csv"), "2024_sales_report");
        assert_eq!(table_name("a/b/c.d.csv"), "c_d");
        assert_eq!(table_name("...csv"), "table");
    }

    #[test]
    fn stamp_period_prefers_full_date() {
        let csv = b"id\n1\n";
        let mut batch = read_batch(csv, "report-2024-03-01.csv").unwrap();
        stamp_period(&mut batch, "report-2024-03-01.csv");
        assert_eq!(batch.columns.last().unwrap().name, "periodo");
        assert_eq!(batch.rows[0][1], Value::Text("2024-03-01".into()));
    }

    #[test]
    fn stamp_period_falls_back_to_year() {
        let csv = b"id\n1\n";
        let mut batch = read_batch(csv, "report2023.csv").unwrap();
        stamp_period(&mut batch, "report2023.csv");
        assert_eq!(batch.rows[0][1], Value::Text("2023".into()));
    }

    #[test]
    fn stamp_period_respects_existing_column() {
        let csv = b"periodo,id\n2022,1\n";
        let mut batch = read_batch(csv, "report2023.csv").unwrap();
        stamp_period(&mut batch, "report2023.csv");
        assert_eq!(batch.columns.len(), 2);
        assert_eq!(batch.rows[0][0], Value::Int(2022));
    }

    #[test]
    fn column_policy_drops_then_renames() {
        let csv = b"keep,scratch,old\n1,x,a\n2,y,b\n";
        let mut batch = read_batch(csv, "t.csv").unwrap();
        let mut policy = ColumnPolicy::default();
        policy.drop.push("scratch".into());
        policy.rename.insert("old".into(), "new".into());
        apply_column_policy(&mut batch, &policy);
        assert_eq!(batch.column_names(), vec!["keep", "new"]);
        assert_eq!(batch.rows[0], vec![Value::Int(1), Value::Text("a".into())]);
    }
}

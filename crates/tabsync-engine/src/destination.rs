//! Relational destination seam and its PostgreSQL implementation.
//!
//! [`SqlDestination`] hands out one [`SqlConnection`] per insert attempt —
//! the loader opens a fresh connection for every attempt and drops it when
//! the attempt resolves. No pooling, no cross-chunk transaction.

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use pg_escape::quote_identifier;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use tabsync_types::batch::{Column, ColumnKind, TableSpec};
use tabsync_types::error::StoreError;
use tabsync_types::value::Value;

use crate::config::DatabaseConfig;

/// Maximum rows per multi-value INSERT statement (PG parameter limit).
const MAX_STATEMENT_ROWS: usize = 1000;

/// One live connection to the destination store.
#[async_trait]
pub trait SqlConnection: Send {
    /// Names of existing tables in the target schema.
    async fn list_tables(&self) -> Result<Vec<String>, StoreError>;

    /// Execute the CREATE statement for a resolved table layout.
    async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError>;

    /// Insert rows via parameterized multi-row INSERT. Returns rows written.
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[Column],
        rows: &[Vec<Value>],
    ) -> Result<u64, StoreError>;
}

/// Connection factory for the destination store.
#[async_trait]
pub trait SqlDestination: Send + Sync {
    /// Open a fresh connection.
    async fn connect(&self) -> Result<Box<dyn SqlConnection>, StoreError>;
}

// ── PostgreSQL implementation ────────────────────────────────────────

/// PostgreSQL destination.
pub struct PgDestination {
    config: DatabaseConfig,
}

impl PgDestination {
    #[must_use]
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SqlDestination for PgDestination {
    async fn connect(&self) -> Result<Box<dyn SqlConnection>, StoreError> {
        let (client, connection) =
            tokio_postgres::connect(&self.config.connection_string(), NoTls)
                .await
                .map_err(|e| classify_pg_error("connect", &e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres connection task ended with error");
            }
        });

        Ok(Box::new(PgConnection {
            client,
            schema: self.config.schema.clone(),
        }))
    }
}

struct PgConnection {
    client: tokio_postgres::Client,
    schema: String,
}

#[async_trait]
impl SqlConnection for PgConnection {
    async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = $1 ORDER BY table_name",
                &[&self.schema],
            )
            .await
            .map_err(|e| classify_pg_error("list_tables", &e))?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError> {
        let columns = spec
            .columns
            .iter()
            .map(|(name, ty)| format!("{} {ty}", quote_identifier(name)))
            .collect::<Vec<_>>()
            .join(", ");
        let ddl = format!(
            "CREATE TABLE {} ({columns})",
            qualified_name(&self.schema, &spec.name)
        );
        tracing::debug!(ddl = %ddl, "creating table");
        self.client
            .execute(&ddl, &[])
            .await
            .map_err(|e| classify_pg_error("create_table", &e))?;
        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[Column],
        rows: &[Vec<Value>],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let qualified = qualified_name(&self.schema, table);
        let col_list = columns
            .iter()
            .map(|c| quote_identifier(&c.name).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        let kinds: Vec<ColumnKind> = columns.iter().map(|c| c.kind).collect();

        let mut total_rows = 0u64;
        for statement_rows in rows.chunks(MAX_STATEMENT_ROWS) {
            let mut sql = format!("INSERT INTO {qualified} ({col_list}) VALUES ");
            let mut params: Vec<SqlParam> =
                Vec::with_capacity(statement_rows.len() * kinds.len());

            for (row_idx, row) in statement_rows.iter().enumerate() {
                if row_idx > 0 {
                    sql.push_str(", ");
                }
                sql.push('(');
                for (pos, (kind, value)) in kinds.iter().zip(row.iter()).enumerate() {
                    if pos > 0 {
                        sql.push_str(", ");
                    }
                    params.push(bind_value(*kind, value)?);
                    let _ = write!(sql, "${}", params.len());
                }
                sql.push(')');
            }

            let param_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(SqlParam::as_tosql).collect();
            self.client
                .execute(&sql, &param_refs)
                .await
                .map_err(|e| classify_pg_error("insert_rows", &e))?;
            total_rows += statement_rows.len() as u64;
        }

        Ok(total_rows)
    }
}

/// Build a schema-qualified table name: `"schema"."table"`.
#[must_use]
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

// ── Parameter binding ────────────────────────────────────────────────

/// Owned SQL parameter, typed per destination column.
#[derive(Debug)]
enum SqlParam {
    I32(Option<i32>),
    I64(Option<i64>),
    F64(Option<f64>),
    Bool(Option<bool>),
    Text(Option<String>),
    Timestamp(Option<NaiveDateTime>),
}

impl SqlParam {
    fn as_tosql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::I32(v) => v,
            Self::I64(v) => v,
            Self::F64(v) => v,
            Self::Bool(v) => v,
            Self::Text(v) => v,
            Self::Timestamp(v) => v,
        }
    }
}

/// Coerce a cell into a parameter for its column kind.
#[allow(clippy::cast_precision_loss)]
fn bind_value(kind: ColumnKind, value: &Value) -> Result<SqlParam, StoreError> {
    let param = match (kind, value) {
        (ColumnKind::Integer, Value::Null) => SqlParam::I32(None),
        (ColumnKind::Integer, Value::Int(i)) => {
            let narrowed = i32::try_from(*i).map_err(|_| {
                StoreError::data("INT_OVERFLOW", format!("{i} does not fit an INTEGER column"))
            })?;
            SqlParam::I32(Some(narrowed))
        }
        (ColumnKind::BigInt, Value::Null) => SqlParam::I64(None),
        (ColumnKind::BigInt, Value::Int(i)) => SqlParam::I64(Some(*i)),
        (ColumnKind::Float, Value::Null) => SqlParam::F64(None),
        (ColumnKind::Float, Value::Float(f)) => SqlParam::F64(Some(*f)),
        (ColumnKind::Float, Value::Int(i)) => SqlParam::F64(Some(*i as f64)),
        (ColumnKind::Boolean, Value::Null) => SqlParam::Bool(None),
        (ColumnKind::Boolean, Value::Bool(b)) => SqlParam::Bool(Some(*b)),
        (ColumnKind::Timestamp, Value::Null) => SqlParam::Timestamp(None),
        (ColumnKind::Timestamp, Value::Timestamp(ts)) => SqlParam::Timestamp(Some(*ts)),
        (ColumnKind::Text, Value::Null) => SqlParam::Text(None),
        (ColumnKind::Text, other) => SqlParam::Text(Some(other.to_string())),
        (kind, value) => {
            return Err(StoreError::data(
                "TYPE_MISMATCH",
                format!("cannot bind {value:?} to a {kind} column"),
            ))
        }
    };
    Ok(param)
}

// ── Error classification ─────────────────────────────────────────────

/// Map a tokio-postgres error onto the transient/fatal taxonomy.
fn classify_pg_error(operation: &str, error: &tokio_postgres::Error) -> StoreError {
    if error.is_closed() {
        return StoreError::transient_network(
            "CONNECTION_CLOSED",
            format!("{operation}: connection closed: {error}"),
        );
    }

    let Some(db_error) = error.as_db_error() else {
        // I/O level failure (reset, timeout) with no server response.
        return StoreError::transient_network(
            "CONNECTION_FAILED",
            format!("{operation}: {error}"),
        );
    };

    let code = db_error.code().code();
    let message = format!(
        "{operation}: {} (sqlstate={} severity={})",
        db_error.message(),
        code,
        db_error.severity()
    );

    match code {
        // Connection exceptions.
        c if c.starts_with("08") => StoreError::transient_network(c.to_string(), message),
        // Serialization failure / deadlock, insufficient resources,
        // operator-initiated shutdown: all worth a retry.
        "40001" | "40P01" | "57P01" => StoreError::transient_db(code.to_string(), message),
        c if c.starts_with("53") => StoreError::transient_db(c.to_string(), message),
        // Integrity violations: the data is wrong, not the connection.
        c if c.starts_with("23") => StoreError::data(c.to_string(), message),
        // Syntax errors, naming conflicts, privilege problems.
        c if c.starts_with("42") => StoreError::schema(c.to_string(), message),
        c => StoreError::internal(c.to_string(), message),
    }
}

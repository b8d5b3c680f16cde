//! Embedded DuckDB backend.
//!
//! Reference tables use batched multi-row INSERTs; occurrence tables use the
//! Appender API inside an explicit transaction so an aborted stream leaves
//! nothing behind.

use super::{column_list, CopySink, Storage};
use crate::config::SessionTuning;
use crate::error::{BackendError, LoadError, LoadResult};
use duckdb::types::{TimeUnit, Value};
use duckdb::{Appender, Connection, ToSql};
use seed_data_gen::{Dialect, Row, Schema, SqlValue, TableData, TableId};
use std::path::Path;
use tracing::{debug, info, warn};

/// Rows per generated INSERT statement
const INSERT_BATCH_ROWS: usize = 1_000;

pub struct DuckDbStorage {
    conn: Connection,
    target: String,
}

impl DuckDbStorage {
    /// Open a database file, or an in-memory database when `path` is `None`
    pub fn open(path: Option<&Path>, memory_limit: Option<&str>) -> LoadResult<Self> {
        let target = match path {
            Some(p) => format!("duckdb:{}", p.display()),
            None => "duckdb::memory:".to_string(),
        };
        let connection_error = |source: duckdb::Error| LoadError::Connection {
            target: target.clone(),
            source: source.into(),
        };

        let conn = match path {
            Some(p) => Connection::open(p),
            None => Connection::open_in_memory(),
        }
        .map_err(connection_error)?;

        if let Some(limit) = memory_limit {
            conn.execute(&format!("SET memory_limit = '{}'", limit), [])
                .map_err(connection_error)?;
        }

        info!("Opened {}", target);
        Ok(Self { conn, target })
    }

    pub fn open_in_memory() -> LoadResult<Self> {
        Self::open(None, None)
    }

    /// Underlying connection, for ad-hoc queries
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Generate a batched INSERT statement from row values
fn generate_batch_insert(table: TableId, rows: &[Row]) -> String {
    let mut sql = format!("INSERT INTO {} ({}) VALUES\n", table.name(), column_list(table));

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            sql.push_str(",\n");
        }
        sql.push('(');
        for (j, value) in row.iter().enumerate() {
            if j > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&value.to_sql_literal());
        }
        sql.push(')');
    }
    sql.push(';');

    sql
}

/// Appender value for a generated column
fn to_duckdb_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(n) => Value::BigInt(*n),
        SqlValue::Float(n) => Value::Double(*n),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Uuid(id) => Value::Text(id.hyphenated().to_string()),
        SqlValue::Json(doc) => Value::Text(doc.to_string()),
        SqlValue::Timestamp(ts) => Value::Timestamp(TimeUnit::Microsecond, ts.timestamp_micros()),
    }
}

impl Storage for DuckDbStorage {
    type Sink<'a> = DuckDbSink<'a>;

    fn target(&self) -> String {
        self.target.clone()
    }

    async fn apply_tuning(&mut self, _tuning: &SessionTuning) -> Result<(), BackendError> {
        debug!("Session tuning does not apply to DuckDB, skipping");
        Ok(())
    }

    async fn create_schema(&mut self, schema: &Schema) -> Result<(), BackendError> {
        self.conn
            .execute_batch(&schema.to_ddl(Dialect::DuckDb))?;
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), BackendError> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    async fn insert_rows(&mut self, data: &TableData) -> Result<u64, BackendError> {
        let mut inserted = 0;
        for chunk in data.rows.chunks(INSERT_BATCH_ROWS) {
            let sql = generate_batch_insert(data.table, chunk);
            inserted += self.conn.execute(&sql, [])? as u64;
        }
        Ok(inserted)
    }

    async fn commit(&mut self) -> Result<(), BackendError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), BackendError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    async fn copy_in(&mut self, table: TableId) -> Result<DuckDbSink<'_>, BackendError> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        let appender = match self.conn.appender(table.name()) {
            Ok(appender) => appender,
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!("Rollback after failed appender open: {}", rollback);
                }
                return Err(e.into());
            }
        };

        Ok(DuckDbSink {
            conn: &self.conn,
            appender,
            rows: 0,
        })
    }

    async fn count_rows(&mut self, table: TableId) -> Result<i64, BackendError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    async fn analyze(&mut self) -> Result<(), BackendError> {
        self.conn.execute_batch("ANALYZE")?;
        Ok(())
    }

    async fn close(self) -> Result<(), BackendError> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}

/// Appender-backed stream, committed on finish
pub struct DuckDbSink<'a> {
    conn: &'a Connection,
    appender: Appender<'a>,
    rows: u64,
}

impl CopySink for DuckDbSink<'_> {
    async fn send(&mut self, rows: &[Row]) -> Result<(), BackendError> {
        for row in rows {
            let values: Vec<Value> = row.iter().map(to_duckdb_value).collect();
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
            self.appender.append_row(params.as_slice())?;
        }
        self.rows += rows.len() as u64;
        Ok(())
    }

    async fn finish(self) -> Result<u64, BackendError> {
        let DuckDbSink {
            conn,
            mut appender,
            rows,
        } = self;

        if let Err(e) = appender.flush() {
            drop(appender);
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                warn!("Rollback after failed flush: {}", rollback);
            }
            return Err(e.into());
        }
        drop(appender);

        conn.execute_batch("COMMIT")?;
        Ok(rows)
    }

    async fn abort(self, reason: &str) -> Result<(), BackendError> {
        debug!("Aborting appender stream: {}", reason);
        let DuckDbSink { conn, appender, .. } = self;
        drop(appender);
        conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

//! PostgreSQL backend over a single `sqlx` connection.
//!
//! Occurrence tables are loaded with `COPY ... FROM STDIN` in text format.
//! A COPY statement is atomic on its own, so aborting it discards every row
//! sent so far without an explicit transaction.

use super::{column_list, rows_per_statement, CopySink, Storage};
use crate::config::{DatabaseConfig, SessionTuning};
use crate::error::{BackendError, LoadError, LoadResult};
use seed_data_gen::{encode_copy_rows, Dialect, Row, Schema, SqlValue, TableData, TableId};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgCopyIn};
use sqlx::query_builder::Separated;
use sqlx::types::Json;
use sqlx::{Connection, Postgres, QueryBuilder};
use std::fmt::Display;
use tracing::{debug, info};

/// Protocol limit on bind parameters per statement
const MAX_BIND_PARAMS: usize = 65_535;

pub struct PgStorage {
    conn: PgConnection,
    target: String,
}

impl PgStorage {
    pub async fn connect(config: &DatabaseConfig) -> LoadResult<Self> {
        let target = config.redacted();
        let connection_error = |source: sqlx::Error| LoadError::Connection {
            target: target.clone(),
            source: source.into(),
        };

        let options = connect_options(config).map_err(connection_error)?;
        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(connection_error)?;

        info!("Connected to {}", target);
        Ok(Self { conn, target })
    }

    async fn execute(&mut self, sql: &str) -> Result<(), BackendError> {
        sqlx::raw_sql(sql).execute(&mut self.conn).await?;
        Ok(())
    }
}

fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, sqlx::Error> {
    match &config.url {
        Some(url) => url.parse(),
        None => Ok(PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)),
    }
}

/// Quote a setting value as a SQL string literal
fn setting_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn push_value<Sep: Display>(row: &mut Separated<'_, '_, Postgres, Sep>, value: &SqlValue) {
    match value {
        SqlValue::Null => {
            row.push("NULL");
        }
        SqlValue::Int(n) => {
            row.push_bind(*n);
        }
        SqlValue::Float(n) => {
            row.push_bind(*n);
        }
        SqlValue::Text(s) => {
            row.push_bind(s.clone());
        }
        SqlValue::Uuid(id) => {
            row.push_bind(*id);
        }
        SqlValue::Json(doc) => {
            row.push_bind(Json(doc.clone()));
        }
        SqlValue::Timestamp(ts) => {
            row.push_bind(*ts);
        }
    }
}

impl Storage for PgStorage {
    type Sink<'a> = PgCopySink<'a>;

    fn target(&self) -> String {
        self.target.clone()
    }

    async fn apply_tuning(&mut self, tuning: &SessionTuning) -> Result<(), BackendError> {
        let synchronous_commit = if tuning.synchronous_commit { "on" } else { "off" };
        self.execute(&format!("SET synchronous_commit = {}", synchronous_commit))
            .await?;
        self.execute(&format!("SET work_mem = {}", setting_literal(&tuning.work_mem)))
            .await?;
        self.execute(&format!(
            "SET maintenance_work_mem = {}",
            setting_literal(&tuning.maintenance_work_mem)
        ))
        .await?;
        Ok(())
    }

    async fn create_schema(&mut self, schema: &Schema) -> Result<(), BackendError> {
        for statement in schema.ddl_statements(Dialect::Postgres) {
            self.execute(&statement).await?;
        }
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), BackendError> {
        self.execute("BEGIN").await
    }

    async fn insert_rows(&mut self, data: &TableData) -> Result<u64, BackendError> {
        let table = data.table;
        let mut inserted = 0;

        for chunk in data.rows.chunks(rows_per_statement(table, MAX_BIND_PARAMS)) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                table.name(),
                column_list(table)
            ));
            builder.push_values(chunk, |mut row, values| {
                for value in values {
                    push_value(&mut row, value);
                }
            });

            let result = builder.build().execute(&mut self.conn).await?;
            inserted += result.rows_affected();
            debug!("Inserted {} rows into {}", chunk.len(), table);
        }

        Ok(inserted)
    }

    async fn commit(&mut self) -> Result<(), BackendError> {
        self.execute("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), BackendError> {
        self.execute("ROLLBACK").await
    }

    async fn copy_in(&mut self, table: TableId) -> Result<PgCopySink<'_>, BackendError> {
        let statement = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT text)",
            table.name(),
            column_list(table)
        );
        let copy = self.conn.copy_in_raw(&statement).await?;
        Ok(PgCopySink {
            copy,
            buffer: String::new(),
        })
    }

    async fn count_rows(&mut self, table: TableId) -> Result<i64, BackendError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut self.conn).await?;
        Ok(count)
    }

    async fn analyze(&mut self) -> Result<(), BackendError> {
        self.execute("ANALYZE").await
    }

    async fn close(self) -> Result<(), BackendError> {
        self.conn.close().await?;
        Ok(())
    }
}

/// A running `COPY ... FROM STDIN`
pub struct PgCopySink<'a> {
    copy: PgCopyIn<&'a mut PgConnection>,
    /// Reused encode buffer, holds one batch at a time
    buffer: String,
}

impl CopySink for PgCopySink<'_> {
    async fn send(&mut self, rows: &[Row]) -> Result<(), BackendError> {
        self.buffer.clear();
        encode_copy_rows(rows, &mut self.buffer);
        self.copy.send(self.buffer.as_bytes()).await?;
        Ok(())
    }

    async fn finish(self) -> Result<u64, BackendError> {
        Ok(self.copy.finish().await?)
    }

    async fn abort(self, reason: &str) -> Result<(), BackendError> {
        self.copy.abort(reason).await?;
        Ok(())
    }
}

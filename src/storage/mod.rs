//! Storage backends the loader writes through.
//!
//! A backend owns one connection. Reference tables go through a plain
//! transaction with batched multi-row INSERTs; occurrence tables go through
//! the backend's bulk-ingestion channel ([`CopySink`]), which either commits
//! every streamed row on [`CopySink::finish`] or none of them.

pub mod duckdb;
pub mod postgres;

pub use self::duckdb::{DuckDbSink, DuckDbStorage};
pub use self::postgres::{PgCopySink, PgStorage};

use crate::config::SessionTuning;
use crate::error::BackendError;
use seed_data_gen::{Row, Schema, TableData, TableId};

/// A relational target for generated rows
#[allow(async_fn_in_trait)]
pub trait Storage {
    type Sink<'a>: CopySink
    where
        Self: 'a;

    /// Redacted description of the target, for logs
    fn target(&self) -> String;

    /// Session-scoped settings; they last for the connection's lifetime only
    async fn apply_tuning(&mut self, tuning: &SessionTuning) -> Result<(), BackendError>;

    async fn create_schema(&mut self, schema: &Schema) -> Result<(), BackendError>;

    async fn begin(&mut self) -> Result<(), BackendError>;

    /// Insert all rows of `data` inside the open transaction. Returns rows inserted.
    async fn insert_rows(&mut self, data: &TableData) -> Result<u64, BackendError>;

    async fn commit(&mut self) -> Result<(), BackendError>;

    async fn rollback(&mut self) -> Result<(), BackendError>;

    /// Open the bulk-ingestion channel for one table
    async fn copy_in(&mut self, table: TableId) -> Result<Self::Sink<'_>, BackendError>;

    async fn count_rows(&mut self, table: TableId) -> Result<i64, BackendError>;

    /// Refresh planner statistics
    async fn analyze(&mut self) -> Result<(), BackendError>;

    async fn close(self) -> Result<(), BackendError>
    where
        Self: Sized;
}

/// An open bulk-ingestion stream for a single table
#[allow(async_fn_in_trait)]
pub trait CopySink {
    /// Stream one batch of rows, in [`TableId::columns`] order
    async fn send(&mut self, rows: &[Row]) -> Result<(), BackendError>;

    /// Complete the stream and commit it. Returns the rows the backend accepted.
    async fn finish(self) -> Result<u64, BackendError>
    where
        Self: Sized;

    /// Cancel the stream; nothing sent so far is kept
    async fn abort(self, reason: &str) -> Result<(), BackendError>
    where
        Self: Sized;
}

/// Column list for INSERT/COPY statements
pub(crate) fn column_list(table: TableId) -> String {
    table.columns().join(", ")
}

/// Rows per multi-row INSERT, so that `rows * columns` stays under `max_params`
pub(crate) fn rows_per_statement(table: TableId, max_params: usize) -> usize {
    (max_params / table.columns().len()).max(1)
}

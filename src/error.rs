//! Error types for the loader and its storage backends.

use seed_data_gen::{GenerateError, TableId};

pub type LoadResult<T> = Result<T, LoadError>;

/// A failure reported by a storage backend driver
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Postgres(#[from] sqlx::Error),

    #[error(transparent)]
    DuckDb(#[from] duckdb::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Could not reach the target database; nothing was written
    #[error("failed to connect to {target}")]
    Connection {
        target: String,
        #[source]
        source: BackendError,
    },

    /// An insert failed during the reference phase, which was rolled back
    #[error("insert into {table} failed, reference tables rolled back")]
    ConstraintViolation {
        table: TableId,
        #[source]
        source: BackendError,
    },

    /// The bulk stream for an occurrence table failed and was discarded
    #[error("bulk load of {table} failed after {rows_sent} rows, table rolled back")]
    StreamWrite {
        table: TableId,
        rows_sent: u64,
        #[source]
        source: BackendError,
    },

    #[error("{context}")]
    Query {
        context: String,
        #[source]
        source: BackendError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl LoadError {
    pub fn query(context: impl Into<String>, source: impl Into<BackendError>) -> Self {
        LoadError::Query {
            context: context.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_chain_keeps_driver_cause() {
        let err = LoadError::StreamWrite {
            table: TableId::EventOccurrences,
            rows_sent: 10_000,
            source: BackendError::Postgres(sqlx::Error::PoolTimedOut),
        };
        assert_eq!(
            err.to_string(),
            "bulk load of event_occurrences failed after 10000 rows, table rolled back"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_generate_error_is_transparent() {
        let err: LoadError = GenerateError::EmptyPool { pool: "assets" }.into();
        assert_eq!(
            err.to_string(),
            "cannot pick a foreign key: the assets pool is empty"
        );
    }
}

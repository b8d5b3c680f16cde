//! Synthetic data generator for the security-platform schema.
//!
//! Produces deterministic, FK-consistent rows for users, tags, assets, events,
//! incidents, their join tables, and the two large occurrence tables. Nothing
//! here touches a database; the loader in the root crate owns storage.
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use seed_data_gen::{Counts, Generator};
//!
//! // Seeded generator and a fixed "now" so the run can be replayed
//! let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
//! let mut gen = Generator::from_seed(Some(42), now).unwrap();
//! let data = gen.reference_data(&Counts::default()).unwrap();
//!
//! let row = gen.event_occurrence(0, &data.parents.events).unwrap();
//! assert!(data.parents.events.contains(&row.parent_id));
//! ```

pub mod categories;
pub mod fake;
pub mod generator;
pub mod ids;
pub mod occurrence;
pub mod rows;
pub mod schema;

pub use categories::{WeightedPicker, WeightedTable};
pub use generator::{Counts, Generator, OccurrenceParents, ReferenceData};
pub use ids::IdPool;
pub use occurrence::OccurrenceKind;
pub use rows::{encode_copy_rows, OccurrenceRow, Row, SqlValue, TableData, ToSqlRow};
pub use schema::{security_schema, Dialect, Schema, SqlType, Table, TableId};

/// Errors raised while generating rows
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// A foreign key was requested from a pool with no identifiers
    #[error("cannot pick a foreign key: the {pool} pool is empty")]
    EmptyPool { pool: &'static str },

    #[error("invalid weighted table '{table}': {reason}")]
    InvalidWeights { table: &'static str, reason: String },
}

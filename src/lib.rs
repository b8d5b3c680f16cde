//! Bulk-load synthetic security-platform data for slow-query testing.
//!
//! Row generation lives in the `seed_data_gen` crate; this crate owns the
//! storage backends, the streaming occurrence loader and the run pipeline.

pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod progress;
pub mod stats;
pub mod storage;

pub use config::{DatabaseConfig, SeedConfig, SessionTuning};
pub use error::{BackendError, LoadError, LoadResult};
pub use loader::{load_occurrences, BatchPlan, LoadOptions, OccurrenceStats, RemainderPolicy};
pub use pipeline::{populate, populate_with, RunOptions};
pub use stats::PopulationReport;
pub use storage::{CopySink, DuckDbSink, DuckDbStorage, PgCopySink, PgStorage, Storage};

//! End-to-end population run.
//!
//! Order of operations:
//! 1. session tuning
//! 2. optional DDL
//! 3. reference tables, in a single transaction
//! 4. event occurrences, then incident occurrences, each its own bulk stream
//! 5. row counts and `ANALYZE`

use crate::config::SeedConfig;
use crate::error::{LoadError, LoadResult};
use crate::loader::{load_occurrences, LoadOptions};
use crate::stats::PopulationReport;
use crate::storage::Storage;
use chrono::Utc;
use rand::Rng;
use seed_data_gen::{security_schema, Generator, OccurrenceKind, TableData, TableId};
use std::time::Instant;
use tracing::{info, warn};

/// Run-level switches that are not part of the persisted configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Create the tables before loading
    pub init_schema: bool,
    pub progress: bool,
}

/// Populate `storage` from `config`, seeding the generator from the
/// configured seed or a freshly drawn one.
pub async fn populate<S: Storage>(
    storage: &mut S,
    config: &SeedConfig,
    options: &RunOptions,
) -> LoadResult<PopulationReport> {
    let seed = config.seed.unwrap_or_else(rand::random);
    info!("Using seed {} (pass --seed {} to replay)", seed, seed);

    let mut generator = Generator::from_seed(Some(seed), Utc::now())?;
    let mut report = populate_with(storage, &mut generator, config, options).await?;
    report.seed = Some(seed);
    Ok(report)
}

/// Populate `storage` using a caller-supplied generator
pub async fn populate_with<S, R>(
    storage: &mut S,
    generator: &mut Generator<R>,
    config: &SeedConfig,
    options: &RunOptions,
) -> LoadResult<PopulationReport>
where
    S: Storage,
    R: Rng,
{
    config.validate()?;
    let start = Instant::now();
    info!("Populating {}", storage.target());

    if config.tuning.enabled {
        storage
            .apply_tuning(&config.tuning)
            .await
            .map_err(|e| LoadError::query("failed to apply session tuning", e))?;
    }

    if options.init_schema {
        info!("Creating schema");
        storage
            .create_schema(&security_schema())
            .await
            .map_err(|e| LoadError::query("failed to create schema", e))?;
    }

    info!("Generating reference data");
    let (tables, parents) = generator.reference_data(&config.counts)?.into_parts();
    insert_reference(storage, &tables).await?;
    drop(tables);

    let load = LoadOptions {
        batch_size: config.batch_size,
        remainder: config.remainder,
        progress: options.progress,
    };
    let event_stats = load_occurrences(
        storage,
        generator,
        OccurrenceKind::Event,
        config.counts.event_occurrences,
        &parents.events,
        &load,
    )
    .await?;
    let incident_stats = load_occurrences(
        storage,
        generator,
        OccurrenceKind::Incident,
        config.counts.incident_occurrences,
        &parents.incidents,
        &load,
    )
    .await?;

    let mut table_counts = Vec::with_capacity(TableId::REPORT_ORDER.len());
    for table in TableId::REPORT_ORDER {
        let count = storage
            .count_rows(table)
            .await
            .map_err(|e| LoadError::query(format!("failed to count rows in {}", table), e))?;
        table_counts.push((table, count));
    }

    if config.analyze {
        info!("Updating table statistics");
        storage
            .analyze()
            .await
            .map_err(|e| LoadError::query("ANALYZE failed", e))?;
    }

    Ok(PopulationReport {
        table_counts,
        occurrences: vec![event_stats, incident_stats],
        seed: None,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

/// Insert every reference table in one transaction; all or nothing
async fn insert_reference<S: Storage>(storage: &mut S, tables: &[TableData]) -> LoadResult<()> {
    storage
        .begin()
        .await
        .map_err(|e| LoadError::query("failed to begin reference transaction", e))?;

    for data in tables {
        info!("Inserting {} rows into {}", data.len(), data.table);
        if let Err(source) = storage.insert_rows(data).await {
            if let Err(e) = storage.rollback().await {
                warn!("Rollback of reference tables failed: {}", e);
            }
            return Err(LoadError::ConstraintViolation {
                table: data.table,
                source,
            });
        }
    }

    storage
        .commit()
        .await
        .map_err(|e| LoadError::query("failed to commit reference tables", e))
}

//! Streaming bulk loader for the occurrence tables.
//!
//! Rows are generated one batch at a time, encoded, handed to the backend's
//! [`CopySink`] and dropped. Only the current batch is ever held in memory.

use crate::error::{LoadError, LoadResult};
use crate::progress;
use crate::storage::{CopySink, Storage};
use rand::Rng;
use seed_data_gen::{Generator, IdPool, OccurrenceKind, Row, TableId, ToSqlRow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What to do with rows that do not fill a whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemainderPolicy {
    /// Silently drop them
    #[default]
    Drop,
    /// Write them as one final, shorter batch
    Flush,
}

impl std::str::FromStr for RemainderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(RemainderPolicy::Drop),
            "flush" => Ok(RemainderPolicy::Flush),
            _ => Err(format!(
                "Unknown remainder policy: {}. Valid options: drop, flush",
                s
            )),
        }
    }
}

impl fmt::Display for RemainderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemainderPolicy::Drop => write!(f, "drop"),
            RemainderPolicy::Flush => write!(f, "flush"),
        }
    }
}

/// How a requested row total splits into batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub full_batches: usize,
    pub remainder: usize,
    pub policy: RemainderPolicy,
}

impl BatchPlan {
    pub fn new(total: usize, batch_size: usize, policy: RemainderPolicy) -> LoadResult<Self> {
        if batch_size == 0 {
            return Err(LoadError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            batch_size,
            full_batches: total / batch_size,
            remainder: total % batch_size,
            policy,
        })
    }

    fn flushes_remainder(&self) -> bool {
        self.policy == RemainderPolicy::Flush && self.remainder > 0
    }

    /// Batches that will actually be sent
    pub fn batch_count(&self) -> usize {
        self.full_batches + usize::from(self.flushes_remainder())
    }

    /// Rows that will actually be written
    pub fn rows_to_write(&self) -> usize {
        self.batches().map(|(_, size)| size).sum()
    }

    /// Rows requested but not written
    pub fn dropped(&self) -> usize {
        if self.flushes_remainder() {
            0
        } else {
            self.remainder
        }
    }

    /// `(batch index, rows in batch)` for every batch, in order
    pub fn batches(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let full = (0..self.full_batches).map(move |i| (i, self.batch_size));
        let tail = self
            .flushes_remainder()
            .then_some((self.full_batches, self.remainder));
        full.chain(tail)
    }
}

/// Loader knobs shared by both occurrence streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub batch_size: usize,
    pub remainder: RemainderPolicy,
    pub progress: bool,
}

/// Outcome of one occurrence stream
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceStats {
    pub table: TableId,
    pub batches: usize,
    pub rows_written: u64,
    /// Requested rows lost to the remainder policy
    pub rows_dropped: usize,
    pub elapsed_secs: f64,
}

impl OccurrenceStats {
    pub fn rows_per_sec(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.rows_written as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// Stream `total` occurrence rows of `kind` into storage.
///
/// The table is written atomically: on any error the stream is aborted and
/// no rows from this call remain.
pub async fn load_occurrences<S, R>(
    storage: &mut S,
    generator: &mut Generator<R>,
    kind: OccurrenceKind,
    total: usize,
    parents: &IdPool,
    options: &LoadOptions,
) -> LoadResult<OccurrenceStats>
where
    S: Storage,
    R: Rng,
{
    let table = kind.table();
    let plan = BatchPlan::new(total, options.batch_size, options.remainder)?;

    if total > 0 && parents.is_empty() {
        return Err(LoadError::Config(format!(
            "cannot load {}: no {} to reference",
            table,
            kind.parent_table()
        )));
    }
    if plan.dropped() > 0 {
        warn!(
            "{}: {} rows do not fill a batch of {} and will be dropped",
            table,
            plan.dropped(),
            plan.batch_size
        );
    }

    let start = Instant::now();
    if plan.batch_count() == 0 {
        info!("{}: nothing to load", table);
        return Ok(OccurrenceStats {
            table,
            batches: 0,
            rows_written: 0,
            rows_dropped: plan.dropped(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        });
    }

    info!(
        "Loading {} rows into {} ({} batches of {})",
        plan.rows_to_write(),
        table,
        plan.batch_count(),
        plan.batch_size
    );

    let pb = progress::batch_bar(plan.batch_count(), table.name(), options.progress);
    let mut sink = storage
        .copy_in(table)
        .await
        .map_err(|source| LoadError::StreamWrite {
            table,
            rows_sent: 0,
            source,
        })?;

    let mut rows_sent: u64 = 0;
    for (batch, size) in plan.batches() {
        let rows: Result<Vec<Row>, _> = (0..size)
            .map(|_| {
                generator
                    .occurrence(kind, batch, parents)
                    .map(ToSqlRow::into_values)
            })
            .collect();
        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                abort(sink, table, "row generation failed").await;
                pb.abandon();
                return Err(e.into());
            }
        };

        if let Err(source) = sink.send(&rows).await {
            abort(sink, table, "batch write failed").await;
            pb.abandon();
            return Err(LoadError::StreamWrite {
                table,
                rows_sent,
                source,
            });
        }

        rows_sent += size as u64;
        pb.inc(1);
        debug!("{}: batch {} sent ({} rows so far)", table, batch, rows_sent);
    }

    let rows_written = sink
        .finish()
        .await
        .map_err(|source| LoadError::StreamWrite {
            table,
            rows_sent,
            source,
        })?;
    pb.finish_and_clear();

    let stats = OccurrenceStats {
        table,
        batches: plan.batch_count(),
        rows_written,
        rows_dropped: plan.dropped(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    info!(
        "Loaded {} rows into {} in {:.2}s ({:.0} rows/sec)",
        stats.rows_written,
        table,
        stats.elapsed_secs,
        stats.rows_per_sec()
    );
    Ok(stats)
}

/// Cancel a sink after a failure. The original error wins, so this only logs.
async fn abort<K: CopySink>(sink: K, table: TableId, reason: &str) {
    if let Err(e) = sink.abort(reason).await {
        warn!("Failed to abort bulk load of {}: {}", table, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_even_split() {
        let plan = BatchPlan::new(100_000, 5_000, RemainderPolicy::Drop).unwrap();
        assert_eq!(plan.full_batches, 20);
        assert_eq!(plan.batch_count(), 20);
        assert_eq!(plan.rows_to_write(), 100_000);
        assert_eq!(plan.dropped(), 0);
    }

    #[test]
    fn test_plan_drops_remainder() {
        let plan = BatchPlan::new(100_003, 5_000, RemainderPolicy::Drop).unwrap();
        assert_eq!(plan.batch_count(), 20);
        assert_eq!(plan.rows_to_write(), 100_000);
        assert_eq!(plan.dropped(), 3);
    }

    #[test]
    fn test_plan_flushes_remainder() {
        let plan = BatchPlan::new(100_003, 5_000, RemainderPolicy::Flush).unwrap();
        assert_eq!(plan.batch_count(), 21);
        assert_eq!(plan.rows_to_write(), 100_003);
        assert_eq!(plan.batches().last(), Some((20, 3)));
        assert_eq!(plan.dropped(), 0);
    }

    #[test]
    fn test_plan_smaller_than_one_batch() {
        let plan = BatchPlan::new(10, 5_000, RemainderPolicy::Drop).unwrap();
        assert_eq!(plan.batch_count(), 0);
        assert_eq!(plan.rows_to_write(), 0);

        assert!(BatchPlan::new(10, 0, RemainderPolicy::Drop).is_err());
    }

    #[test]
    fn test_remainder_policy_parse() {
        assert_eq!("flush".parse::<RemainderPolicy>(), Ok(RemainderPolicy::Flush));
        assert_eq!("DROP".parse::<RemainderPolicy>(), Ok(RemainderPolicy::Drop));
        assert!("keep".parse::<RemainderPolicy>().is_err());
    }
}

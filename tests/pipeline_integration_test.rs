//! End-to-end pipeline tests against an in-memory DuckDB backend.

use chrono::{DateTime, TimeZone, Utc};
use rand_chacha::ChaCha8Rng;
use seed_data_gen::{security_schema, Counts, Generator, Row, Schema, TableData, TableId};
use slowquery_seeder::{
    populate, populate_with, BackendError, CopySink, DuckDbSink, DuckDbStorage, LoadError,
    RemainderPolicy, RunOptions, SeedConfig, SessionTuning, Storage,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn generator(seed: u64) -> Generator<ChaCha8Rng> {
    Generator::from_seed(Some(seed), now()).unwrap()
}

fn small_config() -> SeedConfig {
    SeedConfig {
        counts: Counts {
            users: 4,
            assets: 30,
            tags: 25,
            events: 40,
            incidents: 20,
            event_occurrences: 1_050,
            incident_occurrences: 600,
        },
        batch_size: 100,
        ..SeedConfig::default()
    }
}

fn schema_options() -> RunOptions {
    RunOptions {
        init_schema: true,
        progress: false,
    }
}

fn count(storage: &DuckDbStorage, sql: &str) -> i64 {
    storage
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .unwrap()
}

fn injected() -> BackendError {
    BackendError::Postgres(sqlx::Error::Protocol("injected failure".to_string()))
}

// =============================================================================
// Fault injection
// =============================================================================

/// Wraps a DuckDB backend and fails on demand
struct FaultyStorage {
    inner: DuckDbStorage,
    /// Fail the reference insert for this table
    fail_insert: Option<TableId>,
    /// Fail the stream for this table once this many batches were sent
    fail_stream: Option<(TableId, usize)>,
}

impl FaultyStorage {
    fn new() -> Self {
        Self {
            inner: DuckDbStorage::open_in_memory().unwrap(),
            fail_insert: None,
            fail_stream: None,
        }
    }
}

struct FaultySink<K> {
    inner: K,
    sends: usize,
    fail_after: Option<usize>,
}

impl<K: CopySink> CopySink for FaultySink<K> {
    async fn send(&mut self, rows: &[Row]) -> Result<(), BackendError> {
        if self.fail_after == Some(self.sends) {
            return Err(injected());
        }
        self.sends += 1;
        self.inner.send(rows).await
    }

    async fn finish(self) -> Result<u64, BackendError> {
        self.inner.finish().await
    }

    async fn abort(self, reason: &str) -> Result<(), BackendError> {
        self.inner.abort(reason).await
    }
}

impl Storage for FaultyStorage {
    type Sink<'a> = FaultySink<DuckDbSink<'a>>;

    fn target(&self) -> String {
        format!("faulty {}", self.inner.target())
    }

    async fn apply_tuning(&mut self, tuning: &SessionTuning) -> Result<(), BackendError> {
        self.inner.apply_tuning(tuning).await
    }

    async fn create_schema(&mut self, schema: &Schema) -> Result<(), BackendError> {
        self.inner.create_schema(schema).await
    }

    async fn begin(&mut self) -> Result<(), BackendError> {
        self.inner.begin().await
    }

    async fn insert_rows(&mut self, data: &TableData) -> Result<u64, BackendError> {
        if self.fail_insert == Some(data.table) {
            return Err(injected());
        }
        self.inner.insert_rows(data).await
    }

    async fn commit(&mut self) -> Result<(), BackendError> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<(), BackendError> {
        self.inner.rollback().await
    }

    async fn copy_in(&mut self, table: TableId) -> Result<Self::Sink<'_>, BackendError> {
        let fail_after = self
            .fail_stream
            .filter(|(t, _)| *t == table)
            .map(|(_, batches)| batches);
        let inner = self.inner.copy_in(table).await?;
        Ok(FaultySink {
            inner,
            sends: 0,
            fail_after,
        })
    }

    async fn count_rows(&mut self, table: TableId) -> Result<i64, BackendError> {
        self.inner.count_rows(table).await
    }

    async fn analyze(&mut self) -> Result<(), BackendError> {
        self.inner.analyze().await
    }

    async fn close(self) -> Result<(), BackendError> {
        self.inner.close().await
    }
}

// =============================================================================
// Full runs
// =============================================================================

#[tokio::test]
async fn test_full_run_counts() {
    let mut storage = DuckDbStorage::open_in_memory().unwrap();
    let config = small_config();

    let report = populate_with(&mut storage, &mut generator(1), &config, &schema_options())
        .await
        .unwrap();

    assert_eq!(report.count(TableId::Users), Some(4));
    assert_eq!(report.count(TableId::Assets), Some(30));
    assert_eq!(report.count(TableId::Tags), Some(25));
    assert_eq!(report.count(TableId::Events), Some(40));
    assert_eq!(report.count(TableId::Incidents), Some(20));
    // 1050 / 100 -> 10 full batches, remainder dropped
    assert_eq!(report.count(TableId::EventOccurrences), Some(1_000));
    assert_eq!(report.count(TableId::IncidentOccurrences), Some(600));

    let user_assets = report.count(TableId::UserAssets).unwrap();
    assert!((4 * 5..=4 * 15).contains(&user_assets));
    let asset_tags = report.count(TableId::AssetTags).unwrap();
    assert!((30 * 2..=30 * 5).contains(&asset_tags));

    let order: Vec<TableId> = report.table_counts.iter().map(|(t, _)| *t).collect();
    assert_eq!(order, TableId::REPORT_ORDER.to_vec());

    assert_eq!(report.occurrences.len(), 2);
    assert_eq!(report.occurrences[0].batches, 10);
    assert_eq!(report.occurrences[0].rows_dropped, 50);
    assert_eq!(report.occurrences[1].rows_written, 600);
}

#[tokio::test]
async fn test_full_run_flushes_remainder() {
    let mut storage = DuckDbStorage::open_in_memory().unwrap();
    let config = SeedConfig {
        remainder: RemainderPolicy::Flush,
        ..small_config()
    };

    let report = populate_with(&mut storage, &mut generator(2), &config, &schema_options())
        .await
        .unwrap();

    assert_eq!(report.count(TableId::EventOccurrences), Some(1_050));
    assert_eq!(report.occurrences[0].batches, 11);
}

#[tokio::test]
async fn test_loaded_rows_are_fk_consistent() {
    let mut storage = DuckDbStorage::open_in_memory().unwrap();
    populate_with(&mut storage, &mut generator(3), &small_config(), &schema_options())
        .await
        .unwrap();

    let orphans = [
        "SELECT COUNT(*) FROM events e LEFT JOIN assets a ON a.id = e.asset_id WHERE a.id IS NULL",
        "SELECT COUNT(*) FROM incidents i LEFT JOIN assets a ON a.id = i.asset_id WHERE a.id IS NULL",
        "SELECT COUNT(*) FROM event_occurrences o LEFT JOIN events e ON e.id = o.event_id WHERE e.id IS NULL",
        "SELECT COUNT(*) FROM incident_occurrences o LEFT JOIN incidents i ON i.id = o.incident_id WHERE i.id IS NULL",
    ];
    for sql in orphans {
        assert_eq!(count(&storage, sql), 0, "{}", sql);
    }

    let mismatched_resolution = count(
        &storage,
        "SELECT COUNT(*) FROM incidents \
         WHERE (status IN ('resolved', 'closed')) <> (resolved_at IS NOT NULL)",
    );
    assert_eq!(mismatched_resolution, 0);

    let early_resolution = count(
        &storage,
        "SELECT COUNT(*) FROM incidents WHERE resolved_at IS NOT NULL \
         AND (resolved_at <= created_at OR resolved_at > created_at + INTERVAL 168 HOUR)",
    );
    assert_eq!(early_resolution, 0);

    let timestamps_differ = count(
        &storage,
        "SELECT COUNT(*) FROM event_occurrences \
         WHERE created_at <> occurred_at OR updated_at <> occurred_at",
    );
    assert_eq!(timestamps_differ, 0);
}

#[tokio::test]
async fn test_same_seed_same_data() {
    let mut first = DuckDbStorage::open_in_memory().unwrap();
    let mut second = DuckDbStorage::open_in_memory().unwrap();
    let config = SeedConfig {
        counts: Counts {
            event_occurrences: 0,
            incident_occurrences: 0,
            ..small_config().counts
        },
        ..small_config()
    };

    populate_with(&mut first, &mut generator(77), &config, &schema_options())
        .await
        .unwrap();
    populate_with(&mut second, &mut generator(77), &config, &schema_options())
        .await
        .unwrap();

    let names = |storage: &DuckDbStorage| -> Vec<String> {
        let mut stmt = storage
            .connection()
            .prepare("SELECT id || ':' || username FROM users ORDER BY id")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    };
    assert_eq!(names(&first), names(&second));
    assert_eq!(names(&first).len(), 4);
}

#[tokio::test]
async fn test_populate_reports_seed() {
    let mut storage = DuckDbStorage::open_in_memory().unwrap();
    let config = SeedConfig {
        seed: Some(1234),
        ..small_config()
    };

    let report = populate(&mut storage, &config, &schema_options())
        .await
        .unwrap();
    assert_eq!(report.seed, Some(1234));
    assert!(report.render().contains("Seed: 1234"));
}

// =============================================================================
// Failure domains
// =============================================================================

#[tokio::test]
async fn test_stream_failure_rolls_back_only_that_table() {
    let mut storage = FaultyStorage::new();
    storage.fail_stream = Some((TableId::EventOccurrences, 3));

    let err = populate_with(&mut storage, &mut generator(5), &small_config(), &schema_options())
        .await
        .unwrap_err();

    match err {
        LoadError::StreamWrite {
            table, rows_sent, ..
        } => {
            assert_eq!(table, TableId::EventOccurrences);
            assert_eq!(rows_sent, 300);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(count(&storage.inner, "SELECT COUNT(*) FROM event_occurrences"), 0);
    assert_eq!(count(&storage.inner, "SELECT COUNT(*) FROM incident_occurrences"), 0);
    assert_eq!(count(&storage.inner, "SELECT COUNT(*) FROM users"), 4);
    assert_eq!(count(&storage.inner, "SELECT COUNT(*) FROM incidents"), 20);
}

#[tokio::test]
async fn test_second_stream_failure_keeps_first_stream() {
    let mut storage = FaultyStorage::new();
    storage.fail_stream = Some((TableId::IncidentOccurrences, 0));

    let err = populate_with(&mut storage, &mut generator(6), &small_config(), &schema_options())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::StreamWrite {
            table: TableId::IncidentOccurrences,
            rows_sent: 0,
            ..
        }
    ));

    assert_eq!(count(&storage.inner, "SELECT COUNT(*) FROM event_occurrences"), 1_000);
    assert_eq!(count(&storage.inner, "SELECT COUNT(*) FROM incident_occurrences"), 0);
}

#[tokio::test]
async fn test_reference_failure_leaves_tables_empty() {
    let mut storage = FaultyStorage::new();
    storage.fail_insert = Some(TableId::UserAssets);

    let err = populate_with(&mut storage, &mut generator(7), &small_config(), &schema_options())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::ConstraintViolation {
            table: TableId::UserAssets,
            ..
        }
    ));

    for table in TableId::REPORT_ORDER {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        assert_eq!(count(&storage.inner, &sql), 0, "{} not empty", table);
    }
}

#[tokio::test]
async fn test_missing_schema_is_a_constraint_violation() {
    let mut storage = DuckDbStorage::open_in_memory().unwrap();
    let options = RunOptions {
        init_schema: false,
        progress: false,
    };

    let err = populate_with(&mut storage, &mut generator(8), &small_config(), &options)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::ConstraintViolation {
            table: TableId::Users,
            source: BackendError::DuckDb(_),
        }
    ));
}

#[tokio::test]
async fn test_invalid_config_fails_before_writing() {
    let mut storage = DuckDbStorage::open_in_memory().unwrap();
    storage.create_schema(&security_schema()).await.unwrap();
    let config = SeedConfig {
        counts: Counts {
            events: 0,
            ..small_config().counts
        },
        ..small_config()
    };

    let err = populate_with(&mut storage, &mut generator(9), &config, &schema_options())
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Config(_)));
    assert_eq!(count(&storage, "SELECT COUNT(*) FROM users"), 0);
}

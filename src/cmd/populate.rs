//! Populate command CLI handler.

use anyhow::Context;
use clap::Args;
use slowquery_seeder::{
    populate, DuckDbStorage, PgStorage, PopulationReport, RemainderPolicy, RunOptions,
    SeedConfig, Storage,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args, Debug, Clone, Default)]
pub struct PopulateArgs {
    /// YAML config file (counts, database, batch_size, remainder, seed, tuning, analyze)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// PostgreSQL connection URL (overrides DATABASE_URL and PG* variables)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Load into a DuckDB database file instead of PostgreSQL
    #[arg(long, conflicts_with = "database_url")]
    pub duckdb: Option<PathBuf>,

    /// DuckDB memory limit (e.g., 4GB)
    #[arg(long, requires = "duckdb")]
    pub memory_limit: Option<String>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,

    /// Rows per occurrence batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Write rows that do not fill a whole batch instead of dropping them
    #[arg(long)]
    pub flush_remainder: bool,

    #[arg(long)]
    pub users: Option<usize>,

    #[arg(long)]
    pub assets: Option<usize>,

    #[arg(long)]
    pub tags: Option<usize>,

    #[arg(long)]
    pub events: Option<usize>,

    #[arg(long)]
    pub incidents: Option<usize>,

    #[arg(long)]
    pub event_occurrences: Option<usize>,

    #[arg(long)]
    pub incident_occurrences: Option<usize>,

    /// Skip session tuning (synchronous_commit, work_mem, maintenance_work_mem)
    #[arg(long)]
    pub no_tuning: bool,

    /// Skip ANALYZE after loading
    #[arg(long)]
    pub no_analyze: bool,

    /// Create the tables before loading (always on for DuckDB)
    #[arg(long)]
    pub init_schema: bool,

    /// Show progress bars (default: when stderr is a terminal)
    #[arg(short, long, conflicts_with = "no_progress")]
    pub progress: bool,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl PopulateArgs {
    /// Build the effective configuration: defaults, YAML, environment, then flags
    pub fn resolve(&self) -> anyhow::Result<SeedConfig> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Same as [`resolve`](Self::resolve), with environment variables read from `lookup`
    pub fn resolve_with<F>(&self, lookup: F) -> anyhow::Result<SeedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config {
            Some(path) => SeedConfig::load(path)?,
            None => SeedConfig::default(),
        };
        config.apply_env_from(lookup)?;

        if let Some(url) = &self.database_url {
            config.database.url = Some(url.clone());
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if self.flush_remainder {
            config.remainder = RemainderPolicy::Flush;
        }

        let counts = &mut config.counts;
        let overrides = [
            (&mut counts.users, self.users),
            (&mut counts.assets, self.assets),
            (&mut counts.tags, self.tags),
            (&mut counts.events, self.events),
            (&mut counts.incidents, self.incidents),
            (&mut counts.event_occurrences, self.event_occurrences),
            (&mut counts.incident_occurrences, self.incident_occurrences),
        ];
        for (slot, value) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }

        if self.no_tuning {
            config.tuning.enabled = false;
        }
        if self.no_analyze {
            config.analyze = false;
        }

        config.validate()?;
        Ok(config)
    }

    fn show_progress(&self) -> bool {
        if self.no_progress {
            false
        } else {
            self.progress || std::io::stderr().is_terminal()
        }
    }
}

pub async fn run(args: PopulateArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    let options = RunOptions {
        init_schema: args.init_schema || args.duckdb.is_some(),
        progress: args.show_progress(),
    };

    let report = match &args.duckdb {
        Some(path) => {
            let storage = DuckDbStorage::open(Some(path), args.memory_limit.as_deref())?;
            run_on(storage, &config, &options).await?
        }
        None => {
            info!("Target: {}", config.database.redacted());
            let storage = PgStorage::connect(&config.database).await?;
            run_on(storage, &config, &options).await?
        }
    };

    print!("{}", report.render());
    Ok(())
}

async fn run_on<S: Storage>(
    mut storage: S,
    config: &SeedConfig,
    options: &RunOptions,
) -> anyhow::Result<PopulationReport> {
    let result = populate(&mut storage, config, options).await;

    if let Err(e) = storage.close().await {
        warn!("Failed to close connection: {}", e);
    }

    let report = result.context("population failed")?;
    info!("Done in {:.2}s", report.elapsed_secs);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = PopulateArgs {
            seed: Some(9),
            batch_size: Some(250),
            flush_remainder: true,
            users: Some(2),
            event_occurrences: Some(1_001),
            no_tuning: true,
            no_analyze: true,
            ..PopulateArgs::default()
        };
        let config = args.resolve_with(no_env).unwrap();

        assert_eq!(config.seed, Some(9));
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.remainder, RemainderPolicy::Flush);
        assert_eq!(config.counts.users, 2);
        assert_eq!(config.counts.assets, 150);
        assert_eq!(config.counts.event_occurrences, 1_001);
        assert!(!config.tuning.enabled);
        assert!(!config.analyze);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = PopulateArgs {
            batch_size: Some(0),
            ..PopulateArgs::default()
        };
        assert!(args.resolve_with(no_env).is_err());
    }

    #[test]
    fn test_flags_override_environment() {
        let env = |key: &str| match key {
            "PGPORT" => Some("6543".to_string()),
            "DATABASE_URL" => Some("postgres://env@db/envdb".to_string()),
            _ => None,
        };
        let args = PopulateArgs {
            database_url: Some("postgres://flag@db/flagdb".to_string()),
            ..PopulateArgs::default()
        };
        let config = args.resolve_with(env).unwrap();

        assert_eq!(config.database.port, 6543);
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://flag@db/flagdb")
        );
    }

    #[test]
    fn test_bad_environment_port_is_rejected() {
        let env = |key: &str| (key == "PGPORT").then(|| "abc".to_string());
        assert!(PopulateArgs::default().resolve_with(env).is_err());
    }

    #[test]
    fn test_no_progress_wins() {
        let args = PopulateArgs {
            no_progress: true,
            ..PopulateArgs::default()
        };
        assert!(!args.show_progress());
    }
}

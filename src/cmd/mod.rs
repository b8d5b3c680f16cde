mod populate;
mod schema;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

pub use populate::PopulateArgs;

#[derive(Parser)]
#[command(name = "slowquery-seeder")]
#[command(version)]
#[command(
    about = "Bulk-load synthetic security-platform data for slow-query testing",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate data and load it into PostgreSQL (or DuckDB with --duckdb)
    Populate(PopulateArgs),

    /// Print the DDL for the security-platform tables
    Schema {
        /// SQL dialect: postgres or duckdb
        #[arg(short, long, default_value = "postgres")]
        dialect: String,

        /// Output SQL file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Populate(args) => populate::run(args).await,
        Commands::Schema { dialect, output } => schema::run(dialect, output),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "slowquery-seeder",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

//! Schema command CLI handler.

use anyhow::Context;
use seed_data_gen::{security_schema, Dialect};
use std::fs;
use std::path::PathBuf;

pub fn run(dialect: String, output: Option<PathBuf>) -> anyhow::Result<()> {
    let dialect: Dialect = dialect.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let ddl = security_schema().to_ddl(dialect);

    match output {
        Some(path) => {
            fs::write(&path, ddl)
                .with_context(|| format!("Failed to write schema to {}", path.display()))?;
            eprintln!("Schema written to {}", path.display());
        }
        None => print!("{}", ddl),
    }
    Ok(())
}

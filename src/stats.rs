//! Final population report.

use crate::loader::OccurrenceStats;
use seed_data_gen::TableId;
use std::fmt::Write;

/// Row counts read back from storage, plus per-stream load statistics
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationReport {
    /// Every table, in [`TableId::REPORT_ORDER`]
    pub table_counts: Vec<(TableId, i64)>,
    pub occurrences: Vec<OccurrenceStats>,
    /// Seed the run was generated from
    pub seed: Option<u64>,
    pub elapsed_secs: f64,
}

impl PopulationReport {
    pub fn count(&self, table: TableId) -> Option<i64> {
        self.table_counts
            .iter()
            .find(|(t, _)| *t == table)
            .map(|(_, n)| *n)
    }

    pub fn total_rows(&self) -> i64 {
        self.table_counts.iter().map(|(_, n)| n).sum()
    }

    /// Human-readable table, one line per table
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Database Population Complete ===");
        let _ = writeln!(out, "{:<22} {:>14}", "Table", "Rows");
        let _ = writeln!(out, "{}", "─".repeat(37));
        for (table, count) in &self.table_counts {
            let _ = writeln!(out, "{:<22} {:>14}", table.name(), thousands(*count));
        }
        let _ = writeln!(out, "{}", "─".repeat(37));
        let _ = writeln!(out, "{:<22} {:>14}", "TOTAL", thousands(self.total_rows()));

        for stats in &self.occurrences {
            let _ = writeln!(
                out,
                "{}: {} batches in {:.2}s ({} rows/sec)",
                stats.table,
                stats.batches,
                stats.elapsed_secs,
                thousands(stats.rows_per_sec() as i64)
            );
        }
        if let Some(seed) = self.seed {
            let _ = writeln!(out, "Seed: {}", seed);
        }
        out
    }
}

/// `1234567` -> `1,234,567`
pub fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

//! Schema model for the security-platform tables.
//!
//! Defines the nine tables the generator populates and renders their DDL for
//! PostgreSQL or DuckDB.

use std::collections::HashMap;
use std::fmt;

/// The tables this crate generates rows for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    Users,
    Tags,
    Assets,
    Events,
    Incidents,
    UserAssets,
    AssetTags,
    EventOccurrences,
    IncidentOccurrences,
}

impl TableId {
    /// Order used for the final statistics report
    pub const REPORT_ORDER: [TableId; 9] = [
        TableId::Users,
        TableId::Assets,
        TableId::Tags,
        TableId::Events,
        TableId::Incidents,
        TableId::EventOccurrences,
        TableId::IncidentOccurrences,
        TableId::UserAssets,
        TableId::AssetTags,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TableId::Users => "users",
            TableId::Tags => "tags",
            TableId::Assets => "assets",
            TableId::Events => "events",
            TableId::Incidents => "incidents",
            TableId::UserAssets => "user_assets",
            TableId::AssetTags => "asset_tags",
            TableId::EventOccurrences => "event_occurrences",
            TableId::IncidentOccurrences => "incident_occurrences",
        }
    }

    /// Insert column list, in the order rows encode their values
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            TableId::Users => &["id", "username", "email", "created_at", "updated_at"],
            TableId::Tags => &["id", "name", "description", "created_at", "updated_at"],
            TableId::Assets => &[
                "id",
                "name",
                "asset_type",
                "status",
                "metadata",
                "created_at",
                "updated_at",
            ],
            TableId::Events => &[
                "id",
                "asset_id",
                "event_type",
                "severity",
                "description",
                "metadata",
                "created_at",
                "updated_at",
            ],
            TableId::Incidents => &[
                "id",
                "asset_id",
                "incident_type",
                "severity",
                "priority",
                "title",
                "description",
                "status",
                "metadata",
                "created_at",
                "updated_at",
                "resolved_at",
            ],
            TableId::UserAssets => &["user_id", "asset_id", "role", "assigned_at"],
            TableId::AssetTags => &["asset_id", "tag_id", "tagged_at"],
            TableId::EventOccurrences => &[
                "id",
                "event_id",
                "occurred_at",
                "details",
                "status",
                "created_at",
                "updated_at",
            ],
            TableId::IncidentOccurrences => &[
                "id",
                "incident_id",
                "occurred_at",
                "details",
                "status",
                "created_at",
                "updated_at",
            ],
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target SQL dialect for DDL rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    DuckDb,
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "duckdb" | "duck" => Ok(Dialect::DuckDb),
            _ => Err(format!("Unknown dialect: {}. Use postgres or duckdb", s)),
        }
    }
}

/// SQL data types (dialect-agnostic)
#[derive(Debug, Clone, PartialEq)]
pub enum SqlType {
    Uuid,
    /// Variable-length string
    VarChar(u16),
    /// Unlimited text
    Text,
    /// Structured document
    Json,
    /// Timestamp with time zone
    Timestamp,
}

impl SqlType {
    /// Returns the PostgreSQL type string
    pub fn to_postgres(&self) -> String {
        match self {
            SqlType::Uuid => "UUID".to_string(),
            SqlType::VarChar(n) => format!("VARCHAR({})", n),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Json => "JSONB".to_string(),
            SqlType::Timestamp => "TIMESTAMPTZ".to_string(),
        }
    }

    /// Returns the DuckDB type string.
    ///
    /// Identifiers and documents are stored as text; timestamps are UTC.
    pub fn to_duckdb(&self) -> String {
        match self {
            SqlType::Uuid => "VARCHAR".to_string(),
            SqlType::VarChar(_) | SqlType::Text | SqlType::Json => "VARCHAR".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn render(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::Postgres => self.to_postgres(),
            Dialect::DuckDb => self.to_duckdb(),
        }
    }
}

/// Foreign key constraint
#[derive(Debug, Clone)]
pub struct ForeignKey {
    pub to_table: String,
    pub to_column: String,
    pub on_delete_cascade: bool,
}

/// Column definition
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    pub not_null: bool,
    pub primary_key: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null: false,
            primary_key: false,
            foreign_key: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            to_table: table.into(),
            to_column: column.into(),
            on_delete_cascade: false,
        });
        self.not_null = true;
        self
    }

    /// Delete this row with its parent. Only valid after [`references`](Self::references).
    pub fn on_delete_cascade(mut self) -> Self {
        if let Some(fk) = &mut self.foreign_key {
            fk.on_delete_cascade = true;
        }
        self
    }

    fn render(&self, dialect: Dialect, inline_pk: bool) -> String {
        let mut sql = format!("    {} {}", self.name, self.sql_type.render(dialect));
        if self.primary_key && inline_pk {
            sql.push_str(" PRIMARY KEY");
        } else if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(fk) = &self.foreign_key {
            sql.push_str(&format!(" REFERENCES {}({})", fk.to_table, fk.to_column));
            // DuckDB rejects referential actions
            if dialect == Dialect::Postgres && fk.on_delete_cascade {
                sql.push_str(" ON DELETE CASCADE");
            }
        }
        sql
    }
}

/// Table definition
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub has_timestamps: bool,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            has_timestamps: false,
        }
    }

    pub fn column(mut self, col: Column) -> Self {
        self.columns.push(col);
        self
    }

    /// Append NOT NULL `created_at` / `updated_at` columns
    pub fn timestamps(mut self) -> Self {
        self.has_timestamps = true;
        self
    }

    /// Primary key columns (composite for join tables)
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Get all foreign key relationships
    pub fn foreign_keys(&self) -> Vec<(&str, &ForeignKey)> {
        self.columns
            .iter()
            .filter_map(|c| c.foreign_key.as_ref().map(|fk| (c.name.as_str(), fk)))
            .collect()
    }

    /// Get all column names (including timestamp columns if enabled)
    pub fn all_column_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        if self.has_timestamps {
            names.push("created_at");
            names.push("updated_at");
        }
        names
    }

    /// Render a `CREATE TABLE IF NOT EXISTS` statement
    pub fn to_ddl(&self, dialect: Dialect) -> String {
        let pk = self.primary_key_columns();
        let inline_pk = pk.len() == 1;

        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.render(dialect, inline_pk))
            .collect();
        if self.has_timestamps {
            let ts = SqlType::Timestamp.render(dialect);
            lines.push(format!("    created_at {} NOT NULL", ts));
            lines.push(format!("    updated_at {} NOT NULL", ts));
        }
        if pk.len() > 1 {
            lines.push(format!("    PRIMARY KEY ({})", pk.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.name,
            lines.join(",\n")
        )
    }
}

/// Complete schema definition
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub tables: Vec<Table>,
    table_index: HashMap<String, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: Table) -> Self {
        let idx = self.tables.len();
        self.table_index.insert(table.name.clone(), idx);
        self.tables.push(table);
        self
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.table_index.get(name).map(|&idx| &self.tables[idx])
    }

    /// Get tables in topological order (dependencies first)
    pub fn tables_in_order(&self) -> Vec<&Table> {
        let mut visited = vec![false; self.tables.len()];
        let mut result = Vec::with_capacity(self.tables.len());

        fn visit<'a>(
            idx: usize,
            tables: &'a [Table],
            table_index: &HashMap<String, usize>,
            visited: &mut [bool],
            result: &mut Vec<&'a Table>,
        ) {
            if visited[idx] {
                return;
            }
            visited[idx] = true;

            for (_, fk) in tables[idx].foreign_keys() {
                if let Some(&dep_idx) = table_index.get(&fk.to_table) {
                    visit(dep_idx, tables, table_index, visited, result);
                }
            }

            result.push(&tables[idx]);
        }

        for idx in 0..self.tables.len() {
            visit(
                idx,
                &self.tables,
                &self.table_index,
                &mut visited,
                &mut result,
            );
        }

        result
    }

    /// DDL statements for every table, parents before children
    pub fn ddl_statements(&self, dialect: Dialect) -> Vec<String> {
        self.tables_in_order()
            .into_iter()
            .map(|t| t.to_ddl(dialect))
            .collect()
    }

    /// Full DDL script
    pub fn to_ddl(&self, dialect: Dialect) -> String {
        let mut script = self.ddl_statements(dialect).join("\n\n");
        script.push('\n');
        script
    }
}

/// The schema populated by this crate
pub fn security_schema() -> Schema {
    let id = || Column::new("id", SqlType::Uuid).primary_key();

    let occurrences = |table: TableId, parent: TableId, parent_column: &str| {
        Table::new(table.name())
            .column(id())
            .column(
                Column::new(parent_column, SqlType::Uuid)
                    .references(parent.name(), "id")
                    .on_delete_cascade(),
            )
            .column(Column::new("occurred_at", SqlType::Timestamp).not_null())
            .column(Column::new("details", SqlType::Json))
            .column(Column::new("status", SqlType::VarChar(50)).not_null())
            .timestamps()
    };

    Schema::new()
        .table(
            Table::new(TableId::Users.name())
                .column(id())
                .column(Column::new("username", SqlType::VarChar(255)).not_null())
                .column(Column::new("email", SqlType::VarChar(255)).not_null())
                .timestamps(),
        )
        .table(
            Table::new(TableId::Tags.name())
                .column(id())
                .column(Column::new("name", SqlType::VarChar(255)).not_null())
                .column(Column::new("description", SqlType::Text))
                .timestamps(),
        )
        .table(
            Table::new(TableId::Assets.name())
                .column(id())
                .column(Column::new("name", SqlType::VarChar(255)).not_null())
                .column(Column::new("asset_type", SqlType::VarChar(50)).not_null())
                .column(Column::new("status", SqlType::VarChar(50)).not_null())
                .column(Column::new("metadata", SqlType::Json))
                .timestamps(),
        )
        .table(
            Table::new(TableId::Events.name())
                .column(id())
                .column(
                    Column::new("asset_id", SqlType::Uuid)
                        .references(TableId::Assets.name(), "id")
                        .on_delete_cascade(),
                )
                .column(Column::new("event_type", SqlType::VarChar(100)).not_null())
                .column(Column::new("severity", SqlType::VarChar(20)).not_null())
                .column(Column::new("description", SqlType::Text))
                .column(Column::new("metadata", SqlType::Json))
                .timestamps(),
        )
        .table(
            Table::new(TableId::Incidents.name())
                .column(id())
                .column(
                    Column::new("asset_id", SqlType::Uuid)
                        .references(TableId::Assets.name(), "id")
                        .on_delete_cascade(),
                )
                .column(Column::new("incident_type", SqlType::VarChar(100)).not_null())
                .column(Column::new("severity", SqlType::VarChar(20)).not_null())
                .column(Column::new("priority", SqlType::VarChar(20)).not_null())
                .column(Column::new("title", SqlType::VarChar(500)).not_null())
                .column(Column::new("description", SqlType::Text))
                .column(Column::new("status", SqlType::VarChar(50)).not_null())
                .column(Column::new("metadata", SqlType::Json))
                .timestamps()
                .column(Column::new("resolved_at", SqlType::Timestamp)),
        )
        .table(
            Table::new(TableId::UserAssets.name())
                .column(
                    Column::new("user_id", SqlType::Uuid)
                        .primary_key()
                        .references(TableId::Users.name(), "id")
                        .on_delete_cascade(),
                )
                .column(
                    Column::new("asset_id", SqlType::Uuid)
                        .primary_key()
                        .references(TableId::Assets.name(), "id")
                        .on_delete_cascade(),
                )
                .column(Column::new("role", SqlType::VarChar(50)).not_null())
                .column(Column::new("assigned_at", SqlType::Timestamp).not_null()),
        )
        .table(
            Table::new(TableId::AssetTags.name())
                .column(
                    Column::new("asset_id", SqlType::Uuid)
                        .primary_key()
                        .references(TableId::Assets.name(), "id")
                        .on_delete_cascade(),
                )
                .column(
                    Column::new("tag_id", SqlType::Uuid)
                        .primary_key()
                        .references(TableId::Tags.name(), "id")
                        .on_delete_cascade(),
                )
                .column(Column::new("tagged_at", SqlType::Timestamp).not_null()),
        )
        .table(occurrences(
            TableId::EventOccurrences,
            TableId::Events,
            "event_id",
        ))
        .table(occurrences(
            TableId::IncidentOccurrences,
            TableId::Incidents,
            "incident_id",
        ))
}

//! Typed rows and their SQL value encoding.

use crate::schema::TableId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

/// SQL value representation
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Json(Value),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Format as a SQL literal (PostgreSQL and DuckDB agree on this syntax)
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::Float(n) => n.to_string(),
            SqlValue::Text(s) => format!("'{}'", escape_sql_string(s)),
            SqlValue::Uuid(u) => format!("'{}'", u),
            SqlValue::Json(v) => format!("'{}'", escape_sql_string(&v.to_string())),
            SqlValue::Timestamp(ts) => format!(
                "TIMESTAMP '{}'",
                ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f")
            ),
        }
    }

    /// Append the PostgreSQL COPY text-format encoding of this value
    pub fn write_copy_text(&self, out: &mut String) {
        match self {
            SqlValue::Null => out.push_str("\\N"),
            SqlValue::Int(n) => out.push_str(&n.to_string()),
            SqlValue::Float(n) => out.push_str(&n.to_string()),
            SqlValue::Text(s) => escape_copy_into(s, out),
            SqlValue::Uuid(u) => out.push_str(&u.hyphenated().to_string()),
            SqlValue::Json(v) => escape_copy_into(&v.to_string(), out),
            SqlValue::Timestamp(ts) => {
                out.push_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        }
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(ts: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(ts)
    }
}

impl From<Option<DateTime<Utc>>> for SqlValue {
    fn from(ts: Option<DateTime<Utc>>) -> Self {
        ts.map_or(SqlValue::Null, SqlValue::Timestamp)
    }
}

impl From<Uuid> for SqlValue {
    fn from(id: Uuid) -> Self {
        SqlValue::Uuid(id)
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<Value> for SqlValue {
    fn from(v: Value) -> Self {
        SqlValue::Json(v)
    }
}

fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

fn escape_copy_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
}

/// Encode rows as PostgreSQL COPY text format (tab-separated, newline-terminated)
pub fn encode_copy_rows(rows: &[Row], out: &mut String) {
    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                out.push('\t');
            }
            value.write_copy_text(out);
        }
        out.push('\n');
    }
}

/// A row of generated data, in [`TableId::columns`] order
pub type Row = Vec<SqlValue>;

/// Conversion of a typed row into its column values
pub trait ToSqlRow {
    fn into_values(self) -> Row;
}

/// Generated rows for a single table
#[derive(Debug, Clone)]
pub struct TableData {
    pub table: TableId,
    pub rows: Vec<Row>,
}

impl TableData {
    pub fn from_rows<T: ToSqlRow>(table: TableId, rows: Vec<T>) -> Self {
        Self {
            table,
            rows: rows.into_iter().map(ToSqlRow::into_values).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToSqlRow for UserRow {
    fn into_values(self) -> Row {
        vec![
            self.id.into(),
            self.username.into(),
            self.email.into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToSqlRow for TagRow {
    fn into_values(self) -> Row {
        vec![
            self.id.into(),
            self.name.into(),
            self.description.into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRow {
    pub id: Uuid,
    pub name: String,
    pub asset_type: &'static str,
    pub status: &'static str,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToSqlRow for AssetRow {
    fn into_values(self) -> Row {
        vec![
            self.id.into(),
            self.name.into(),
            self.asset_type.into(),
            self.status.into(),
            self.metadata.into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub event_type: &'static str,
    pub severity: &'static str,
    pub description: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToSqlRow for EventRow {
    fn into_values(self) -> Row {
        vec![
            self.id.into(),
            self.asset_id.into(),
            self.event_type.into(),
            self.severity.into(),
            self.description.into(),
            self.metadata.into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRow {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub incident_type: &'static str,
    pub severity: &'static str,
    pub priority: &'static str,
    pub title: String,
    pub description: String,
    pub status: &'static str,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only for resolved or closed incidents
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ToSqlRow for IncidentRow {
    fn into_values(self) -> Row {
        vec![
            self.id.into(),
            self.asset_id.into(),
            self.incident_type.into(),
            self.severity.into(),
            self.priority.into(),
            self.title.into(),
            self.description.into(),
            self.status.into(),
            self.metadata.into(),
            self.created_at.into(),
            self.updated_at.into(),
            self.resolved_at.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserAssetRow {
    pub user_id: Uuid,
    pub asset_id: Uuid,
    pub role: &'static str,
    pub assigned_at: DateTime<Utc>,
}

impl ToSqlRow for UserAssetRow {
    fn into_values(self) -> Row {
        vec![
            self.user_id.into(),
            self.asset_id.into(),
            self.role.into(),
            self.assigned_at.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetTagRow {
    pub asset_id: Uuid,
    pub tag_id: Uuid,
    pub tagged_at: DateTime<Utc>,
}

impl ToSqlRow for AssetTagRow {
    fn into_values(self) -> Row {
        vec![
            self.asset_id.into(),
            self.tag_id.into(),
            self.tagged_at.into(),
        ]
    }
}

/// One observed firing of an event or incident
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceRow {
    pub id: Uuid,
    /// Event or incident id, depending on the occurrence table
    pub parent_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub details: Value,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToSqlRow for OccurrenceRow {
    fn into_values(self) -> Row {
        vec![
            self.id.into(),
            self.parent_id.into(),
            self.occurred_at.into(),
            self.details.into(),
            self.status.into(),
            self.created_at.into(),
            self.updated_at.into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_copy_text_escaping() {
        let mut out = String::new();
        SqlValue::Text("a\tb\nc\\d".to_string()).write_copy_text(&mut out);
        assert_eq!(out, "a\\tb\\nc\\\\d");

        out.clear();
        SqlValue::Null.write_copy_text(&mut out);
        assert_eq!(out, "\\N");

        out.clear();
        SqlValue::Timestamp(ts()).write_copy_text(&mut out);
        assert_eq!(out, "2024-03-09T08:30:00.000000Z");
    }

    #[test]
    fn test_copy_json_stays_on_one_line() {
        let mut out = String::new();
        encode_copy_rows(
            &[vec![
                SqlValue::Int(1),
                SqlValue::Json(json!({"raw_log": "line one\nline two"})),
            ]],
            &mut out,
        );
        assert_eq!(out.matches('\n').count(), 1);
        assert!(out.starts_with("1\t{"));
        assert!(out.contains("line one\\\\nline two"));
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(SqlValue::Text("O'Brien".into()).to_sql_literal(), "'O''Brien'");
        assert_eq!(SqlValue::Null.to_sql_literal(), "NULL");
        assert_eq!(
            SqlValue::Timestamp(ts()).to_sql_literal(),
            "TIMESTAMP '2024-03-09 08:30:00.000000'"
        );
        assert_eq!(
            SqlValue::Json(json!({"k": "it's"})).to_sql_literal(),
            "'{\"k\":\"it''s\"}'"
        );
    }

    #[test]
    fn test_incident_row_values_follow_column_order() {
        let row = IncidentRow {
            id: Uuid::from_u128(1),
            asset_id: Uuid::from_u128(2),
            incident_type: "data_leak",
            severity: "high",
            priority: "urgent",
            title: "INC-1000: Data Leak".to_string(),
            description: "desc".to_string(),
            status: "open",
            metadata: json!({}),
            created_at: ts(),
            updated_at: ts(),
            resolved_at: None,
        };
        let values = row.into_values();
        assert_eq!(values.len(), TableId::Incidents.columns().len());
        assert_eq!(values[1], SqlValue::Uuid(Uuid::from_u128(2)));
        assert_eq!(values[11], SqlValue::Null);
    }
}

//! Schema introspection over `information_schema`.
//!
//! Every lookup is a fixed catalog query run through the executor's read
//! path, with user-supplied names bound as parameters.

use serde::Serialize;
use sqlgate_core::{Cx, Driver, Row, Value};

use crate::config::ConfigSource;
use crate::error::GatewayError;
use crate::executor;
use crate::session::SessionManager;

/// Schema used when the caller names none.
pub const DEFAULT_SCHEMA: &str = "public";

const LIST_SCHEMAS_SQL: &str = "SELECT schema_name \
     FROM information_schema.schemata \
     WHERE schema_name NOT IN ('pg_catalog', 'information_schema') \
     ORDER BY schema_name";

const LIST_TABLES_SQL: &str = "SELECT table_name \
     FROM information_schema.tables \
     WHERE table_schema = %s \
     AND table_type = 'BASE TABLE' \
     ORDER BY table_name";

const DESCRIBE_TABLE_SQL: &str = "SELECT column_name, data_type, character_maximum_length, \
     numeric_precision, numeric_scale, is_nullable, column_default \
     FROM information_schema.columns \
     WHERE table_schema = %s AND table_name = %s \
     ORDER BY ordinal_position";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemasReply {
    pub schemas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TablesReply {
    pub schema: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescription {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnDescription>,
}

/// One column of a described table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    #[serde(flatten)]
    pub size: Option<ColumnSize>,
}

/// Size information of a column: a character length or a numeric precision, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ColumnSize {
    Length {
        length: i64,
    },
    Numeric {
        precision: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        scale: Option<i64>,
    },
}

impl ColumnSize {
    /// Pick the size from the catalog's length, precision and scale columns.
    ///
    /// Null and zero count as absent; a length wins over a precision.
    pub fn from_catalog(length: Option<i64>, precision: Option<i64>, scale: Option<i64>) -> Option<Self> {
        let present = |v: Option<i64>| v.filter(|&n| n != 0);
        if let Some(length) = present(length) {
            return Some(ColumnSize::Length { length });
        }
        present(precision).map(|precision| ColumnSize::Numeric {
            precision,
            scale: present(scale),
        })
    }
}

/// Every user schema, by name.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn list_schemas<D: Driver, S: ConfigSource>(
    sessions: &SessionManager<D, S>,
    cx: &Cx,
) -> Result<SchemasReply, GatewayError> {
    let (_, rows) = executor::fetch(sessions, cx, LIST_SCHEMAS_SQL, &[]).await?;
    Ok(SchemasReply {
        schemas: rows.iter().map(|row| text(row, 0)).collect(),
    })
}

/// Base tables of `schema`, by name.
#[tracing::instrument(level = "debug", skip(sessions, cx))]
pub async fn list_tables<D: Driver, S: ConfigSource>(
    sessions: &SessionManager<D, S>,
    cx: &Cx,
    schema: &str,
) -> Result<TablesReply, GatewayError> {
    let params = [Value::Text(schema.to_string())];
    let (_, rows) = executor::fetch(sessions, cx, LIST_TABLES_SQL, &params).await?;
    Ok(TablesReply {
        schema: schema.to_string(),
        tables: rows.iter().map(|row| text(row, 0)).collect(),
    })
}

/// Columns of `schema.table` in ordinal order. An unknown table has no columns.
#[tracing::instrument(level = "debug", skip(sessions, cx))]
pub async fn describe_table<D: Driver, S: ConfigSource>(
    sessions: &SessionManager<D, S>,
    cx: &Cx,
    table: &str,
    schema: &str,
) -> Result<TableDescription, GatewayError> {
    let params = [Value::Text(schema.to_string()), Value::Text(table.to_string())];
    let (_, rows) = executor::fetch(sessions, cx, DESCRIBE_TABLE_SQL, &params).await?;
    Ok(TableDescription {
        schema: schema.to_string(),
        table: table.to_string(),
        columns: rows.iter().map(describe_column).collect(),
    })
}

fn describe_column(row: &Row) -> ColumnDescription {
    ColumnDescription {
        name: text(row, 0),
        data_type: text(row, 1),
        nullable: row.get(5).and_then(Value::as_str) == Some("YES"),
        default: row.get(6).filter(|v| !v.is_null()).map(render),
        size: ColumnSize::from_catalog(integer(row, 2), integer(row, 3), integer(row, 4)),
    }
}

fn text(row: &Row, index: usize) -> String {
    row.get(index).map(render).unwrap_or_default()
}

fn integer(row: &Row, index: usize) -> Option<i64> {
    let value = row.get(index)?;
    value.as_i64().or_else(|| value.as_str()?.trim().parse().ok())
}

fn render(value: &Value) -> String {
    match value {
        Value::Text(s) | Value::Decimal(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_json().to_string(),
    }
}

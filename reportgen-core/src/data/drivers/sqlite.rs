//! SQLite drivers: sqlx for `async` mode, rusqlite for `sync` mode.
//!
//! # Connection String Formats
//! - `sqlite:///path/to/database.db` or `sqlite://./relative.db`
//! - `sqlite::memory:` or `:memory:`
//! - a plain file path (`./data/sales.db`)

use super::{AsyncQueryExecutor, BlockingQueryExecutor, DriverError, bind_json, encode_bytes};
use crate::data::params::BoundQuery;
use crate::data::rows::{Row, RowSet};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row as _};
use std::str::FromStr;

/// Non-blocking SQLite driver.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    url: String,
    read_only: bool,
}

impl SqliteExecutor {
    /// Creates a driver for `url`.
    pub fn new(url: impl Into<String>, read_only: bool) -> Self {
        Self {
            url: url.into(),
            read_only,
        }
    }
}

#[async_trait]
impl AsyncQueryExecutor for SqliteExecutor {
    async fn fetch_rows(&self, query: &BoundQuery) -> Result<RowSet, DriverError> {
        let options = SqliteConnectOptions::from_str(&self.url)
            .map_err(|e| DriverError::connect(&self.url, e))?
            .read_only(self.read_only);
        let mut conn = options
            .connect()
            .await
            .map_err(|e| DriverError::connect(&self.url, e))?;

        let mut statement = sqlx::query(&query.sql);
        for value in &query.params {
            statement = bind_json(statement, value);
        }
        let rows = statement
            .fetch_all(&mut conn)
            .await
            .map_err(DriverError::execute)?;

        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing SQLite connection: {}", e);
        }

        Ok(rows.iter().map(row_to_json).collect())
    }
}

/// Converts a sqlx row, keeping column order.
fn row_to_json(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let name = column.name();
            (name.to_string(), extract_column_value(row, name))
        })
        .collect()
}

/// Extracts a column value as JSON.
///
/// SQLite is dynamically typed, so each type is tried in turn.
fn extract_column_value(row: &SqliteRow, column_name: &str) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(column_name) {
        return v.map_or(JsonValue::Null, JsonValue::String);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(column_name) {
        return v.map_or(JsonValue::Null, |n| JsonValue::Number(n.into()));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(column_name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map_or(JsonValue::Null, JsonValue::Number);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(column_name) {
        return v.map_or(JsonValue::Null, JsonValue::Bool);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(column_name) {
        return v.map_or(JsonValue::Null, |bytes| encode_bytes(&bytes));
    }

    JsonValue::Null
}

/// Blocking SQLite driver backed by rusqlite.
#[derive(Debug, Clone)]
pub struct RusqliteExecutor {
    url: String,
    read_only: bool,
}

impl RusqliteExecutor {
    /// Creates a driver for `url`.
    pub fn new(url: impl Into<String>, read_only: bool) -> Self {
        Self {
            url: url.into(),
            read_only,
        }
    }

    fn open(&self) -> Result<rusqlite::Connection, DriverError> {
        use rusqlite::OpenFlags;

        let path = database_path(&self.url);
        let result = if path == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else if self.read_only {
            rusqlite::Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        } else {
            rusqlite::Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        };
        result.map_err(|e| DriverError::connect(&self.url, e))
    }
}

impl BlockingQueryExecutor for RusqliteExecutor {
    fn fetch_rows(&self, query: &BoundQuery) -> Result<RowSet, DriverError> {
        let conn = self.open()?;
        let mut statement = conn.prepare(&query.sql).map_err(DriverError::execute)?;
        let names: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let params: Vec<rusqlite::types::Value> = query.params.iter().map(to_sqlite_value).collect();
        let mut rows = statement
            .query(rusqlite::params_from_iter(params.iter()))
            .map_err(DriverError::execute)?;

        let mut result = RowSet::new();
        while let Some(row) = rows.next().map_err(DriverError::execute)? {
            let mut record = Row::new();
            for (index, name) in names.iter().enumerate() {
                let value = row.get_ref(index).map_err(DriverError::execute)?;
                record.insert(name.clone(), from_sqlite_value(value));
            }
            result.push(record);
        }
        Ok(result)
    }
}

fn to_sqlite_value(value: &JsonValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;

    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Integer(i64::from(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => Value::Text(s.clone()),
        other @ (JsonValue::Array(_) | JsonValue::Object(_)) => Value::Text(other.to_string()),
    }
}

fn from_sqlite_value(value: rusqlite::types::ValueRef<'_>) -> JsonValue {
    use rusqlite::types::ValueRef;

    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(n) => JsonValue::Number(n.into()),
        ValueRef::Real(f) => {
            serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
        }
        ValueRef::Text(text) => JsonValue::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => encode_bytes(bytes),
    }
}

/// Strips the URL scheme and query string from a SQLite connection string.
fn database_path(url: &str) -> &str {
    let without_scheme = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = without_scheme
        .split('?')
        .next()
        .unwrap_or(without_scheme);
    if path.is_empty() { ":memory:" } else { path }
}

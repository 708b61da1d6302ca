//! MySQL driver.

use super::{AsyncQueryExecutor, DriverError, bind_json, encode_bytes};
use crate::data::params::BoundQuery;
use crate::data::rows::{Row, RowSet};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlColumn, MySqlConnection, MySqlRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, Connection, Row as _, TypeInfo};

/// Non-blocking MySQL driver.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    url: String,
}

impl MySqlExecutor {
    /// Creates a driver for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl AsyncQueryExecutor for MySqlExecutor {
    async fn fetch_rows(&self, query: &BoundQuery) -> Result<RowSet, DriverError> {
        let mut conn = MySqlConnection::connect(&self.url)
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
            tracing::debug!("Error closing MySQL connection: {}", e);
        }

        Ok(rows.iter().map(row_to_json).collect())
    }
}

fn row_to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), extract_column_value(row, column)))
        .collect()
}

/// Extracts a column value as JSON.
///
/// Decimal and temporal columns are decoded by their declared type, since
/// none of the generic fallbacks accept them. Everything else tries types in
/// order of likelihood.
fn extract_column_value(row: &MySqlRow, column: &MySqlColumn) -> JsonValue {
    let name = column.name();
    match column.type_info().name() {
        "DECIMAL" => {
            if let Ok(v) = row.try_get::<Option<BigDecimal>, _>(name) {
                return v.map_or(JsonValue::Null, |d| decimal_to_json(&d.to_string()));
            }
        }
        "DATE" => {
            if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(name) {
                return v.map_or(JsonValue::Null, |d| {
                    JsonValue::String(d.format("%Y-%m-%d").to_string())
                });
            }
        }
        "DATETIME" => {
            if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(name) {
                return v.map_or(JsonValue::Null, |d| {
                    JsonValue::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
                });
            }
        }
        "TIMESTAMP" => {
            if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(name) {
                return v.map_or(JsonValue::Null, |d| JsonValue::String(d.to_rfc3339()));
            }
        }
        "TIME" => {
            if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(name) {
                return v.map_or(JsonValue::Null, |t| JsonValue::String(t.to_string()));
            }
        }
        "JSON" => {
            if let Ok(v) = row.try_get::<Option<JsonValue>, _>(name) {
                return v.unwrap_or(JsonValue::Null);
            }
        }
        _ => {}
    }

    if let Ok(v) = row.try_get::<Option<String>, _>(name) {
        return v.map_or(JsonValue::Null, JsonValue::String);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
        return v.map_or(JsonValue::Null, |n| JsonValue::Number(n.into()));
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(name) {
        return v.map_or(JsonValue::Null, |n| JsonValue::Number(n.into()));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map_or(JsonValue::Null, JsonValue::Number);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(name) {
        return v.map_or(JsonValue::Null, JsonValue::Bool);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(name) {
        return v.map_or(JsonValue::Null, |bytes| encode_bytes(&bytes));
    }

    tracing::debug!(
        "Column '{}' has undecodable type {}; emitting null",
        name,
        column.type_info().name()
    );
    JsonValue::Null
}

/// JSON number for a decimal's text form, or the text itself when it does
/// not fit a JSON number.
fn decimal_to_json(text: &str) -> JsonValue {
    match serde_json::from_str::<JsonValue>(text) {
        Ok(number @ JsonValue::Number(_)) => number,
        _ => JsonValue::String(text.to_string()),
    }
}

//! PostgreSQL driver.
//!
//! Rows are materialized server-side with `row_to_json`, so every column
//! type PostgreSQL can express maps onto JSON without client-side decoding.

use super::{AsyncQueryExecutor, DriverError, bind_json};
use crate::data::params::BoundQuery;
use crate::data::rows::{Row, RowSet};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Row as _};

/// Non-blocking PostgreSQL driver.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    url: String,
}

impl PostgresExecutor {
    /// Creates a driver for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Wraps a query so each row comes back as one JSON object.
pub fn wrap_query(sql: &str) -> String {
    let inner = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT row_to_json(q.*) AS row_data FROM ({}) q", inner)
}

#[async_trait]
impl AsyncQueryExecutor for PostgresExecutor {
    async fn fetch_rows(&self, query: &BoundQuery) -> Result<RowSet, DriverError> {
        let mut conn = PgConnection::connect(&self.url)
            .await
            .map_err(|e| DriverError::connect(&self.url, e))?;

        let wrapped = wrap_query(&query.sql);
        tracing::trace!("Executing wrapped PostgreSQL query: {}", wrapped);

        let mut statement = sqlx::query(&wrapped);
        for value in &query.params {
            statement = bind_json(statement, value);
        }
        let rows = statement
            .fetch_all(&mut conn)
            .await
            .map_err(DriverError::execute)?;

        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing PostgreSQL connection: {}", e);
        }

        rows.iter()
            .map(|row| -> Result<Row, DriverError> {
                let data: JsonValue = row.try_get("row_data").map_err(DriverError::execute)?;
                Ok(match data {
                    JsonValue::Object(map) => map,
                    other => {
                        let mut row = Row::new();
                        row.insert("value".to_string(), other);
                        row
                    }
                })
            })
            .collect()
    }
}

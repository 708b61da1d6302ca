//! SQL drivers behind an execution-mode capability.
//!
//! Every driver opens a fresh connection per call, runs one query and
//! materializes every row. Drivers come in two flavours:
//!
//! - [`AsyncQueryExecutor`]: native non-blocking drivers (sqlx), awaited in place
//! - [`BlockingQueryExecutor`]: drivers that block the calling thread; these
//!   always run on tokio's blocking pool via `spawn_blocking`
//!
//! [`open_executor`] picks the implementation from a connection's
//! `driver_kind` and `execution_mode`.

use super::params::BoundQuery;
use super::rows::RowSet;
use crate::config::{ConnectionConfig, DriverKind, ExecutionMode};
use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgresql")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Boxed driver error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures reported by a driver. Connection strings never appear verbatim.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Opening the connection failed
    #[error("failed to connect to {target}")]
    Connect {
        target: String,
        #[source]
        source: BoxError,
    },

    /// Preparing, binding or executing the query failed
    #[error("query execution failed")]
    Execute {
        #[source]
        source: BoxError,
    },

    /// The blocking worker could not run or panicked
    #[error("blocking worker failed: {message}")]
    Worker { message: String },

    /// The driver was not compiled into this build
    #[error("{kind} support is not compiled in; enable the matching cargo feature")]
    Unavailable { kind: DriverKind },
}

impl DriverError {
    /// Wraps a connection failure, redacting the target.
    pub fn connect<E>(url: &str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connect {
            target: crate::error::redact_database_url(url),
            source: Box::new(error),
        }
    }

    /// Wraps a query failure.
    pub fn execute<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Execute {
            source: Box::new(error),
        }
    }
}

/// A driver that is awaited directly.
#[async_trait]
pub trait AsyncQueryExecutor: Send + Sync {
    /// Opens a connection, runs `query` and returns every row.
    async fn fetch_rows(&self, query: &BoundQuery) -> Result<RowSet, DriverError>;
}

/// A driver that blocks the calling thread.
pub trait BlockingQueryExecutor: Send + Sync {
    /// Opens a connection, runs `query` and returns every row.
    fn fetch_rows(&self, query: &BoundQuery) -> Result<RowSet, DriverError>;
}

/// Runs an async driver to completion on a dedicated current-thread runtime.
///
/// This is how `sync` mode is provided for drivers that only exist as async
/// implementations: the call is still offloaded to the blocking pool, and
/// never touches the caller's runtime.
pub struct CurrentThreadExecutor<E> {
    inner: E,
}

impl<E> CurrentThreadExecutor<E> {
    /// Wraps an async executor.
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: AsyncQueryExecutor> BlockingQueryExecutor for CurrentThreadExecutor<E> {
    fn fetch_rows(&self, query: &BoundQuery) -> Result<RowSet, DriverError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DriverError::Worker {
                message: format!("failed to start driver runtime: {}", e),
            })?;
        runtime.block_on(self.inner.fetch_rows(query))
    }
}

/// An opened driver, tagged with how it must be driven.
pub enum Executor {
    /// Awaited in place
    Async(Box<dyn AsyncQueryExecutor>),
    /// Offloaded with `spawn_blocking`
    Blocking(Box<dyn BlockingQueryExecutor>),
}

impl Executor {
    /// The execution mode this executor honours.
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Executor::Async(_) => ExecutionMode::Async,
            Executor::Blocking(_) => ExecutionMode::Sync,
        }
    }

    /// Runs the query, offloading blocking drivers to the blocking pool.
    pub async fn fetch_rows(self, query: BoundQuery) -> Result<RowSet, DriverError> {
        match self {
            Executor::Async(executor) => executor.fetch_rows(&query).await,
            Executor::Blocking(executor) => {
                tokio::task::spawn_blocking(move || executor.fetch_rows(&query))
                    .await
                    .map_err(|e| DriverError::Worker {
                        message: e.to_string(),
                    })?
            }
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Executor").field(&self.mode()).finish()
    }
}

/// Selects the driver for a connection.
///
/// `url` is the already-resolved connection string.
///
/// # Errors
/// Returns `DriverError::Unavailable` when the driver's feature is disabled.
#[allow(unreachable_patterns)]
pub fn open_executor(connection: &ConnectionConfig, url: String) -> Result<Executor, DriverError> {
    match (connection.driver_kind, connection.execution_mode) {
        #[cfg(feature = "sqlite")]
        (DriverKind::Sqlite, ExecutionMode::Async) => Ok(Executor::Async(Box::new(
            sqlite::SqliteExecutor::new(url, connection.read_only()),
        ))),
        #[cfg(feature = "sqlite")]
        (DriverKind::Sqlite, ExecutionMode::Sync) => Ok(Executor::Blocking(Box::new(
            sqlite::RusqliteExecutor::new(url, connection.read_only()),
        ))),
        #[cfg(feature = "postgresql")]
        (DriverKind::Postgresql, ExecutionMode::Async) => {
            Ok(Executor::Async(Box::new(postgres::PostgresExecutor::new(url))))
        }
        #[cfg(feature = "postgresql")]
        (DriverKind::Postgresql, ExecutionMode::Sync) => Ok(Executor::Blocking(Box::new(
            CurrentThreadExecutor::new(postgres::PostgresExecutor::new(url)),
        ))),
        #[cfg(feature = "mysql")]
        (DriverKind::Mysql, ExecutionMode::Async) => {
            Ok(Executor::Async(Box::new(mysql::MySqlExecutor::new(url))))
        }
        #[cfg(feature = "mysql")]
        (DriverKind::Mysql, ExecutionMode::Sync) => Ok(Executor::Blocking(Box::new(
            CurrentThreadExecutor::new(mysql::MySqlExecutor::new(url)),
        ))),
        (kind, _) => {
            drop(url);
            Err(DriverError::Unavailable { kind })
        }
    }
}

/// Binds one JSON parameter onto a sqlx query.
///
/// Arrays and objects bind as their JSON text; the database decides whether
/// it can cast them.
#[cfg(any(feature = "sqlite", feature = "postgresql", feature = "mysql"))]
pub(crate) fn bind_json<'q, DB>(
    query: sqlx::query::Query<'q, DB, <DB as sqlx::Database>::Arguments<'q>>,
    value: &serde_json::Value,
) -> sqlx::query::Query<'q, DB, <DB as sqlx::Database>::Arguments<'q>>
where
    DB: sqlx::Database,
    Option<String>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    bool: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    i64: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    f64: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    String: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
{
    use serde_json::Value;

    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        other @ (Value::Array(_) | Value::Object(_)) => query.bind(other.to_string()),
    }
}

/// Encodes a binary column value as `base64:<data>`.
pub(crate) fn encode_bytes(bytes: &[u8]) -> serde_json::Value {
    use base64::Engine;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    serde_json::Value::String(format!("base64:{}", encoded))
}

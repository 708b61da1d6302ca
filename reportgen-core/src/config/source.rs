//! Data sources and named database connections.

use crate::data::RowSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Supported SQL driver families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Sqlite,
    #[serde(alias = "postgres")]
    Postgresql,
    Mysql,
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverKind::Sqlite => write!(f, "SQLite"),
            DriverKind::Postgresql => write!(f, "PostgreSQL"),
            DriverKind::Mysql => write!(f, "MySQL"),
        }
    }
}

/// How a driver executes queries.
///
/// `Sync` drivers block the calling thread and are always offloaded to the
/// blocking worker pool; `Async` drivers are awaited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sync,
    #[default]
    Async,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Sync => write!(f, "sync"),
            ExecutionMode::Async => write!(f, "async"),
        }
    }
}

/// Where a connection string comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// Written directly in the report configuration
    Inline(String),
    /// Read from the named environment variable when the connection opens
    Env(String),
}

impl std::fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(url) => f
                .debug_tuple("Inline")
                .field(&crate::error::redact_database_url(url))
                .finish(),
            Self::Env(var) => f.debug_tuple("Env").field(var).finish(),
        }
    }
}

/// A named, reusable database access configuration.
///
/// # Security
/// `Debug` output never contains the raw connection string.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Connection string source
    pub target: ConnectionTarget,
    /// Driver family
    pub driver_kind: DriverKind,
    /// Blocking or non-blocking execution
    pub execution_mode: ExecutionMode,
    /// Driver-specific options, passed through opaquely
    pub options: Map<String, JsonValue>,
}

impl ConnectionConfig {
    /// Creates an inline connection config with the default async mode.
    pub fn new(connection_string: impl Into<String>, driver_kind: DriverKind) -> Self {
        Self {
            target: ConnectionTarget::Inline(connection_string.into()),
            driver_kind,
            execution_mode: ExecutionMode::default(),
            options: Map::new(),
        }
    }

    /// Builder method to set the execution mode.
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Builder method to set a driver option.
    pub fn with_option(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Resolves the connection string, reading the environment if needed.
    pub fn connection_string(&self) -> Result<String, std::env::VarError> {
        match &self.target {
            ConnectionTarget::Inline(url) => Ok(url.clone()),
            ConnectionTarget::Env(var) => std::env::var(var),
        }
    }

    /// Connection string safe for logs.
    pub fn display_target(&self) -> String {
        match &self.target {
            ConnectionTarget::Inline(url) => crate::error::redact_database_url(url),
            ConnectionTarget::Env(var) => format!("${}", var),
        }
    }

    /// Whether the `read_only` option is set.
    pub fn read_only(&self) -> bool {
        self.options
            .get("read_only")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }
}

/// Where a section's data comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Inline literal rows keyed by section id
    Json { data: BTreeMap<String, RowSet> },
    /// A query against a named connection
    Sql {
        connection_id: String,
        query: String,
    },
}

impl DataSource {
    /// Tag name as it appears in configuration.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataSource::Json { .. } => "json",
            DataSource::Sql { .. } => "sql",
        }
    }

    /// Connection id for SQL sources.
    pub fn connection_id(&self) -> Option<&str> {
        match self {
            DataSource::Sql { connection_id, .. } => Some(connection_id),
            DataSource::Json { .. } => None,
        }
    }
}

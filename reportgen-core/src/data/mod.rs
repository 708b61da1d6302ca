//! Data resolution: turning a section's data source into a row-set.
//!
//! Resolution order for a section:
//! 1. its own `data_source`, if present;
//! 2. otherwise the report-level `data_source`;
//! 3. otherwise the externally supplied [`ReportData`] payload.
//!
//! The first source present is authoritative. When it has nothing for the
//! section the result is `None` and the section is skipped at render time.
//! Nothing is cached: every call re-reads its source and SQL sources open a
//! fresh connection.

pub mod drivers;
pub mod params;
mod rows;

pub use rows::{ReportData, Row, RowSet, SectionData};

use crate::config::{DataSource, Parameters, ReportConfig, SectionConfig};
use crate::{ReportError, Result};
use futures::{StreamExt, TryStreamExt, stream};
use params::bind_named;
use tracing::debug;

/// Default number of sections resolved at the same time.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Resolves section data for one report generation.
///
/// A resolver is request-scoped: it carries the report-level parameters
/// merged with any request overrides, and is dropped once the report is
/// assembled.
#[derive(Debug, Clone)]
pub struct DataResolver<'a> {
    config: &'a ReportConfig,
    parameters: Parameters,
    max_concurrency: usize,
}

impl<'a> DataResolver<'a> {
    /// Creates a resolver using the report's own parameters.
    pub fn new(config: &'a ReportConfig) -> Self {
        Self {
            config,
            parameters: config.parameters.clone(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Merges request-scoped parameters over the report's parameters.
    pub fn with_overrides(mut self, overrides: &Parameters) -> Self {
        self.parameters
            .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Limits how many sections resolve at the same time. Zero is treated
    /// as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Parameters in effect for this resolver.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// The authoritative configured source for a section, if any.
    pub fn source_for<'s>(&self, section: &'s SectionConfig) -> Option<&'s DataSource>
    where
        'a: 's,
    {
        section
            .data_source
            .as_ref()
            .or(self.config.data_source.as_ref())
    }

    /// Resolves one section.
    ///
    /// Returns `Ok(None)` when the authoritative source has no data for the
    /// section.
    ///
    /// # Errors
    /// Returns `ReportError::ConnectionNotFound` for an undeclared connection
    /// and `ReportError::Query` for any driver failure, including a missing
    /// parameter or an unset connection string variable.
    pub async fn resolve(
        &self,
        section: &SectionConfig,
        payload: Option<&ReportData>,
    ) -> Result<Option<RowSet>> {
        let section_id = section.section_id.as_str();
        let rows = match self.source_for(section) {
            Some(DataSource::Json { data }) => {
                debug!("Section '{}': resolving from inline JSON", section_id);
                data.get(section_id).cloned()
            }
            Some(DataSource::Sql {
                connection_id,
                query,
            }) => Some(self.resolve_sql(section_id, connection_id, query).await?),
            None => {
                debug!("Section '{}': resolving from data payload", section_id);
                payload.and_then(|payload| payload.rows_for(section_id))
            }
        };

        match &rows {
            Some(rows) => debug!("Section '{}': resolved {} row(s)", section_id, rows.len()),
            None => debug!("Section '{}': no data", section_id),
        }
        Ok(rows)
    }

    /// Resolves every section of the report, in section order.
    ///
    /// Up to `max_concurrency` sections are in flight at once. The first
    /// failure aborts the whole resolution.
    pub async fn resolve_all(&self, payload: Option<&ReportData>) -> Result<Vec<Option<RowSet>>> {
        stream::iter(
            self.config
                .sections
                .iter()
                .map(|section| self.resolve(section, payload)),
        )
        .buffered(self.max_concurrency)
        .try_collect()
        .await
    }

    async fn resolve_sql(
        &self,
        section_id: &str,
        connection_id: &str,
        query: &str,
    ) -> Result<RowSet> {
        let connection = self
            .config
            .connections
            .get(connection_id)
            .ok_or_else(|| ReportError::connection_not_found(section_id, connection_id))?;

        let bound = bind_named(query, connection.driver_kind, &self.parameters).map_err(|e| {
            ReportError::query_failed(section_id, connection_id, "parameter binding failed", e)
        })?;

        let url = connection.connection_string().map_err(|e| {
            ReportError::query_failed(
                section_id,
                connection_id,
                format!("connection string {} is unavailable", connection.display_target()),
                e,
            )
        })?;

        debug!(
            "Section '{}': querying {} connection '{}' ({}) in {} mode",
            section_id,
            connection.driver_kind,
            connection_id,
            connection.display_target(),
            connection.execution_mode
        );

        let executor = drivers::open_executor(connection, url).map_err(|e| {
            ReportError::query_failed(section_id, connection_id, e.to_string(), e)
        })?;
        executor
            .fetch_rows(bound)
            .await
            .map_err(|e| ReportError::query_failed(section_id, connection_id, e.to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, DriverKind, ExecutionMode, GridPosition, TableConfig};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn row(product: &str) -> Row {
        let mut row = Row::new();
        row.insert("Product".to_string(), json!(product));
        row
    }

    fn report(sections: Vec<SectionConfig>) -> ReportConfig {
        ReportConfig {
            title: None,
            orientation: Default::default(),
            paper_size: Default::default(),
            margin: crate::config::DEFAULT_MARGIN,
            logo_path: None,
            data_source: None,
            connections: BTreeMap::new(),
            parameters: Parameters::new(),
            sections,
            base_dir: None,
        }
    }

    fn table(id: &str) -> SectionConfig {
        SectionConfig::table(id, GridPosition::new(0, 0, 12), TableConfig::default())
    }

    fn inline(section_id: &str, rows: RowSet) -> DataSource {
        let mut data = BTreeMap::new();
        data.insert(section_id.to_string(), rows);
        DataSource::Json { data }
    }

    #[tokio::test]
    async fn test_payload_lookup_when_no_source() {
        let config = report(vec![table("top")]);
        let payload = ReportData::new().with_section("top", vec![row("A")]);
        let resolver = DataResolver::new(&config);

        let rows = resolver
            .resolve(&config.sections[0], Some(&payload))
            .await
            .unwrap();
        assert_eq!(rows, Some(vec![row("A")]));

        let rows = resolver.resolve(&config.sections[0], None).await.unwrap();
        assert!(rows.is_none());
    }

    #[tokio::test]
    async fn test_section_source_wins_over_report_and_payload() {
        let section = table("top").with_data_source(inline("top", vec![row("section")]));
        let mut config = report(vec![section]);
        config.data_source = Some(inline("top", vec![row("report")]));
        let payload = ReportData::new().with_section("top", vec![row("payload")]);

        let rows = DataResolver::new(&config)
            .resolve(&config.sections[0], Some(&payload))
            .await
            .unwrap();
        assert_eq!(rows, Some(vec![row("section")]));
    }

    #[tokio::test]
    async fn test_first_present_source_is_authoritative() {
        // The report-level source has nothing for this section; the payload
        // is not consulted.
        let mut config = report(vec![table("top")]);
        config.data_source = Some(inline("other", vec![row("x")]));
        let payload = ReportData::new().with_section("top", vec![row("payload")]);

        let rows = DataResolver::new(&config)
            .resolve(&config.sections[0], Some(&payload))
            .await
            .unwrap();
        assert!(rows.is_none());
    }

    #[tokio::test]
    async fn test_undeclared_connection() {
        let section = table("sales").with_data_source(DataSource::Sql {
            connection_id: "warehouse".to_string(),
            query: "SELECT 1".to_string(),
        });
        let config = report(vec![section]);

        let result = DataResolver::new(&config)
            .resolve(&config.sections[0], None)
            .await;
        assert!(matches!(
            result,
            Err(ReportError::ConnectionNotFound { ref connection_id, .. }) if connection_id == "warehouse"
        ));
    }

    #[tokio::test]
    async fn test_missing_parameter_is_query_error() {
        let section = table("sales").with_data_source(DataSource::Sql {
            connection_id: "mem".to_string(),
            query: "SELECT :absent AS x".to_string(),
        });
        let mut config = report(vec![section]);
        config.connections.insert(
            "mem".to_string(),
            ConnectionConfig::new("sqlite::memory:", DriverKind::Sqlite),
        );

        let result = DataResolver::new(&config)
            .resolve(&config.sections[0], None)
            .await;
        match result {
            Err(ReportError::Query {
                section_id,
                connection_id,
                ..
            }) => {
                assert_eq!(section_id, "sales");
                assert_eq!(connection_id, "mem");
            }
            other => panic!("expected query error, got {:?}", other),
        }
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_overrides_are_merged() {
        let section = table("calc").with_data_source(DataSource::Sql {
            connection_id: "mem".to_string(),
            query: "SELECT :a AS a, :b AS b".to_string(),
        });
        let mut config = report(vec![section]);
        config.parameters.insert("a".to_string(), json!(1));
        config.parameters.insert("b".to_string(), json!(2));
        config.connections.insert(
            "mem".to_string(),
            ConnectionConfig::new("sqlite::memory:", DriverKind::Sqlite)
                .with_execution_mode(ExecutionMode::Sync),
        );

        let mut overrides = Parameters::new();
        overrides.insert("b".to_string(), json!(20));

        let resolver = DataResolver::new(&config).with_overrides(&overrides);
        let rows = resolver
            .resolve(&config.sections[0], None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rows[0]["a"], json!(1));
        assert_eq!(rows[0]["b"], json!(20));
        // The config itself is untouched
        assert_eq!(config.parameters["b"], json!(2));
    }

    #[tokio::test]
    async fn test_resolve_all_keeps_section_order() {
        let sections = vec![table("a"), table("b"), table("c")];
        let config = report(sections);
        let payload = ReportData::new()
            .with_section("a", vec![row("1")])
            .with_section("c", vec![row("3")]);

        let resolved = DataResolver::new(&config)
            .with_max_concurrency(2)
            .resolve_all(Some(&payload))
            .await
            .unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0], Some(vec![row("1")]));
        assert!(resolved[1].is_none());
        assert_eq!(resolved[2], Some(vec![row("3")]));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_resolve_all_order_ignores_completion_order() {
        let slow = "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 500000) \
                    SELECT 'slow' AS label, COUNT(*) AS total FROM n";
        let fast = "SELECT 'fast' AS label, 1 AS total";

        for mode in [ExecutionMode::Sync, ExecutionMode::Async] {
            let sql = |id: &str, query: &str| {
                table(id).with_data_source(DataSource::Sql {
                    connection_id: "mem".to_string(),
                    query: query.to_string(),
                })
            };
            let mut config = report(vec![sql("slow", slow), sql("fast", fast), table("payload")]);
            config.connections.insert(
                "mem".to_string(),
                ConnectionConfig::new("sqlite::memory:", DriverKind::Sqlite)
                    .with_execution_mode(mode),
            );
            let payload = ReportData::new().with_section("payload", vec![row("P")]);

            let resolved = DataResolver::new(&config)
                .with_max_concurrency(3)
                .resolve_all(Some(&payload))
                .await
                .unwrap();

            assert_eq!(resolved.len(), 3, "mode {}", mode);
            let slow_rows = resolved[0].as_ref().unwrap();
            assert_eq!(slow_rows[0]["label"], json!("slow"));
            assert_eq!(slow_rows[0]["total"], json!(500000));
            assert_eq!(resolved[1].as_ref().unwrap()[0]["label"], json!("fast"));
            assert_eq!(resolved[2], Some(vec![row("P")]));
        }
    }
}

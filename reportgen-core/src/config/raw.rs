//! Raw deserialization structs and the semantic checks that turn them into
//! typed configuration.
//!
//! serde handles shape; everything that needs more than one field at a time
//! lives here, after construction, so the error can name the section.

use super::report::{DEFAULT_MARGIN, Orientation, Parameters, ReportConfig};
use super::section::{GraphConfig, GridPosition, SectionConfig, SectionKind, TableConfig};
use super::source::{ConnectionConfig, ConnectionTarget, DataSource, DriverKind, ExecutionMode};
use super::PaperSize;
use crate::data::{RowSet, SectionData};
use crate::{ReportError, Result};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Section id used when the report-level source is at fault.
pub(crate) const REPORT_SCOPE: &str = "<report>";

fn default_margin() -> f64 {
    DEFAULT_MARGIN
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawReportConfig {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    orientation: Orientation,
    #[serde(default)]
    paper_size: PaperSize,
    #[serde(default = "default_margin")]
    margin: f64,
    #[serde(default)]
    logo_path: Option<PathBuf>,
    #[serde(default)]
    data_source: Option<RawDataSource>,
    #[serde(default)]
    connections: BTreeMap<String, RawConnection>,
    #[serde(default)]
    parameters: Parameters,
    sections: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
struct RawConnection {
    #[serde(default)]
    connection_string: Option<String>,
    #[serde(default)]
    connection_string_env: Option<String>,
    driver_kind: DriverKind,
    #[serde(default)]
    execution_mode: ExecutionMode,
    #[serde(default)]
    options: Map<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
struct RawDataSource {
    #[serde(rename = "type")]
    source_type: String,
    #[serde(default)]
    data: Option<BTreeMap<String, SectionData>>,
    #[serde(default)]
    connection_id: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    section_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    section_type: String,
    grid: GridPosition,
    config: JsonValue,
    #[serde(default)]
    data_source: Option<RawDataSource>,
}

impl RawReportConfig {
    /// Runs the semantic checks, failing on the first violation.
    pub(crate) fn into_config(self) -> Result<ReportConfig> {
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(ReportError::config(format!(
                "margin must be a non-negative number, got {}",
                self.margin
            )));
        }

        let connections = self
            .connections
            .into_iter()
            .map(|(id, raw)| raw.into_connection(&id).map(|connection| (id, connection)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let data_source = self
            .data_source
            .map(|raw| raw.into_source(REPORT_SCOPE, &connections))
            .transpose()?;

        let mut seen = HashSet::new();
        let mut sections = Vec::with_capacity(self.sections.len());
        for raw in self.sections {
            if !seen.insert(raw.section_id.clone()) {
                return Err(ReportError::config(format!(
                    "duplicate section_id '{}'",
                    raw.section_id
                )));
            }
            sections.push(raw.into_section(&connections)?);
        }

        Ok(ReportConfig {
            title: self.title,
            orientation: self.orientation,
            paper_size: self.paper_size,
            margin: self.margin,
            logo_path: self.logo_path,
            data_source,
            connections,
            parameters: self.parameters,
            sections,
            base_dir: None,
        })
    }
}

impl RawConnection {
    fn into_connection(self, id: &str) -> Result<ConnectionConfig> {
        let target = match (self.connection_string, self.connection_string_env) {
            (Some(url), None) if !url.trim().is_empty() => ConnectionTarget::Inline(url),
            (None, Some(var)) if !var.trim().is_empty() => ConnectionTarget::Env(var),
            (Some(_), Some(_)) => {
                return Err(ReportError::config(format!(
                    "connection '{}': set either connection_string or connection_string_env, not both",
                    id
                )));
            }
            _ => {
                return Err(ReportError::config(format!(
                    "connection '{}': a non-empty connection_string or connection_string_env is required",
                    id
                )));
            }
        };

        for key in self.options.keys() {
            if key != "read_only" {
                tracing::debug!("connection '{}': ignoring unrecognized option '{}'", id, key);
            }
        }
        if let Some(read_only) = self.options.get("read_only")
            && !read_only.is_boolean()
        {
            return Err(ReportError::config(format!(
                "connection '{}': option read_only must be a boolean",
                id
            )));
        }

        Ok(ConnectionConfig {
            target,
            driver_kind: self.driver_kind,
            execution_mode: self.execution_mode,
            options: self.options,
        })
    }
}

impl RawDataSource {
    fn into_source(
        self,
        scope: &str,
        connections: &BTreeMap<String, ConnectionConfig>,
    ) -> Result<DataSource> {
        match self.source_type.as_str() {
            "sql" => {
                if self.data.is_some() {
                    return Err(ReportError::config(format!(
                        "{}: sql data source must not carry 'data'",
                        describe(scope)
                    )));
                }
                let connection_id = non_empty(self.connection_id).ok_or_else(|| {
                    ReportError::config(format!(
                        "{}: sql data source requires a connection_id",
                        describe(scope)
                    ))
                })?;
                let query = non_empty(self.query).ok_or_else(|| {
                    ReportError::config(format!(
                        "{}: sql data source requires a query",
                        describe(scope)
                    ))
                })?;
                if !connections.contains_key(&connection_id) {
                    return Err(ReportError::connection_not_found(scope, connection_id));
                }
                Ok(DataSource::Sql {
                    connection_id,
                    query,
                })
            }
            "json" => {
                if self.connection_id.is_some() || self.query.is_some() {
                    return Err(ReportError::config(format!(
                        "{}: json data source must not carry 'connection_id' or 'query'",
                        describe(scope)
                    )));
                }
                let data: BTreeMap<String, RowSet> = self
                    .data
                    .filter(|data| !data.is_empty())
                    .ok_or_else(|| {
                        ReportError::config(format!(
                            "{}: json data source requires a non-empty 'data' mapping",
                            describe(scope)
                        ))
                    })?
                    .into_iter()
                    .map(|(section_id, entry)| (section_id, entry.into_rows()))
                    .collect();
                Ok(DataSource::Json { data })
            }
            other => Err(ReportError::config(format!(
                "{}: unknown data source type '{}'",
                describe(scope),
                other
            ))),
        }
    }
}

impl RawSection {
    fn into_section(self, connections: &BTreeMap<String, ConnectionConfig>) -> Result<SectionConfig> {
        let section_id = self.section_id;
        if section_id.trim().is_empty() {
            return Err(ReportError::config("section_id must not be empty"));
        }

        let kind = match self.section_type.as_str() {
            "table" => {
                let table: TableConfig = serde_json::from_value(self.config).map_err(|e| {
                    ReportError::config(format!(
                        "section '{}': invalid table config: {}",
                        section_id, e
                    ))
                })?;
                if table.max_results == 0 {
                    return Err(ReportError::config(format!(
                        "section '{}': max_results must be at least 1",
                        section_id
                    )));
                }
                SectionKind::Table(table)
            }
            "graph" => {
                let graph: GraphConfig = serde_json::from_value(self.config).map_err(|e| {
                    ReportError::config(format!(
                        "section '{}': invalid graph config: {}",
                        section_id, e
                    ))
                })?;
                if !graph.vega_lite_spec.is_object() {
                    return Err(ReportError::config(format!(
                        "section '{}': vega_lite_spec must be an object",
                        section_id
                    )));
                }
                SectionKind::Graph(graph)
            }
            other => {
                return Err(ReportError::UnsupportedSectionType {
                    section_id,
                    section_type: other.to_string(),
                });
            }
        };

        self.grid.validate(&section_id)?;

        let data_source = self
            .data_source
            .map(|raw| raw.into_source(&section_id, connections))
            .transpose()?;

        Ok(SectionConfig {
            section_id,
            name: self.name,
            grid: self.grid,
            kind,
            data_source,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn describe(scope: &str) -> String {
    if scope == REPORT_SCOPE {
        "report data_source".to_string()
    } else {
        format!("section '{}'", scope)
    }
}

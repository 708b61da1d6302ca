//! Section rendering: row-sets in, HTML fragments out.
//!
//! A section whose row-set is missing or empty produces no fragment at all;
//! this is how absent data is skipped without failing the report.

pub mod chart;
pub mod format;
pub mod table;

pub use chart::{ChartRenderer, CommandChartRenderer, EmbeddedChartRenderer, inject_dataset};
pub use format::{CellFormat, FormatError};

use crate::Result;
use crate::config::{GridPosition, SectionConfig, SectionKind};
use crate::data::RowSet;
use std::sync::Arc;
use tracing::debug;

/// A rendered section, ready to be placed in its row group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    /// Section id, used as the container's `id`
    pub section_id: String,
    /// Optional heading
    pub name: Option<String>,
    /// `table` or `graph`
    pub kind: &'static str,
    /// Grid placement
    pub grid: GridPosition,
    /// HTML fragment; already escaped
    pub body: String,
}

impl RenderedSection {
    /// Inline CSS placing the section on the 12-column grid.
    pub fn style(&self) -> String {
        let mut style = format!(
            "grid-column: {} / {};",
            u32::from(self.grid.col_start) + 1,
            u32::from(self.grid.col_end) + 1
        );
        if let Some(height) = self.grid.row_height {
            style.push_str(&format!(" height: {}px;", height));
        }
        style
    }
}

/// Renders sections, delegating charts to a [`ChartRenderer`].
#[derive(Clone)]
pub struct SectionRenderer {
    charts: Arc<dyn ChartRenderer>,
}

impl SectionRenderer {
    /// Creates a renderer using `charts` for graph sections.
    pub fn new(charts: Arc<dyn ChartRenderer>) -> Self {
        Self { charts }
    }

    /// Renders one section.
    ///
    /// Returns `Ok(None)` when `rows` is missing or empty.
    ///
    /// # Errors
    /// Returns `ReportError::ChartRender` when the chart renderer fails and
    /// `ReportError::Template` when table markup cannot be produced.
    pub async fn render(
        &self,
        section: &SectionConfig,
        rows: Option<RowSet>,
    ) -> Result<Option<RenderedSection>> {
        let Some(rows) = rows.filter(|rows| !rows.is_empty()) else {
            debug!("Section '{}': no data, skipping", section.section_id);
            return Ok(None);
        };

        let body = match &section.kind {
            SectionKind::Table(table) => table::render_table(&section.section_id, table, &rows)?,
            SectionKind::Graph(graph) => {
                let spec = inject_dataset(&graph.vega_lite_spec, &rows);
                self.charts.render(&section.section_id, &spec).await?
            }
        };

        Ok(Some(RenderedSection {
            section_id: section.section_id.clone(),
            name: section.name.clone(),
            kind: section.kind.type_name(),
            grid: section.grid,
            body,
        }))
    }
}

impl std::fmt::Debug for SectionRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionRenderer").finish_non_exhaustive()
    }
}

//! Section configuration: grid placement and table/graph settings.

use super::source::DataSource;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Number of columns in the report grid.
pub const GRID_COLUMNS: u8 = 12;

/// Default row cap for table sections.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Placement of a section on the report grid.
///
/// Columns are a half-open, 0-indexed span: `col_start = 0, col_end = 6`
/// covers the left half of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    /// Grouping key for the row; need not be contiguous
    pub row_number: u32,
    /// Fixed row height in pixels; `None` sizes to content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_height: Option<u32>,
    /// First column (inclusive)
    pub col_start: u8,
    /// Last column (exclusive)
    pub col_end: u8,
}

impl GridPosition {
    /// Creates a position spanning `[col_start, col_end)` on `row_number`.
    pub fn new(row_number: u32, col_start: u8, col_end: u8) -> Self {
        Self {
            row_number,
            row_height: None,
            col_start,
            col_end,
        }
    }

    /// Builder method to fix the row height.
    pub fn with_row_height(mut self, height: u32) -> Self {
        self.row_height = Some(height);
        self
    }

    /// Number of grid units covered.
    pub fn span(&self) -> u8 {
        self.col_end.saturating_sub(self.col_start)
    }

    /// Whether two spans share at least one grid column.
    pub fn overlaps(&self, other: &GridPosition) -> bool {
        self.col_start < other.col_end && other.col_start < self.col_end
    }

    /// Checks range invariants.
    pub(crate) fn validate(&self, section_id: &str) -> crate::Result<()> {
        if self.col_end > GRID_COLUMNS {
            return Err(crate::ReportError::config(format!(
                "section '{}': col_end {} exceeds the {}-column grid",
                section_id, self.col_end, GRID_COLUMNS
            )));
        }
        if self.col_start >= self.col_end {
            return Err(crate::ReportError::config(format!(
                "section '{}': col_start {} must be less than col_end {}",
                section_id, self.col_start, self.col_end
            )));
        }
        if self.row_height == Some(0) {
            return Err(crate::ReportError::config(format!(
                "section '{}': row_height must be greater than 0",
                section_id
            )));
        }
        Ok(())
    }
}

/// Declared value type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Date,
    Boolean,
    /// Any other declared type; rendered like `string`
    #[serde(other)]
    Other,
}

/// Display settings for one table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Row-set key this column matches
    pub name: String,
    /// Declared value type
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
    /// Header text; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Format pattern (`"0,0"`, `"$0,0.00"`, `"%Y-%m-%d"`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ColumnConfig {
    /// Creates a column declaration.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            title: None,
            format: None,
        }
    }

    /// Builder method to set the header title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder method to set the format pattern.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

/// Table section settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Declared columns; supply titles and formats only
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    /// Maximum number of rendered rows
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl TableConfig {
    /// Finds the declaration for a row-set key.
    pub fn column(&self, name: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// Graph section settings: an opaque Vega-Lite specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Chart specification, without data
    pub vega_lite_spec: JsonValue,
}

/// Type-specific section configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionKind {
    Table(TableConfig),
    Graph(GraphConfig),
}

impl SectionKind {
    /// Type tag as it appears in configuration.
    pub fn type_name(&self) -> &'static str {
        match self {
            SectionKind::Table(_) => "table",
            SectionKind::Graph(_) => "graph",
        }
    }
}

/// One placed unit of content within the report grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionConfig {
    /// Unique id within the report
    pub section_id: String,
    /// Optional heading
    pub name: Option<String>,
    /// Grid placement
    pub grid: GridPosition,
    /// Table or graph settings
    pub kind: SectionKind,
    /// Section-level source, overriding the report default
    pub data_source: Option<DataSource>,
}

impl SectionConfig {
    /// Creates a table section.
    pub fn table(section_id: impl Into<String>, grid: GridPosition, table: TableConfig) -> Self {
        Self {
            section_id: section_id.into(),
            name: None,
            grid,
            kind: SectionKind::Table(table),
            data_source: None,
        }
    }

    /// Creates a graph section.
    pub fn graph(section_id: impl Into<String>, grid: GridPosition, spec: JsonValue) -> Self {
        Self {
            section_id: section_id.into(),
            name: None,
            grid,
            kind: SectionKind::Graph(GraphConfig {
                vega_lite_spec: spec,
            }),
            data_source: None,
        }
    }

    /// Builder method to set the heading.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder method to attach a section-level data source.
    pub fn with_data_source(mut self, source: DataSource) -> Self {
        self.data_source = Some(source);
        self
    }
}

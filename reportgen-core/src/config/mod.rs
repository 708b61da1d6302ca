//! Report configuration model.
//!
//! A [`ReportConfig`] is parsed and validated once, then treated as
//! immutable. Everything downstream (layout, resolution, rendering) borrows
//! from it.
//!
//! # Module Structure
//! - `report`: page geometry, chrome and the top-level config
//! - `section`: grid placement and table/graph settings
//! - `source`: data sources and named connections
//! - `raw`: deserialization structs and cross-field validation

mod raw;
pub mod report;
pub mod section;
pub mod source;

pub(crate) use raw::REPORT_SCOPE;
pub use report::{DEFAULT_MARGIN, Orientation, PaperSize, Parameters, ReportConfig};
pub use section::{
    ColumnConfig, ColumnType, DEFAULT_MAX_RESULTS, GRID_COLUMNS, GraphConfig, GridPosition,
    SectionConfig, SectionKind, TableConfig,
};
pub use source::{ConnectionConfig, ConnectionTarget, DataSource, DriverKind, ExecutionMode};

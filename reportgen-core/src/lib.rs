//! Core of the reportgen report composition engine.
//!
//! A report is a JSON document describing sections (tables and charts) on a
//! 12-column grid. Each section pulls its rows from inline JSON, a SQL query
//! or an external data payload; the engine lays sections out by grid row,
//! renders them to HTML fragments, and hands the assembled page to an
//! external document renderer.
//!
//! # Guarantees
//! - Config is validated in full before any data is fetched
//! - Row-group and column order come only from grid positions
//! - Connection strings are redacted in every log line and error
//! - Document output is all-or-nothing
//!
//! # Example
//! ```rust
//! use reportgen_core::{Report, ReportConfig, ReportData};
//! use reportgen_core::render::EmbeddedChartRenderer;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! let config = ReportConfig::from_value(json!({
//!     "title": "Weekly",
//!     "sections": [{
//!         "section_id": "totals",
//!         "type": "table",
//!         "grid": {"row_number": 0, "col_start": 0, "col_end": 12},
//!         "config": {"columns": []}
//!     }]
//! }))?;
//! let report = Report::new(config).with_chart_renderer(Arc::new(EmbeddedChartRenderer));
//! let data = ReportData::parse(r#"{"data": {"totals": [{"week": 1, "orders": 12}]}}"#)?;
//! let markup = report.render_to_markup(Some(&data)).await?;
//! assert!(markup.contains("<td>12</td>"));
//! # Ok::<(), reportgen_core::ReportError>(())
//! # }).unwrap();
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod data;
pub mod document;
pub mod error;
pub mod layout;
pub mod logging;
pub mod render;
pub mod report;
pub mod validation;

// Re-export commonly used types
pub use config::{
    ColumnConfig, ColumnType, ConnectionConfig, DataSource, DriverKind, ExecutionMode,
    GridPosition, Orientation, PaperSize, Parameters, ReportConfig, SectionConfig, SectionKind,
    TableConfig,
};
pub use data::{DataResolver, ReportData, Row, RowSet};
pub use document::{CommandDocumentRenderer, DocumentRenderer, PageSetup};
pub use error::{ReportError, Result, redact_database_url};
pub use layout::{Overlap, RowGroup};
pub use logging::init_logging;
pub use render::{ChartRenderer, CommandChartRenderer, EmbeddedChartRenderer};
pub use report::Report;
pub use validation::{ValidationError, initialize_config_validator, validate_config_document};

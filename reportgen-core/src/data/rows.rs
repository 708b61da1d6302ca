//! Row-set types exchanged between resolution and rendering.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::Path;

/// A single record: column name to scalar value, in source column order.
pub type Row = Map<String, JsonValue>;

/// An ordered sequence of records.
pub type RowSet = Vec<Row>;

/// Data for one section as it appears in a JSON payload.
///
/// A bare object is accepted as a one-row row-set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionData {
    /// A list of records
    Rows(RowSet),
    /// A single record
    Single(Row),
}

impl SectionData {
    /// Converts the payload entry into a row-set.
    pub fn into_rows(self) -> RowSet {
        match self {
            Self::Rows(rows) => rows,
            Self::Single(row) => vec![row],
        }
    }

    /// Borrows the payload entry as a row-set, cloning single records.
    pub fn to_rows(&self) -> RowSet {
        self.clone().into_rows()
    }
}

/// Externally supplied report data, keyed by section id.
///
/// # Example
/// ```rust
/// use reportgen_core::data::ReportData;
///
/// let data: ReportData = serde_json::from_str(
///     r#"{"data": {"top_products": [{"Product": "A", "Revenue": 100}]}}"#,
/// ).unwrap();
/// assert_eq!(data.rows_for("top_products").map(|rows| rows.len()), Some(1));
/// assert!(data.rows_for("missing").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    /// Section id to section data
    #[serde(default)]
    pub data: HashMap<String, SectionData>,
}

impl ReportData {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to attach rows for a section.
    pub fn with_section(mut self, section_id: impl Into<String>, rows: RowSet) -> Self {
        self.data.insert(section_id.into(), SectionData::Rows(rows));
        self
    }

    /// Looks up the rows for a section. Missing keys are not an error.
    pub fn rows_for(&self, section_id: &str) -> Option<RowSet> {
        self.data.get(section_id).map(SectionData::to_rows)
    }

    /// Parses a payload from a JSON string.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| crate::ReportError::serialization("Failed to parse report data", e))
    }

    /// Loads a payload from a JSON file.
    pub async fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            crate::ReportError::io(format!("Failed to read data file {}", path.display()), e)
        })?;
        Self::parse(&raw)
    }
}

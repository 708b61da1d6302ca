//! Report-level configuration: page geometry, chrome, connections and sections.

use super::raw::RawReportConfig;
use super::section::SectionConfig;
use super::source::{ConnectionConfig, DataSource};
use crate::{ReportError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default page margin in points.
pub const DEFAULT_MARGIN: f64 = 36.0;

/// Named query parameters shared by every SQL-backed section.
pub type Parameters = BTreeMap<String, JsonValue>;

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "portrait"),
            Orientation::Landscape => write!(f, "landscape"),
        }
    }
}

/// Supported paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
}

impl PaperSize {
    /// Every supported size, in the order `list` prints them.
    pub const ALL: [PaperSize; 5] = [
        PaperSize::A4,
        PaperSize::A3,
        PaperSize::A5,
        PaperSize::Letter,
        PaperSize::Legal,
    ];

    /// Portrait width and height in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PaperSize::A4 => (595.276, 841.890),
            PaperSize::A3 => (841.890, 1190.551),
            PaperSize::A5 => (419.528, 595.276),
            PaperSize::Letter => (612.0, 792.0),
            PaperSize::Legal => (612.0, 1008.0),
        }
    }

    /// Keyword used by the CSS `@page size` descriptor.
    pub fn css_name(&self) -> &'static str {
        match self {
            PaperSize::A4 => "A4",
            PaperSize::A3 => "A3",
            PaperSize::A5 => "A5",
            PaperSize::Letter => "letter",
            PaperSize::Legal => "legal",
        }
    }
}

impl std::fmt::Display for PaperSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaperSize::A4 => write!(f, "a4"),
            PaperSize::A3 => write!(f, "a3"),
            PaperSize::A5 => write!(f, "a5"),
            PaperSize::Letter => write!(f, "letter"),
            PaperSize::Legal => write!(f, "legal"),
        }
    }
}

/// A validated, immutable description of a report.
///
/// Construct one with [`ReportConfig::parse`], [`ReportConfig::from_value`]
/// or [`ReportConfig::from_path`]. All three run the same two-stage
/// validation: the embedded JSON Schema first, then the cross-field checks
/// that need typed values (section type dispatch, data source tags,
/// connection references, grid ranges).
///
/// # Example
/// ```rust
/// use reportgen_core::config::{PaperSize, ReportConfig};
///
/// let config = ReportConfig::parse(r#"{
///     "title": "Sales",
///     "paper_size": "letter",
///     "sections": [{
///         "section_id": "top_products",
///         "type": "table",
///         "grid": {"row_number": 0, "col_start": 0, "col_end": 12},
///         "config": {"columns": [{"name": "Revenue", "type": "number", "format": "$"}]}
///     }]
/// }"#).unwrap();
///
/// assert_eq!(config.paper_size, PaperSize::Letter);
/// assert_eq!(config.page_dimensions(), (612.0, 792.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Optional document title
    pub title: Option<String>,
    /// Page orientation
    pub orientation: Orientation,
    /// Paper size
    pub paper_size: PaperSize,
    /// Page margin in points
    pub margin: f64,
    /// Logo image, relative paths resolve against `base_dir`
    pub logo_path: Option<PathBuf>,
    /// Report-level default data source
    pub data_source: Option<DataSource>,
    /// Named connections referenced by SQL sources
    pub connections: BTreeMap<String, ConnectionConfig>,
    /// Query parameters shared by all SQL sources
    pub parameters: Parameters,
    /// Sections in config order
    pub sections: Vec<SectionConfig>,
    /// Directory the config was loaded from
    pub base_dir: Option<PathBuf>,
}

impl ReportConfig {
    /// Parses and validates a configuration from a JSON string.
    ///
    /// # Errors
    /// Returns `ReportError::ConfigValidation` for malformed JSON or any
    /// structural or semantic violation, `UnsupportedSectionType` for an
    /// unknown section type and `ConnectionNotFound` for a dangling
    /// connection reference.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(raw)
            .map_err(|e| ReportError::config(format!("Configuration is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Validates and converts an already-parsed JSON document.
    ///
    /// # Errors
    /// See [`ReportConfig::parse`].
    pub fn from_value(value: JsonValue) -> Result<Self> {
        crate::validation::validate_config_document(&value)?;

        let raw: RawReportConfig = serde_json::from_value(value)
            .map_err(|e| ReportError::config(format!("Malformed configuration: {}", e)))?;
        let config = raw.into_config()?;

        tracing::debug!(
            "Validated report configuration with {} section(s) and {} connection(s)",
            config.sections.len(),
            config.connections.len()
        );
        Ok(config)
    }

    /// Loads a configuration file. Its directory becomes the base directory
    /// for relative asset paths.
    ///
    /// # Errors
    /// Returns `ReportError::Io` if the file cannot be read, otherwise see
    /// [`ReportConfig::parse`].
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            ReportError::io(format!("Failed to read config file {}", path.display()), e)
        })?;
        let config = Self::parse(&raw)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config.with_base_dir(base_dir))
    }

    /// Builder method to set the base directory for relative asset paths.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Page width and height in points, after applying orientation.
    pub fn page_dimensions(&self) -> (f64, f64) {
        let (width, height) = self.paper_size.dimensions();
        match self.orientation {
            Orientation::Portrait => (width, height),
            Orientation::Landscape => (height, width),
        }
    }

    /// Printable area in points: the page minus twice the margin.
    pub fn content_box(&self) -> (f64, f64) {
        let (width, height) = self.page_dimensions();
        let inset = self.margin * 2.0;
        ((width - inset).max(0.0), (height - inset).max(0.0))
    }

    /// Logo path with relative paths resolved against the base directory.
    pub fn resolved_logo_path(&self) -> Option<PathBuf> {
        let logo = self.logo_path.as_ref()?;
        match &self.base_dir {
            Some(base) if logo.is_relative() => Some(base.join(logo)),
            _ => Some(logo.clone()),
        }
    }

    /// Looks up a section by id.
    pub fn section(&self, section_id: &str) -> Option<&SectionConfig> {
        self.sections
            .iter()
            .find(|section| section.section_id == section_id)
    }
}

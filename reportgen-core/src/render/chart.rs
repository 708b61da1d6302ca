//! Graph section rendering.
//!
//! The engine never interprets the chart grammar. It binds the resolved
//! rows into a copy of the specification and hands the result to a
//! [`ChartRenderer`].

use crate::data::RowSet;
use crate::{ReportError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

/// Turns a data-bound chart specification into a renderable fragment.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Renders `spec`, which already carries its dataset in `data.values`.
    ///
    /// # Errors
    /// Returns `ReportError::ChartRender` naming the section on failure.
    async fn render(&self, section_id: &str, spec: &JsonValue) -> Result<String>;
}

/// Returns a copy of `spec` with `rows` bound as `data.values`.
///
/// Any `data.url` or `data.name` is removed so the inline values take
/// effect. The input specification is never modified.
pub fn inject_dataset(spec: &JsonValue, rows: &RowSet) -> JsonValue {
    let mut spec = spec.clone();
    if let JsonValue::Object(root) = &mut spec {
        let data = root
            .entry("data")
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !data.is_object() {
            *data = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(data) = data {
            data.remove("url");
            data.remove("name");
            data.insert(
                "values".to_string(),
                JsonValue::Array(rows.iter().cloned().map(JsonValue::Object).collect()),
            );
        }
    }
    spec
}

/// Renders charts to SVG by running an external converter.
///
/// The default program is `vl-convert`, invoked as
/// `vl-convert vl2svg -i <spec.json> -o <chart.svg>` in a scratch directory.
#[derive(Debug, Clone)]
pub struct CommandChartRenderer {
    program: String,
}

impl Default for CommandChartRenderer {
    fn default() -> Self {
        Self::new("vl-convert")
    }
}

impl CommandChartRenderer {
    /// Uses `program` instead of `vl-convert`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program this renderer runs.
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl ChartRenderer for CommandChartRenderer {
    async fn render(&self, section_id: &str, spec: &JsonValue) -> Result<String> {
        let scratch = tempfile::tempdir()
            .map_err(|e| ReportError::io("Failed to create chart scratch directory", e))?;
        let input = scratch.path().join("chart.vl.json");
        let output = scratch.path().join("chart.svg");

        let body = serde_json::to_vec(spec)
            .map_err(|e| ReportError::serialization("Failed to serialize chart spec", e))?;
        tokio::fs::write(&input, body).await.map_err(|e| {
            ReportError::io(format!("Failed to write {}", input.display()), e)
        })?;

        tracing::debug!("Section '{}': running {} vl2svg", section_id, self.program);
        let result = tokio::process::Command::new(&self.program)
            .arg("vl2svg")
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .output()
            .await
            .map_err(|e| {
                ReportError::chart_failed(
                    section_id,
                    format!("failed to run '{}': {}", self.program, e),
                )
            })?;

        if !result.status.success() {
            return Err(ReportError::chart_failed(
                section_id,
                format!(
                    "'{}' exited with {}: {}",
                    self.program,
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }

        read_svg(section_id, &output).await
    }
}

async fn read_svg(section_id: &str, path: &Path) -> Result<String> {
    let svg = tokio::fs::read_to_string(path).await.map_err(|e| {
        ReportError::chart_failed(section_id, format!("renderer produced no output: {}", e))
    })?;
    Ok(strip_xml_prolog(&svg).to_string())
}

/// Drops a leading `<?xml ...?>` declaration so the SVG can be inlined.
fn strip_xml_prolog(svg: &str) -> &str {
    let trimmed = svg.trim_start();
    if trimmed.starts_with("<?xml")
        && let Some(end) = trimmed.find("?>")
    {
        return trimmed[end + 2..].trim_start();
    }
    trimmed
}

/// Embeds the specification for client-side rendering.
///
/// Produces a `<script type="application/vnd.vegalite+json">` element;
/// suitable for interactive HTML previews, not for paginated output.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedChartRenderer;

#[async_trait]
impl ChartRenderer for EmbeddedChartRenderer {
    async fn render(&self, section_id: &str, spec: &JsonValue) -> Result<String> {
        let json = serde_json::to_string(spec).map_err(|e| {
            ReportError::serialization(
                format!("Failed to serialize chart spec for section '{}'", section_id),
                e,
            )
        })?;
        Ok(format!(
            "<script type=\"application/vnd.vegalite+json\">{}</script>",
            json.replace("</", "<\\/")
        ))
    }
}

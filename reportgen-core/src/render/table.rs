//! Table section rendering.

use super::format::{CellFormat, raw_text};
use crate::config::TableConfig;
use crate::data::Row;
use askama::Template;
use serde_json::Value as JsonValue;
use tracing::debug;

/// One rendered cell: display text plus CSS class (empty for none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Display text, escaped by the template
    pub text: String,
    /// `number`, `currency`, `date` or empty
    pub class: &'static str,
}

#[derive(Template)]
#[template(path = "table.html")]
struct TableTemplate<'a> {
    headers: &'a [Cell],
    rows: &'a [Vec<Cell>],
}

/// Column as rendered: key, header and formatter.
struct RenderColumn<'a> {
    key: &'a str,
    header: String,
    format: Option<CellFormat>,
}

/// Builds header and body cells for a table.
///
/// Rows beyond `max_results` are dropped, keeping the resolver's order.
/// Columns are the union of row keys in order of first appearance; the
/// declared column list only contributes titles and formats.
pub fn table_cells(section_id: &str, table: &TableConfig, rows: &[Row]) -> (Vec<Cell>, Vec<Vec<Cell>>) {
    let rows = &rows[..rows.len().min(table.max_results)];

    let mut columns: Vec<RenderColumn<'_>> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if columns.iter().any(|column| column.key == key) {
                continue;
            }
            let declared = table.column(key);
            columns.push(RenderColumn {
                key: key.as_str(),
                header: declared
                    .and_then(|column| column.title.clone())
                    .unwrap_or_else(|| key.clone()),
                format: declared.and_then(CellFormat::for_column),
            });
        }
    }

    let headers = columns
        .iter()
        .map(|column| Cell {
            text: column.header.clone(),
            class: column.format.as_ref().map_or("", CellFormat::css_class),
        })
        .collect();

    let body = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| render_cell(section_id, column, row.get(column.key)))
                .collect()
        })
        .collect();

    (headers, body)
}

fn render_cell(section_id: &str, column: &RenderColumn<'_>, value: Option<&JsonValue>) -> Cell {
    let value = match value {
        None | Some(JsonValue::Null) => {
            return Cell {
                text: String::new(),
                class: "",
            };
        }
        Some(value) => value,
    };

    match &column.format {
        Some(format) => match format.apply(value) {
            Ok(text) => Cell {
                text,
                class: format.css_class(),
            },
            Err(e) => {
                debug!(
                    "Section '{}', column '{}': {}; rendering raw value",
                    section_id, column.key, e
                );
                Cell {
                    text: raw_text(value),
                    class: "",
                }
            }
        },
        None => Cell {
            text: raw_text(value),
            class: "",
        },
    }
}

/// Renders a table section to an HTML fragment.
///
/// # Errors
/// Returns `ReportError::Template` if the table template fails.
pub fn render_table(section_id: &str, table: &TableConfig, rows: &[Row]) -> crate::Result<String> {
    let (headers, body) = table_cells(section_id, table, rows);
    TableTemplate {
        headers: &headers,
        rows: &body,
    }
    .render()
    .map_err(|e| crate::ReportError::template(format!("table for section '{}'", section_id), e))
}

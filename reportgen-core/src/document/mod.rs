//! Document assembly: rendered sections plus page chrome into one markup
//! payload, then handed to a [`DocumentRenderer`].
//!
//! Assembly is pure composition. Row groups are emitted in the order the
//! layout engine assigned, and a row group whose sections were all skipped
//! is left out entirely.

pub mod logo;
pub mod renderer;

pub use renderer::{CommandDocumentRenderer, DocumentRenderer, write_document};

use crate::config::{Orientation, PaperSize, ReportConfig};
use crate::render::RenderedSection;
use crate::{ReportError, Result};
use askama::Template;

/// Page geometry handed to the document renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    /// Paper size
    pub paper_size: PaperSize,
    /// Orientation
    pub orientation: Orientation,
    /// Margin in points
    pub margin: f64,
    /// Page width in points, after orientation
    pub width: f64,
    /// Page height in points, after orientation
    pub height: f64,
}

impl PageSetup {
    /// Computes page dimensions for a paper size and orientation.
    pub fn new(paper_size: PaperSize, orientation: Orientation, margin: f64) -> Self {
        let (width, height) = match (orientation, paper_size.dimensions()) {
            (Orientation::Portrait, (w, h)) => (w, h),
            (Orientation::Landscape, (w, h)) => (h, w),
        };
        Self {
            paper_size,
            orientation,
            margin,
            width,
            height,
        }
    }

    /// Page geometry of a report.
    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.paper_size, config.orientation, config.margin)
    }

    /// Printable width and height in points.
    pub fn content_box(&self) -> (f64, f64) {
        let inset = self.margin * 2.0;
        ((self.width - inset).max(0.0), (self.height - inset).max(0.0))
    }

    /// Body of the CSS `@page` rule.
    ///
    /// ```rust
    /// use reportgen_core::config::{Orientation, PaperSize};
    /// use reportgen_core::document::PageSetup;
    ///
    /// let page = PageSetup::new(PaperSize::A4, Orientation::Landscape, 36.0);
    /// assert_eq!(page.css(), "size: A4 landscape; margin: 36pt");
    /// ```
    pub fn css(&self) -> String {
        format!(
            "size: {} {}; margin: {}pt",
            self.paper_size.css_name(),
            self.orientation,
            self.margin
        )
    }
}

/// Page-level presentation independent of section content.
#[derive(Debug, Clone, PartialEq)]
pub struct Chrome {
    /// Document title
    pub title: Option<String>,
    /// Logo as a `data:` URI
    pub logo: Option<String>,
    /// Page geometry
    pub page: PageSetup,
}

impl Chrome {
    /// Builds chrome from a report, reading the logo from disk.
    ///
    /// A missing logo is logged and skipped.
    pub async fn load(config: &ReportConfig) -> Self {
        let logo = match config.resolved_logo_path() {
            Some(path) => logo::load_logo(&path).await,
            None => None,
        };
        Self {
            title: config.title.clone(),
            logo,
            page: PageSetup::from_config(config),
        }
    }
}

/// Rendered sections sharing a grid row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    /// Grid row number
    pub row_number: u32,
    /// Sections left to right; skipped sections are absent
    pub sections: Vec<RenderedSection>,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    title: Option<&'a str>,
    logo: Option<&'a str>,
    page_css: String,
    content_width: String,
    rows: Vec<&'a RenderedRow>,
}

/// Combines rendered rows with chrome into the report markup.
///
/// # Errors
/// Returns `ReportError::Template` if the page template fails.
pub fn assemble(rows: &[RenderedRow], chrome: &Chrome) -> Result<String> {
    let (content_width, _) = chrome.page.content_box();
    ReportTemplate {
        title: chrome.title.as_deref(),
        logo: chrome.logo.as_deref(),
        page_css: chrome.page.css(),
        content_width: format!("{:.2}pt", content_width),
        rows: rows.iter().filter(|row| !row.sections.is_empty()).collect(),
    }
    .render()
    .map_err(|e| ReportError::template("report page", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridPosition;

    fn section(id: &str, start: u8, end: u8, body: &str) -> RenderedSection {
        RenderedSection {
            section_id: id.to_string(),
            name: Some(format!("{} heading", id)),
            kind: "table",
            grid: GridPosition::new(0, start, end),
            body: body.to_string(),
        }
    }

    fn chrome() -> Chrome {
        Chrome {
            title: Some("Q3 <Sales>".to_string()),
            logo: None,
            page: PageSetup::new(PaperSize::Letter, Orientation::Portrait, 36.0),
        }
    }

    #[test]
    fn test_page_setup_dimensions() {
        let page = PageSetup::new(PaperSize::Letter, Orientation::Landscape, 18.0);
        assert_eq!((page.width, page.height), (792.0, 612.0));
        assert_eq!(page.content_box(), (756.0, 576.0));
        assert_eq!(page.css(), "size: letter landscape; margin: 18pt");
    }

    #[test]
    fn test_assemble_orders_rows_and_skips_empty_groups() {
        let rows = vec![
            RenderedRow {
                row_number: 0,
                sections: vec![section("left", 0, 6, "<p>L</p>"), section("right", 6, 12, "<p>R</p>")],
            },
            RenderedRow {
                row_number: 1,
                sections: Vec::new(),
            },
            RenderedRow {
                row_number: 2,
                sections: vec![section("bottom", 0, 12, "<p>B</p>")],
            },
        ];
        let html = assemble(&rows, &chrome()).unwrap();

        assert_eq!(html.matches("class=\"row\"").count(), 2);
        assert!(!html.contains("data-row=\"1\""));
        let left = html.find("<p>L</p>").unwrap();
        let right = html.find("<p>R</p>").unwrap();
        let bottom = html.find("<p>B</p>").unwrap();
        assert!(left < right && right < bottom);
        assert!(html.contains("<h3>left heading</h3>"));
    }

    #[test]
    fn test_assemble_chrome() {
        let mut chrome = chrome();
        chrome.logo = Some("data:image/png;base64,aGk=".to_string());
        let html = assemble(&[], &chrome).unwrap();

        assert!(html.contains("@page { size: letter portrait; margin: 36pt }"));
        assert!(html.contains("<h1>Q3 &lt;Sales&gt;</h1>"));
        assert!(html.contains(r#"src="data:image/png;base64,aGk=""#));
        assert!(html.contains("width: 540.00pt"));
    }

    #[test]
    fn test_assemble_without_title_or_logo() {
        let mut chrome = chrome();
        chrome.title = None;
        let html = assemble(&[], &chrome).unwrap();
        assert!(!html.contains("report-header\""));
        assert!(!html.contains("<title>"));
    }
}

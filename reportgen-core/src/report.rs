//! The report facade: one validated config plus its rendering collaborators.

use crate::config::{Parameters, ReportConfig};
use crate::data::{DEFAULT_MAX_CONCURRENCY, DataResolver, ReportData};
use crate::document::{
    Chrome, CommandDocumentRenderer, DocumentRenderer, PageSetup, RenderedRow, assemble,
    write_document,
};
use crate::layout::{self, RowGroup};
use crate::render::{ChartRenderer, CommandChartRenderer, SectionRenderer};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A report ready to be generated any number of times.
///
/// The config and its layout are fixed at construction. Every generation
/// resolves data afresh; nothing is cached between calls.
///
/// # Example
///
/// ```rust,no_run
/// use reportgen_core::Report;
///
/// # async fn run() -> reportgen_core::Result<()> {
/// let report = Report::from_path("sales.json").await?;
/// report.generate(Some("sales-data.json".as_ref()), "sales.pdf".as_ref()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Report {
    config: ReportConfig,
    layout: Vec<RowGroup>,
    charts: Arc<dyn ChartRenderer>,
    documents: Arc<dyn DocumentRenderer>,
    max_concurrency: usize,
}

impl Report {
    /// Wraps a validated config, computing its layout once.
    ///
    /// Sections whose column spans overlap in the same row are logged as
    /// warnings; they still render.
    pub fn new(config: ReportConfig) -> Self {
        for overlap in layout::overlaps(&config.sections) {
            warn!("{}", overlap);
        }
        let layout = layout::layout(&config.sections);
        debug!(
            "Laid out {} section(s) in {} row group(s)",
            config.sections.len(),
            layout.len()
        );
        Self {
            config,
            layout,
            charts: Arc::new(CommandChartRenderer::default()),
            documents: Arc::new(CommandDocumentRenderer::default()),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Loads and validates a config file.
    ///
    /// # Errors
    /// Returns `ReportError::Io` if the file cannot be read and
    /// `ReportError::ConfigValidation` if it is not a valid report.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(ReportConfig::from_path(path).await?))
    }

    /// The validated config.
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Row groups in emission order.
    pub fn layout(&self) -> &[RowGroup] {
        &self.layout
    }

    /// Builder method to replace the chart renderer.
    pub fn with_chart_renderer(mut self, charts: Arc<dyn ChartRenderer>) -> Self {
        self.charts = charts;
        self
    }

    /// Builder method to replace the document renderer.
    pub fn with_document_renderer(mut self, documents: Arc<dyn DocumentRenderer>) -> Self {
        self.documents = documents;
        self
    }

    /// Builder method to bound how many sections resolve at once.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Renders the report markup using the report's own parameters.
    ///
    /// # Errors
    /// Fails on the first section whose data or chart cannot be produced.
    pub async fn render_to_markup(&self, data: Option<&ReportData>) -> Result<String> {
        self.render_to_markup_with(data, &Parameters::new()).await
    }

    /// Renders the report markup with request-scoped parameter overrides.
    ///
    /// # Errors
    /// Fails on the first section whose data or chart cannot be produced.
    pub async fn render_to_markup_with(
        &self,
        data: Option<&ReportData>,
        overrides: &Parameters,
    ) -> Result<String> {
        let resolver = DataResolver::new(&self.config)
            .with_overrides(overrides)
            .with_max_concurrency(self.max_concurrency);
        let mut resolved = resolver.resolve_all(data).await?;

        let renderer = SectionRenderer::new(Arc::clone(&self.charts));
        let mut rows = Vec::with_capacity(self.layout.len());
        for group in &self.layout {
            let mut sections = Vec::with_capacity(group.sections.len());
            for &index in &group.sections {
                let Some(section) = self.config.sections.get(index) else {
                    continue;
                };
                let section_rows = resolved.get_mut(index).and_then(Option::take);
                if let Some(rendered) = renderer.render(section, section_rows).await? {
                    sections.push(rendered);
                }
            }
            rows.push(RenderedRow {
                row_number: group.row_number,
                sections,
            });
        }

        let chrome = Chrome::load(&self.config).await;
        assemble(&rows, &chrome)
    }

    /// Renders the report and writes the document to `output`.
    ///
    /// All-or-nothing: on any failure `output` is left untouched.
    ///
    /// # Errors
    /// Returns the first resolution or rendering error, or
    /// `ReportError::DocumentRender` if the document renderer fails.
    pub async fn render_to_document(&self, data: Option<&ReportData>, output: &Path) -> Result<()> {
        self.render_to_document_with(data, &Parameters::new(), output)
            .await
    }

    /// Like [`Self::render_to_document`], with parameter overrides.
    ///
    /// # Errors
    /// See [`Self::render_to_document`].
    pub async fn render_to_document_with(
        &self,
        data: Option<&ReportData>,
        overrides: &Parameters,
        output: &Path,
    ) -> Result<()> {
        info!(
            "Generating report {} ({} section(s))",
            self.config.title.as_deref().unwrap_or("<untitled>"),
            self.config.sections.len()
        );
        let markup = self.render_to_markup_with(data, overrides).await?;
        let page = PageSetup::from_config(&self.config);
        write_document(self.documents.as_ref(), &markup, &page, output).await?;
        info!("Report written to {}", output.display());
        Ok(())
    }

    /// Loads the data payload from `data_path` when given, then writes the
    /// document to `output`.
    ///
    /// # Errors
    /// Returns `ReportError::Io` or `ReportError::Serialization` if the
    /// payload cannot be loaded, otherwise as [`Self::render_to_document`].
    pub async fn generate(&self, data_path: Option<&Path>, output: &Path) -> Result<()> {
        let data = match data_path {
            Some(path) => Some(ReportData::from_path(path).await?),
            None => None,
        };
        self.render_to_document(data.as_ref(), output).await
    }
}

impl std::fmt::Debug for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Report")
            .field("title", &self.config.title)
            .field("sections", &self.config.sections.len())
            .field("row_groups", &self.layout.len())
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

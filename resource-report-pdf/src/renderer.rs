//! Report configuration and page-by-page rendering.

use std::path::{Path, PathBuf};

use resource_report_core::{MetricsTable, PageSpec, ReportPlan};
use tracing::{Span, field, info, instrument};

use crate::{
    chart::draw_page,
    document::ReportDocument,
    errors::{RenderError, Result},
};

/// Document title used when none is configured.
pub const DEFAULT_TITLE: &str = "Resource Metrics Report";

/// Configures and constructs [`ReportRenderer`] instances.
///
/// # Examples
/// ```
/// use resource_report_pdf::ReportBuilder;
///
/// let renderer = ReportBuilder::new("out/report.pdf")
///     .with_title("Nightly run")
///     .build()
///     .expect("path names a file");
/// assert_eq!(renderer.output().file_name().and_then(|n| n.to_str()), Some("report.pdf"));
/// assert_eq!(renderer.title(), "Nightly run");
/// ```
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    output: PathBuf,
    title: String,
}

impl ReportBuilder {
    /// Creates a builder writing to `output` with the default title.
    #[must_use]
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            title: DEFAULT_TITLE.to_owned(),
        }
    }

    /// Overrides the document title stored in the PDF metadata.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`RenderError::InvalidOutputPath`] when the output path has no
    /// file name (for example `..` or a bare root).
    pub fn build(self) -> Result<ReportRenderer> {
        if self.output.file_name().is_none() {
            return Err(RenderError::InvalidOutputPath { path: self.output });
        }
        Ok(ReportRenderer {
            output: self.output,
            title: self.title,
        })
    }
}

/// Draws a [`ReportPlan`] into a PDF file.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    output: PathBuf,
    title: String,
}

impl ReportRenderer {
    /// Returns the output path.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Returns the document title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Renders every page of `plan` in order and writes the document,
    /// replacing any existing file at the output path.
    ///
    /// # Errors
    /// Returns [`RenderError`] when a page cannot be drawn or the document
    /// cannot be written. Pages drawn before a drawing failure are still
    /// written.
    #[instrument(
        name = "report.render",
        err,
        skip(self, table, plan),
        fields(output = %self.output.display(), pages = plan.len(), written = field::Empty),
    )]
    pub fn render(&self, table: &MetricsTable, plan: &ReportPlan) -> Result<RenderedReport> {
        let mut document = ReportDocument::create(&self.output, &self.title)?;
        let mut pages = Vec::with_capacity(plan.len());
        for (index, page) in plan.pages().iter().enumerate() {
            render_page(&mut document, table, index + 1, page)?;
            pages.push(page.title().to_owned());
        }
        let written = document.pages();
        document.finish()?;
        Span::current().record("written", written);
        info!(output = %self.output.display(), pages = written, "report written");
        Ok(RenderedReport {
            output: self.output.clone(),
            pages,
        })
    }
}

#[instrument(
    name = "report.page",
    err,
    skip_all,
    fields(page = number, title = page.title(), series = page.series().len()),
)]
fn render_page(
    document: &mut ReportDocument,
    table: &MetricsTable,
    number: usize,
    page: &PageSpec,
) -> Result<()> {
    let backend = document.add_page(page.size())?;
    draw_page(backend, table, page).map_err(|source| RenderError::Draw {
        title: page.title().to_owned(),
        source,
    })
}

/// Outcome of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    output: PathBuf,
    pages: Vec<String>,
}

impl RenderedReport {
    /// Returns the path the document was written to.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Returns page titles in document order.
    #[must_use]
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    /// Returns the number of pages written.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

//! Lifecycle of the multi-page report document.

use std::{
    fs,
    path::{Path, PathBuf},
};

use printpdf::{
    BuiltinFont, CustomPdfConformance, IndirectFontRef, Mm, PdfConformance, PdfDocument,
    PdfDocumentReference, Pt,
};
use resource_report_core::PageSize;
use tracing::{debug, warn};

use crate::{
    backend::PdfPageBackend,
    errors::{RenderError, Result},
};

const LAYER_NAME: &str = "chart";

/// Open report document.
///
/// Pages accumulate in memory. [`ReportDocument::finish`] writes them to the
/// output path; a document dropped without finishing writes whatever pages
/// it holds so a failed run still leaves a readable partial report.
pub(crate) struct ReportDocument {
    path: PathBuf,
    document: Option<PdfDocumentReference>,
    font: IndirectFontRef,
    pages: usize,
}

impl ReportDocument {
    /// Opens an empty document without an embedded ICC profile or XMP
    /// metadata, keeping reports of a few pages in the kilobyte range.
    pub(crate) fn create(path: &Path, title: &str) -> Result<Self> {
        let document = PdfDocument::empty(title).with_conformance(PdfConformance::Custom(
            CustomPdfConformance {
                requires_icc_profile: false,
                requires_xmp_metadata: false,
                ..CustomPdfConformance::default()
            },
        ));
        let font = document
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|err| RenderError::pdf(&err))?;
        debug!(path = %path.display(), "opened report document");
        Ok(Self {
            path: path.to_owned(),
            document: Some(document),
            font,
            pages: 0,
        })
    }

    /// Appends a blank page and returns a backend drawing onto it.
    #[expect(clippy::cast_precision_loss, reason = "page sizes are small")]
    pub(crate) fn add_page(&mut self, size: PageSize) -> Result<PdfPageBackend> {
        let document = self.document.as_ref().ok_or_else(|| RenderError::Pdf {
            message: "document already finalized".to_owned(),
        })?;
        let (page, layer) = document.add_page(
            Mm::from(Pt(size.width() as f32)),
            Mm::from(Pt(size.height() as f32)),
            LAYER_NAME,
        );
        let layer = document.get_page(page).get_layer(layer);
        self.pages += 1;
        Ok(PdfPageBackend::new(layer, self.font.clone(), size))
    }

    /// Number of pages added so far.
    pub(crate) const fn pages(&self) -> usize {
        self.pages
    }

    /// Encodes the document and writes it to the output path.
    pub(crate) fn finish(mut self) -> Result<()> {
        self.write()
    }

    fn write(&mut self) -> Result<()> {
        let Some(document) = self.document.take() else {
            return Ok(());
        };
        let bytes = document.save_to_bytes().map_err(|err| RenderError::pdf(&err))?;
        fs::write(&self.path, bytes).map_err(|source| RenderError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for ReportDocument {
    fn drop(&mut self) {
        if self.document.is_none() || self.pages == 0 {
            return;
        }
        warn!(
            path = %self.path.display(),
            pages = self.pages,
            "finalizing partial report"
        );
        if let Err(err) = self.write() {
            warn!(error = %err, "failed to finalize partial report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    fn finish_writes_every_page() -> Result<()> {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("report.pdf");
        let mut document = ReportDocument::create(&path, "test")?;
        document.add_page(PageSize::COMPACT)?;
        document.add_page(PageSize::WIDE)?;
        assert_eq!(document.pages(), 2);
        document.finish()?;

        let bytes = fs::read(&path).expect("report written");
        assert!(bytes.starts_with(b"%PDF"));
        Ok(())
    }

    #[rstest]
    fn drop_finalizes_started_documents() -> Result<()> {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("partial.pdf");
        {
            let mut document = ReportDocument::create(&path, "partial")?;
            document.add_page(PageSize::MEDIUM)?;
        }
        assert!(path.exists(), "dropped document must be finalized");
        Ok(())
    }

    #[rstest]
    fn drop_without_pages_writes_nothing() -> Result<()> {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("empty.pdf");
        drop(ReportDocument::create(&path, "empty")?);
        assert!(!path.exists());
        Ok(())
    }
}

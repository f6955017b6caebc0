//! Errors raised while drawing and writing the report document.

use std::{convert::Infallible, io, path::PathBuf};

use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

/// Failure to produce the report document.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RenderError {
    /// The configured output path has no file name component.
    #[error("output path `{path}` does not name a file")]
    InvalidOutputPath {
        /// Rejected path.
        path: PathBuf,
    },
    /// Plotting a page failed.
    #[error("failed to draw page `{title}`: {source}")]
    Draw {
        /// Title of the page being drawn.
        title: String,
        /// Underlying plotting failure.
        #[source]
        source: DrawingAreaErrorKind<Infallible>,
    },
    /// The PDF encoder rejected the document.
    #[error("failed to encode PDF document: {message}")]
    Pdf {
        /// Encoder diagnostic.
        message: String,
    },
    /// The finished document could not be written.
    #[error("failed to write `{path}`: {source}")]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
}

impl RenderError {
    pub(crate) fn pdf(error: &impl std::fmt::Display) -> Self {
        Self::Pdf {
            message: error.to_string(),
        }
    }
}

/// Convenient alias for rendering results.
pub type Result<T> = core::result::Result<T, RenderError>;

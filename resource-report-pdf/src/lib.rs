//! PDF rendering for resource-report page plans.
//!
//! Each [`resource_report_core::PageSpec`] becomes one vector page drawn with
//! `plotters` onto a `printpdf` layer through an in-crate drawing backend.
//! Text uses the PDF built-in Helvetica font, so no font files are read.

mod backend;
mod chart;
mod document;
mod errors;
mod renderer;

pub use crate::{
    errors::{RenderError, Result},
    renderer::{DEFAULT_TITLE, RenderedReport, ReportBuilder, ReportRenderer},
};

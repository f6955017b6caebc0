//! Line charts for one planned page.

use std::convert::Infallible;

use plotters::{drawing::DrawingAreaErrorKind, prelude::*};
use resource_report_core::{MetricsTable, PageSpec};

use crate::backend::PdfPageBackend;

const FONT: &str = "sans-serif";
const CAPTION_SIZE: u32 = 14;
const DESC_SIZE: u32 = 10;
const LABEL_SIZE: u32 = 8;
const MARGIN: u32 = 10;
const X_LABEL_AREA: u32 = 32;
const Y_LABEL_AREA: u32 = 48;
const LINE_WIDTH: u32 = 1;
const LEGEND_SAMPLE: i32 = 16;

/// Draws `page` over `table` onto `backend`.
pub(crate) fn draw_page(
    backend: PdfPageBackend,
    table: &MetricsTable,
    page: &PageSpec,
) -> Result<(), DrawingAreaErrorKind<Infallible>> {
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(page.title(), (FONT, CAPTION_SIZE))
        .margin(MARGIN)
        .x_label_area_size(X_LABEL_AREA)
        .y_label_area_size(Y_LABEL_AREA)
        .build_cartesian_2d(page.x_range(table), page.y_range(table))?;

    chart
        .configure_mesh()
        .x_desc(page.x_label())
        .y_desc(page.y_label())
        .axis_desc_style((FONT, DESC_SIZE))
        .label_style((FONT, LABEL_SIZE))
        .x_label_formatter(&|x| format!("{x:.1}"))
        .y_label_formatter(&|y| format!("{y:.1}"))
        .draw()?;

    for (index, series) in page.series().iter().enumerate() {
        let style = Palette99::pick(index).stroke_width(LINE_WIDTH);
        let annotation = chart.draw_series(LineSeries::new(series.points(table), style))?;
        if page.legend() {
            annotation
                .label(series.label())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + LEGEND_SAMPLE, y)], style)
                });
        }
    }

    if page.legend() && !page.series().is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font((FONT, LABEL_SIZE))
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

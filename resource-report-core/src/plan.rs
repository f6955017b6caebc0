//! Page plan derived from a [`MetricSchema`].
//!
//! The plan is plain data: every page carries its title, axis labels, size
//! and the resolved series to draw. Renderers walk [`ReportPlan::pages`] in
//! order and never inspect column names themselves.

use std::ops::Range;

use crate::{
    schema::{GpuColumns, GpuField, GpuIndex, MetricSchema},
    table::{ColumnHandle, MetricsTable},
};

/// Label of the time axis on every page.
pub const TIME_AXIS_LABEL: &str = "Time (s)";

const KIB_PER_MIB: f64 = 1024.0;
const HEADROOM: f64 = 0.1;

/// Page dimensions in PDF points (72 per inch).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageSize {
    width: u32,
    height: u32,
}

impl PageSize {
    /// Ten by four inches.
    pub const WIDE: Self = Self::new(720, 288);
    /// Eight by four inches.
    pub const MEDIUM: Self = Self::new(576, 288);
    /// Six by three inches.
    pub const COMPACT: Self = Self::new(432, 216);

    /// Creates a page size from point dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the width in points.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.width
    }

    /// Returns the height in points.
    #[must_use]
    pub const fn height(self) -> u32 {
        self.height
    }
}

/// What a page shows.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PageKind {
    /// All CPU core usage series overlaid.
    CpuCores,
    /// Resident memory.
    Ram,
    /// Compute, memory, encoder and decoder utilization of one GPU.
    GpuUtilization(GpuIndex),
    /// The four clock rates of one GPU.
    GpuClocks(GpuIndex),
    /// Temperature of one GPU.
    GpuTemperature(GpuIndex),
    /// Power draw of one GPU.
    GpuPower(GpuIndex),
}

impl PageKind {
    /// Returns the GPU this page belongs to, if any.
    #[must_use]
    pub const fn gpu(self) -> Option<GpuIndex> {
        match self {
            Self::CpuCores | Self::Ram => None,
            Self::GpuUtilization(gpu)
            | Self::GpuClocks(gpu)
            | Self::GpuTemperature(gpu)
            | Self::GpuPower(gpu) => Some(gpu),
        }
    }

    fn title(self) -> String {
        match self {
            Self::CpuCores => "CPU Usage per Core".to_owned(),
            Self::Ram => "RAM Usage Over Time".to_owned(),
            Self::GpuUtilization(gpu) => {
                format!("GPU {gpu} SM compute, VRAM & Encoder/Decoder Utilization")
            }
            Self::GpuClocks(gpu) => format!("GPU {gpu} Clock Rates"),
            Self::GpuTemperature(gpu) => format!("GPU {gpu} Temperature"),
            Self::GpuPower(gpu) => format!("GPU {gpu} Power Consumption"),
        }
    }

    const fn y_label(self) -> &'static str {
        match self {
            Self::CpuCores => "CPU core usage (%)",
            Self::Ram => "RAM Usage (MiB)",
            Self::GpuUtilization(_) => "Utilization (%)",
            Self::GpuClocks(_) => "Clock (MHz)",
            Self::GpuTemperature(_) => "Temperature (°C)",
            Self::GpuPower(_) => "Power (W)",
        }
    }

    const fn size(self) -> PageSize {
        match self {
            Self::CpuCores => PageSize::WIDE,
            Self::GpuUtilization(_) | Self::GpuClocks(_) => PageSize::MEDIUM,
            Self::Ram | Self::GpuTemperature(_) | Self::GpuPower(_) => PageSize::COMPACT,
        }
    }

    const fn legend(self) -> bool {
        matches!(
            self,
            Self::CpuCores | Self::GpuUtilization(_) | Self::GpuClocks(_)
        )
    }
}

/// Unit conversion applied to raw column values before plotting.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Scale {
    /// Values are plotted as recorded.
    #[default]
    Identity,
    /// KiB converted to MiB.
    KibToMib,
}

impl Scale {
    /// Converts one raw value.
    ///
    /// # Examples
    /// ```
    /// use resource_report_core::Scale;
    ///
    /// assert_eq!(Scale::KibToMib.apply(2048.0), 2.0);
    /// assert_eq!(Scale::Identity.apply(42.5), 42.5);
    /// ```
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "unit conversion")]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Identity => value,
            Self::KibToMib => value / KIB_PER_MIB,
        }
    }
}

/// One line on a chart.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SeriesSpec {
    label: String,
    column: ColumnHandle,
    scale: Scale,
}

impl SeriesSpec {
    /// Creates a series reading `column` through `scale`.
    #[must_use]
    pub fn new(label: impl Into<String>, column: ColumnHandle, scale: Scale) -> Self {
        Self {
            label: label.into(),
            column,
            scale,
        }
    }

    /// Returns the legend label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the source column.
    #[must_use]
    pub const fn column(&self) -> ColumnHandle {
        self.column
    }

    /// Returns the unit conversion.
    #[must_use]
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    /// Iterates over converted values in row order.
    pub fn values<'a>(&self, table: &'a MetricsTable) -> impl Iterator<Item = f64> + 'a {
        let scale = self.scale;
        table
            .column_values(self.column)
            .iter()
            .map(move |value| scale.apply(*value))
    }

    /// Iterates over `(seconds, value)` pairs in row order.
    pub fn points<'a>(&self, table: &'a MetricsTable) -> impl Iterator<Item = (f64, f64)> + 'a {
        table.seconds().iter().copied().zip(self.values(table))
    }
}

/// A single chart page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageSpec {
    kind: PageKind,
    title: String,
    y_label: &'static str,
    size: PageSize,
    legend: bool,
    series: Vec<SeriesSpec>,
}

impl PageSpec {
    fn new(kind: PageKind, series: Vec<SeriesSpec>) -> Self {
        Self {
            kind,
            title: kind.title(),
            y_label: kind.y_label(),
            size: kind.size(),
            legend: kind.legend(),
            series,
        }
    }

    /// Returns what the page shows.
    #[must_use]
    pub const fn kind(&self) -> PageKind {
        self.kind
    }

    /// Returns the chart title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the x-axis label.
    #[must_use]
    pub const fn x_label(&self) -> &'static str {
        TIME_AXIS_LABEL
    }

    /// Returns the y-axis label.
    #[must_use]
    pub const fn y_label(&self) -> &'static str {
        self.y_label
    }

    /// Returns the page dimensions.
    #[must_use]
    pub const fn size(&self) -> PageSize {
        self.size
    }

    /// Reports whether the page draws a legend.
    #[must_use]
    pub const fn legend(&self) -> bool {
        self.legend
    }

    /// Returns the series drawn on this page.
    #[must_use]
    pub fn series(&self) -> &[SeriesSpec] {
        &self.series
    }

    /// Returns the time span covered by `table`, in seconds.
    ///
    /// An empty table or a single instant yields a one-second span.
    #[must_use]
    pub fn x_range(&self, table: &MetricsTable) -> Range<f64> {
        let seconds = table.seconds();
        match (seconds.first(), seconds.last()) {
            (Some(first), Some(last)) => widen(*first..*last),
            _ => widen(0.0..0.0),
        }
    }

    /// Returns the value range of every series on this page.
    ///
    /// The range always includes zero. It starts at the smallest value when
    /// that is negative and ends ten percent of the largest magnitude above
    /// the largest value (or above zero), so an all-negative series keeps its
    /// top in view.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "axis headroom")]
    pub fn y_range(&self, table: &MetricsTable) -> Range<f64> {
        let (min, max) = self
            .series
            .iter()
            .flat_map(|series| series.values(table))
            .filter(|value| value.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
                (min.min(value), max.max(value))
            });
        if min > max {
            return widen(0.0..0.0);
        }
        let top = max.max(0.0);
        let span = top.max(min.abs());
        widen(min.min(0.0)..top + span * HEADROOM)
    }
}

/// Ensures `range` is non-empty by extending degenerate spans to one unit.
#[expect(clippy::float_arithmetic, reason = "axis widening")]
fn widen(range: Range<f64>) -> Range<f64> {
    if range.end > range.start {
        range
    } else {
        range.start..range.start + 1.0
    }
}

/// Ordered list of pages to render.
///
/// # Examples
/// ```
/// use resource_report_core::{MetricSchema, MetricsTable, PageKind, ReportPlan};
///
/// let csv = "timestamp_ms,cpu0_usage,ram_kib\n0,5,2048\n1500,7,4096\n";
/// let table = MetricsTable::try_from_reader("demo", csv.as_bytes())?;
/// let plan = ReportPlan::from_schema(&MetricSchema::classify(&table)?);
/// let kinds: Vec<PageKind> = plan.pages().iter().map(|page| page.kind()).collect();
/// assert_eq!(kinds, [PageKind::CpuCores, PageKind::Ram]);
/// # Ok::<(), resource_report_core::DataFormatError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ReportPlan {
    pages: Vec<PageSpec>,
}

impl ReportPlan {
    /// Lays out the CPU page, the RAM page and four pages per GPU.
    #[must_use]
    pub fn from_schema(schema: &MetricSchema) -> Self {
        let cpu = schema
            .cpu_cores()
            .iter()
            .map(|core| SeriesSpec::new(core.name(), core.handle(), Scale::Identity))
            .collect();
        let ram = vec![SeriesSpec::new(
            schema.ram().name(),
            schema.ram().handle(),
            Scale::KibToMib,
        )];

        let mut pages = vec![
            PageSpec::new(PageKind::CpuCores, cpu),
            PageSpec::new(PageKind::Ram, ram),
        ];
        for gpu in schema.gpus() {
            pages.extend(gpu_pages(gpu));
        }
        Self { pages }
    }

    /// Returns the pages in rendering order.
    #[must_use]
    pub fn pages(&self) -> &[PageSpec] {
        &self.pages
    }

    /// Returns the number of pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Always `false`: the CPU and RAM pages are unconditional.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn gpu_pages(gpu: &GpuColumns) -> [PageSpec; 4] {
    let index = gpu.index();
    let single = |field: GpuField| {
        vec![SeriesSpec::new(
            field.column_name(index),
            gpu.handle(field),
            Scale::Identity,
        )]
    };
    [
        PageSpec::new(
            PageKind::GpuUtilization(index),
            UTILIZATION_SERIES
                .into_iter()
                .map(|(field, label)| SeriesSpec::new(label, gpu.handle(field), Scale::Identity))
                .collect(),
        ),
        PageSpec::new(
            PageKind::GpuClocks(index),
            GpuField::CLOCKS
                .into_iter()
                .map(|field| SeriesSpec::new(field.suffix(), gpu.handle(field), Scale::Identity))
                .collect(),
        ),
        PageSpec::new(PageKind::GpuTemperature(index), single(GpuField::Temp)),
        PageSpec::new(PageKind::GpuPower(index), single(GpuField::Power)),
    ]
}

/// Legend labels of the utilization overlay.
const UTILIZATION_SERIES: [(GpuField, &str); 4] = [
    (GpuField::Util, "GPU Util"),
    (GpuField::Mem, "Mem Util"),
    (GpuField::EncUtil, "Enc Util"),
    (GpuField::DecUtil, "Dec Util"),
];

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    use crate::error::Result;

    fn table(csv: &str) -> Result<MetricsTable> {
        MetricsTable::try_from_reader("plan", csv.as_bytes())
    }

    fn page(table: &MetricsTable) -> Result<PageSpec> {
        let plan = ReportPlan::from_schema(&MetricSchema::classify(table)?);
        Ok(plan.pages().first().cloned().expect("CPU page is always planned"))
    }

    #[rstest]
    #[case::positive("timestamp_ms,cpu0_usage,ram_kib\n0,10,0\n1000,50,0\n", 0.0, 55.0)]
    #[case::negative("timestamp_ms,cpu0_usage,ram_kib\n0,-4,0\n1000,20,0\n", -4.0, 22.0)]
    #[case::all_negative("timestamp_ms,cpu0_usage,ram_kib\n0,-5,0\n1000,-1,0\n", -5.0, 0.5)]
    #[case::constant_zero("timestamp_ms,cpu0_usage,ram_kib\n0,0,0\n1000,0,0\n", 0.0, 1.0)]
    #[case::no_rows("timestamp_ms,cpu0_usage,ram_kib\n", 0.0, 1.0)]
    #[case::no_series("timestamp_ms,ram_kib\n0,0\n", 0.0, 1.0)]
    fn y_range_adds_headroom(
        #[case] csv: &str,
        #[case] start: f64,
        #[case] end: f64,
    ) -> Result<()> {
        let table = table(csv)?;
        let range = page(&table)?.y_range(&table);
        assert!((range.start - start).abs() < 1e-9, "start {range:?}");
        assert!((range.end - end).abs() < 1e-9, "end {range:?}");
        Ok(())
    }

    #[rstest]
    #[case::span("timestamp_ms,ram_kib\n500,0\n2500,0\n", 0.5..2.5)]
    #[case::single_row("timestamp_ms,ram_kib\n2000,0\n", 2.0..3.0)]
    #[case::no_rows("timestamp_ms,ram_kib\n", 0.0..1.0)]
    fn x_range_spans_observed_seconds(
        #[case] csv: &str,
        #[case] expected: Range<f64>,
    ) -> Result<()> {
        let table = table(csv)?;
        assert_eq!(page(&table)?.x_range(&table), expected);
        Ok(())
    }

    #[rstest]
    fn ram_series_is_reported_in_mib() -> Result<()> {
        let table = table("timestamp_ms,ram_kib\n1500,2048\n")?;
        let plan = ReportPlan::from_schema(&MetricSchema::classify(&table)?);
        let ram = plan.pages().get(1).expect("RAM page is always planned");
        let series = ram.series().first().expect("RAM page has one series");
        assert_eq!(series.scale(), Scale::KibToMib);
        assert_eq!(series.points(&table).collect::<Vec<_>>(), [(1.5, 2.0)]);
        Ok(())
    }

    #[rstest]
    #[case::cpu(PageKind::CpuCores, PageSize::WIDE, true)]
    #[case::ram(PageKind::Ram, PageSize::COMPACT, false)]
    #[case::util(PageKind::GpuUtilization(0), PageSize::MEDIUM, true)]
    #[case::clocks(PageKind::GpuClocks(0), PageSize::MEDIUM, true)]
    #[case::temp(PageKind::GpuTemperature(0), PageSize::COMPACT, false)]
    #[case::power(PageKind::GpuPower(0), PageSize::COMPACT, false)]
    fn page_layout_depends_on_kind(
        #[case] kind: PageKind,
        #[case] size: PageSize,
        #[case] legend: bool,
    ) {
        assert_eq!(kind.size(), size);
        assert_eq!(kind.legend(), legend);
    }

    #[rstest]
    fn utilization_labels_follow_field_order() {
        let (fields, labels): (Vec<GpuField>, Vec<&str>) = UTILIZATION_SERIES.into_iter().unzip();
        assert_eq!(fields, GpuField::UTILIZATION);
        assert_eq!(labels, ["GPU Util", "Mem Util", "Enc Util", "Dec Util"]);
    }

    #[rstest]
    fn y_range_contains_every_plotted_value() -> Result<()> {
        let table = table("timestamp_ms,cpu0_usage,ram_kib\n0,-5,0\n1000,-1,0\n")?;
        let page = page(&table)?;
        let range = page.y_range(&table);
        let values = page
            .series()
            .iter()
            .flat_map(|series| series.values(&table))
            .collect::<Vec<_>>();
        assert_eq!(values, [-5.0, -1.0]);
        assert!(values.iter().all(|value| range.contains(value)), "{range:?}");
        Ok(())
    }
}

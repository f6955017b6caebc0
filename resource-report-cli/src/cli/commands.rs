//! Command implementation and argument parsing for the resource-report CLI.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use resource_report_core::{
    DataFormatError, DataFormatErrorCode, GpuIndex, MetricSchema, MetricsTable, ReportPlan,
};
use resource_report_pdf::{RenderError, ReportBuilder};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

/// File the report is written to, relative to the working directory.
pub const REPORT_FILE_NAME: &str = "resource_metrics_report.pdf";

/// Placeholder for the input path in the usage line.
const USAGE_OPERAND: &str = "<metrics_csv_file>";

/// Top-level CLI options parsed by [`clap`].
///
/// The metrics path is optional at the parser level so that its absence
/// surfaces as [`CliError::Usage`] rather than a clap parse failure.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "resource-report",
    version,
    about = "Render CPU, RAM and GPU utilization charts from a metrics CSV log into a PDF report."
)]
pub struct Cli {
    /// Metrics CSV file recorded during the workload run.
    #[arg(value_name = "METRICS_CSV_FILE")]
    pub metrics: Option<PathBuf>,
}

/// Errors surfaced while executing the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// The metrics file argument was not supplied.
    #[error("missing metrics file argument")]
    Usage,
    /// Loading or classifying the metrics log failed.
    #[error(transparent)]
    DataFormat(#[from] DataFormatError),
    /// Drawing or writing the report failed.
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl CliError {
    /// Returns the stable data-format code, when the failure has one.
    #[must_use]
    pub const fn code(&self) -> Option<DataFormatErrorCode> {
        match self {
            Self::DataFormat(err) => Some(err.code()),
            Self::Usage | Self::Render(_) => None,
        }
    }
}

/// Summarises a successful report run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSummary {
    /// Path the report was written to.
    pub output: PathBuf,
    /// Name of the metrics log (its file stem).
    pub source: String,
    /// Number of samples in the log.
    pub rows: usize,
    /// Seconds between the first and last sample.
    pub duration_seconds: f64,
    /// Number of CPU cores charted.
    pub cpu_cores: usize,
    /// GPU indices charted, ascending.
    pub gpus: Vec<GpuIndex>,
    /// Page titles in document order.
    pub pages: Vec<String>,
}

/// Executes the CLI represented by `cli`, writing [`REPORT_FILE_NAME`] into
/// the current working directory.
///
/// # Errors
/// Returns [`CliError::Usage`] when no metrics path was given and forwards
/// loader and renderer failures otherwise.
#[instrument(name = "cli.run", err, skip(cli), fields(path = field::Empty))]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    let metrics = cli.metrics.ok_or(CliError::Usage)?;
    Span::current().record("path", field::display(metrics.display()));
    run_report(&metrics, Path::new(REPORT_FILE_NAME))
}

#[instrument(
    name = "cli.execute",
    err,
    skip_all,
    fields(
        metrics = %metrics.display(),
        output = %output.display(),
        rows = field::Empty,
        pages = field::Empty,
    ),
)]
pub(super) fn run_report(metrics: &Path, output: &Path) -> Result<ExecutionSummary, CliError> {
    let table = MetricsTable::try_from_path(metrics)?;
    let schema = MetricSchema::classify(&table)?;
    let plan = ReportPlan::from_schema(&schema);
    let report = ReportBuilder::new(output).build()?.render(&table, &plan)?;

    let span = Span::current();
    span.record("rows", table.len());
    span.record("pages", report.page_count());
    info!(
        source = table.name(),
        rows = table.len(),
        pages = report.page_count(),
        "report completed"
    );
    Ok(ExecutionSummary {
        output: report.output().to_path_buf(),
        source: table.name().to_owned(),
        rows: table.len(),
        duration_seconds: table.duration_seconds(),
        cpu_cores: schema.cpu_cores().len(),
        gpus: schema.gpu_indices().collect(),
        pages: report.pages().to_vec(),
    })
}

/// Formats the one-line usage message for `program`.
///
/// # Examples
/// ```
/// use resource_report_cli::cli::usage_line;
///
/// assert_eq!(usage_line("plot"), "Usage: plot <metrics_csv_file>");
/// ```
#[must_use]
pub fn usage_line(program: &str) -> String {
    format!("Usage: {program} {USAGE_OPERAND}")
}

/// Writes the usage line for `program` to `writer`.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_usage(program: &str, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "{}", usage_line(program))?;
    writer.flush()
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use resource_report_cli::cli::{ExecutionSummary, render_summary};
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let summary = ExecutionSummary {
///     output: "resource_metrics_report.pdf".into(),
///     source: "metrics".into(),
///     rows: 3,
///     duration_seconds: 1.0,
///     cpu_cores: 2,
///     gpus: vec![],
///     pages: vec!["CPU Usage per Core".into(), "RAM Usage Over Time".into()],
/// };
/// let mut buffer = Vec::new();
/// render_summary(&summary, &mut buffer)?;
/// let text = String::from_utf8(buffer)?;
/// assert!(text.contains("gpus: none"));
/// assert!(text.ends_with("  2. RAM Usage Over Time\n"));
/// # Ok(())
/// # }
/// ```
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "report: {}", summary.output.display())?;
    writeln!(writer, "source: {}", summary.source)?;
    writeln!(writer, "rows: {}", summary.rows)?;
    writeln!(writer, "duration: {:.1} s", summary.duration_seconds)?;
    writeln!(writer, "cpu cores: {}", summary.cpu_cores)?;
    writeln!(writer, "gpus: {}", format_gpus(&summary.gpus))?;
    writeln!(writer, "pages: {}", summary.pages.len())?;
    for (index, title) in summary.pages.iter().enumerate() {
        writeln!(writer, "  {}. {title}", index + 1)?;
    }
    Ok(())
}

pub(super) fn format_gpus(gpus: &[GpuIndex]) -> String {
    if gpus.is_empty() {
        return "none".to_owned();
    }
    gpus.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

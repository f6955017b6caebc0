//! Command-line interface for rendering resource-metrics reports.
//!
//! The CLI takes a single metrics CSV path, renders the chart pages and
//! writes `resource_metrics_report.pdf` into the working directory.

mod commands;

pub use commands::{
    Cli, CliError, ExecutionSummary, REPORT_FILE_NAME, render_summary, render_usage, run_cli,
    usage_line,
};

#[cfg(test)]
mod test_helpers;

//! CLI entry point for rendering a resource-metrics PDF report.
//!
//! Parses the single metrics path with clap, renders the report, prints the
//! run summary to stdout and maps failures to exit codes. A missing path
//! prints the usage line to stdout and exits with status 1.

use std::env;
use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use resource_report_cli::{
    cli::{Cli, CliError, render_summary, render_usage, run_cli},
    logging::{self, LoggingError},
};
use tracing::{error, field};

const FALLBACK_PROGRAM_NAME: &str = "resource-report";

/// Run the report, render the summary and flush the output stream.
fn try_main(cli: Cli) -> Result<()> {
    let summary = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_summary(&summary, &mut writer).context("failed to render summary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return report_parse_error(&err),
    };

    if let Err(err) = try_main(cli) {
        let cli_error = err.downcast_ref::<CliError>();
        if matches!(cli_error, Some(CliError::Usage)) {
            print_usage();
            return ExitCode::FAILURE;
        }

        let code_field = cli_error
            .and_then(CliError::code)
            .map(|code| field::display(code.as_str()));
        error!(error = %format!("{err:#}"), code = code_field, "command execution failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Help and version requests succeed; every other parse failure exits with 1.
fn report_parse_error(err: &clap::Error) -> ExitCode {
    if let Err(print_err) = err.print() {
        error!(error = %print_err, kind = ?err.kind(), "failed to print argument error");
        return ExitCode::FAILURE;
    }
    if err.use_stderr() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_usage() {
    let program = env::args_os()
        .next()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_PROGRAM_NAME.to_owned());
    if let Err(err) = render_usage(&program, io::stdout().lock()) {
        error!(error = %err, "failed to print usage");
    }
}

#[expect(
    clippy::print_stderr,
    reason = "Emit one-off diagnostic before tracing is initialized"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}

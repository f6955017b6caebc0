//! Small helpers shared across CLI tests.
//!
//! The CLI unit tests write metrics logs into scratch directories and render
//! reports beside them, never into the process working directory.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use resource_report_test_support::fixtures::MetricsCsv;
use tempfile::TempDir;

use super::CliError;
use super::commands::run_report;

pub(super) const OUTPUT_NAME: &str = "report.pdf";

/// Writer whose every write fails as a closed pipe would.
pub(super) struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(super) fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    }
}

pub(super) fn write_metrics(
    dir: &TempDir,
    name: &str,
    csv: &MetricsCsv,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    Ok(csv.write_into(dir.path(), name)?)
}

pub(super) fn output_path(dir: &TempDir) -> PathBuf {
    dir.path().join(OUTPUT_NAME)
}

pub(super) fn run_report_expecting_error(
    dir: &TempDir,
    metrics: &Path,
    panic_msg: &str,
) -> CliError {
    match run_report(metrics, &output_path(dir)) {
        Ok(_) => panic!("{panic_msg}"),
        Err(err) => err,
    }
}

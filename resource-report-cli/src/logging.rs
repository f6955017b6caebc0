//! Diagnostics for the `resource-report` binary.
//!
//! Everything here writes to stderr: stdout carries only the usage line or
//! the run summary. Two environment variables shape the output:
//!
//! - `RUST_LOG` holds `tracing` filter directives. When it is unset the
//!   report crates log at `info` and their dependencies (`printpdf`,
//!   `plotters`, ...) at `warn`. Directives that fail to parse are replaced
//!   by that default and reported once logging is up.
//! - `RESOURCE_REPORT_LOG_FORMAT` is `human` (default) or `json`.
//!
//! Records emitted through the `log` facade are bridged into the same
//! subscriber.

use std::{env, str::FromStr, sync::OnceLock};

use thiserror::Error;
use tracing::{debug, warn};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Environment variable selecting `human` or `json` output.
pub const LOG_FORMAT_ENV: &str = "RESOURCE_REPORT_LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset or unusable. Targets match by prefix,
/// so `resource_report` covers the binary and every library crate.
const DEFAULT_DIRECTIVES: &str = "warn,resource_report=info";

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Output format of diagnostic logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Human,
    /// One JSON object per line, with the current span list attached.
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(LoggingError::UnsupportedFormat {
                provided: other.to_owned(),
            }),
        }
    }
}

/// Errors raised while initialising structured logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Environment variable contained invalid UTF-8 data.
    #[error("environment variable `{name}` contained invalid UTF-8: {source}")]
    InvalidUnicode {
        /// Name of the offending environment variable.
        name: &'static str,
        /// Underlying parse failure.
        #[source]
        source: env::VarError,
    },
    /// Unsupported value in `RESOURCE_REPORT_LOG_FORMAT`.
    #[error("unsupported log format `{provided}`; expected `human` or `json`")]
    UnsupportedFormat {
        /// Raw value supplied by the user.
        provided: String,
    },
    /// Failed to install the global tracing subscriber.
    #[error("failed to install tracing subscriber: {source}")]
    InstallFailed {
        /// Error raised by `tracing_subscriber`.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
}

/// Filter chosen for the subscriber, plus the directives it replaced.
#[derive(Debug)]
struct FilterChoice {
    filter: EnvFilter,
    rejected: Option<String>,
}

/// Installs global structured logging if it has not already been configured.
///
/// # Errors
/// Returns [`LoggingError`] if `RESOURCE_REPORT_LOG_FORMAT` holds invalid
/// Unicode or an unsupported value. A subscriber installed elsewhere is kept
/// and is not an error.
pub fn init_logging() -> Result<(), LoggingError> {
    if INITIALISED.get().is_some() {
        return Ok(());
    }

    let format = read_log_format()?;
    let choice = choose_filter(env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());
    match install_subscriber(format, choice) {
        Ok(()) => {}
        Err(LoggingError::InstallFailed { source }) => {
            debug!(error = %source, "structured logging already configured elsewhere");
        }
        Err(err) => return Err(err),
    }
    INITIALISED.get_or_init(|| ());
    Ok(())
}

fn read_log_format() -> Result<LogFormat, LoggingError> {
    match env::var(LOG_FORMAT_ENV) {
        Ok(raw) => raw.parse(),
        Err(env::VarError::NotPresent) => Ok(LogFormat::default()),
        Err(source @ env::VarError::NotUnicode(_)) => Err(LoggingError::InvalidUnicode {
            name: LOG_FORMAT_ENV,
            source,
        }),
    }
}

fn choose_filter(directives: Option<&str>) -> FilterChoice {
    let Some(raw) = directives.filter(|raw| !raw.trim().is_empty()) else {
        return FilterChoice {
            filter: EnvFilter::new(DEFAULT_DIRECTIVES),
            rejected: None,
        };
    };
    match EnvFilter::try_new(raw) {
        Ok(filter) => FilterChoice {
            filter,
            rejected: None,
        },
        Err(err) => FilterChoice {
            filter: EnvFilter::new(DEFAULT_DIRECTIVES),
            rejected: Some(format!("{raw} ({err})")),
        },
    }
}

fn install_subscriber(format: LogFormat, choice: FilterChoice) -> Result<(), LoggingError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let fmt_layer = match format {
        LogFormat::Json => fmt_layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Human => fmt_layer.boxed(),
    };

    // Fails when another logger already owns the `log` slot; that one stays.
    let log_bridge = LogTracer::init().is_ok();

    tracing_subscriber::registry()
        .with(choice.filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|source| LoggingError::InstallFailed { source })?;

    if let Some(rejected) = choice.rejected {
        warn!(
            directives = %rejected,
            fallback = DEFAULT_DIRECTIVES,
            "ignoring invalid RUST_LOG"
        );
    }
    debug!(?format, log_bridge, "logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case("human", LogFormat::Human)]
    #[case("HUMAN", LogFormat::Human)]
    #[case(" json ", LogFormat::Json)]
    fn log_format_parses_supported_values(#[case] raw: &str, #[case] expected: LogFormat) {
        let format: LogFormat = raw.parse().expect("format must parse");
        assert_eq!(format, expected);
    }

    #[rstest]
    #[case("xml")]
    #[case("")]
    fn log_format_rejects_unknown_values(#[case] raw: &str) {
        let err = raw.parse::<LogFormat>().expect_err("value is not supported");
        match err {
            LoggingError::UnsupportedFormat { provided } => assert_eq!(provided, raw),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    #[case::unset(None)]
    #[case::blank(Some("  "))]
    fn missing_directives_use_the_default(#[case] directives: Option<&str>) {
        let choice = choose_filter(directives);
        assert!(choice.rejected.is_none());
        assert_eq!(choice.filter.to_string(), EnvFilter::new(DEFAULT_DIRECTIVES).to_string());
    }

    #[rstest]
    fn valid_directives_are_kept() {
        let choice = choose_filter(Some("resource_report_pdf=trace"));
        assert!(choice.rejected.is_none());
        let rendered = choice.filter.to_string();
        assert!(rendered.contains("resource_report_pdf=trace"), "{rendered}");
    }

    #[rstest]
    fn invalid_directives_fall_back_and_are_reported() {
        let choice = choose_filter(Some("resource_report=loud"));
        let rejected = choice.rejected.expect("directives must be rejected");
        assert!(rejected.starts_with("resource_report=loud"), "{rejected}");
        assert_eq!(choice.filter.to_string(), EnvFilter::new(DEFAULT_DIRECTIVES).to_string());
    }

    #[test]
    fn init_logging_is_idempotent() {
        init_logging().expect("logging must initialise");
        init_logging().expect("subsequent calls must be no-ops");
    }
}

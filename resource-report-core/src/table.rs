//! In-memory metrics table loaded from a delimited log.
//!
//! The table is column-major: each header name owns a vector of `f64`
//! samples, and the `timestamp_ms` column is additionally kept as integers
//! together with its derived seconds series. Nothing mutates a table after
//! [`MetricsTable::try_from_reader`] returns.

use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufReader},
    path::Path,
};

use tracing::{Span, debug, field, instrument};

use crate::error::{DataFormatError, Result};

/// Name of the column every metrics log must carry.
pub const TIMESTAMP_COLUMN: &str = "timestamp_ms";

const FALLBACK_TABLE_NAME: &str = "metrics";

/// Opaque reference to a column of a [`MetricsTable`].
///
/// Handles are produced by [`MetricsTable::column`] and by the schema
/// classifier, and stay valid for the table they were resolved against.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ColumnHandle(usize);

impl ColumnHandle {
    /// Returns the position of the column in header order.
    #[must_use]
    pub const fn position(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    values: Vec<f64>,
}

/// Time-indexed metrics table.
///
/// # Examples
/// ```
/// use resource_report_core::MetricsTable;
///
/// let csv = "timestamp_ms,cpu0_usage,ram_kib\n0,12.5,1024\n1500,50,2048\n";
/// let table = MetricsTable::try_from_reader("demo", csv.as_bytes())?;
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.seconds(), [0.0, 1.5]);
/// assert_eq!(table.column_names().collect::<Vec<_>>(), ["timestamp_ms", "cpu0_usage", "ram_kib"]);
/// # Ok::<(), resource_report_core::DataFormatError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MetricsTable {
    name: String,
    columns: Vec<Column>,
    timestamps_ms: Vec<u64>,
    seconds: Vec<f64>,
}

impl MetricsTable {
    /// Loads a table from a CSV file on disk. The table is named after the
    /// file stem.
    ///
    /// # Errors
    /// Returns [`DataFormatError::Io`] when the file cannot be opened, and
    /// any error of [`MetricsTable::try_from_reader`] for its contents.
    #[instrument(name = "table.open", err, fields(path = %path.display()))]
    pub fn try_from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| DataFormatError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::try_from_reader(derive_table_name(path), BufReader::new(file))
    }

    /// Loads a table from any reader producing CSV text with a header row.
    ///
    /// # Errors
    /// Returns [`DataFormatError::MissingColumn`] when `timestamp_ms` is
    /// absent, [`DataFormatError::DuplicateColumn`] for repeated headers,
    /// [`DataFormatError::InvalidValue`] for cells that are not numbers,
    /// [`DataFormatError::NonMonotonicTimestamp`] when time goes backwards,
    /// and [`DataFormatError::Csv`] when the parser itself fails.
    #[instrument(
        name = "table.load",
        err,
        skip(name, reader),
        fields(table = field::Empty, rows = field::Empty, columns = field::Empty),
    )]
    pub fn try_from_reader<R: io::Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let table_name = name.into();
        let span = Span::current();
        span.record("table", field::display(&table_name));

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let header = csv_reader
            .headers()
            .map_err(|source| csv_failure(&table_name, source))?
            .clone();
        let mut columns: Vec<Column> = header
            .iter()
            .map(|header_name| Column {
                name: header_name.to_owned(),
                values: Vec::new(),
            })
            .collect();
        reject_duplicate_columns(&columns)?;
        let timestamp_position = columns
            .iter()
            .position(|column| column.name == TIMESTAMP_COLUMN)
            .ok_or_else(|| DataFormatError::MissingColumn {
                column: TIMESTAMP_COLUMN.to_owned(),
            })?;

        let mut timestamps_ms = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let cells = record.map_err(|source| csv_failure(&table_name, source))?;
            for (column, cell) in columns.iter_mut().zip(cells.iter()) {
                column.values.push(parse_value(row, &column.name, cell)?);
            }
            let raw_timestamp = cells.get(timestamp_position).unwrap_or_default();
            let timestamp = parse_timestamp(row, raw_timestamp)?;
            if let Some(&previous) = timestamps_ms.last()
                && timestamp < previous
            {
                return Err(DataFormatError::NonMonotonicTimestamp {
                    row,
                    previous,
                    current: timestamp,
                });
            }
            timestamps_ms.push(timestamp);
        }

        let seconds = timestamps_ms.iter().copied().map(millis_to_seconds).collect();
        span.record("rows", timestamps_ms.len());
        span.record("columns", columns.len());
        debug!(table = table_name.as_str(), "metrics table loaded");
        Ok(Self {
            name: table_name,
            columns,
            timestamps_ms,
            seconds,
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps_ms.len()
    }

    /// Returns whether the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps_ms.is_empty()
    }

    /// Iterates over column names in header order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Resolves a column name to a handle.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<ColumnHandle> {
        self.columns
            .iter()
            .position(|column| column.name == name)
            .map(ColumnHandle)
    }

    /// Returns the name of the column behind `handle`.
    #[must_use]
    pub fn column_name(&self, handle: ColumnHandle) -> Option<&str> {
        self.columns
            .get(handle.0)
            .map(|column| column.name.as_str())
    }

    /// Returns the samples of the column behind `handle`, or an empty slice
    /// when the handle does not belong to this table.
    #[must_use]
    pub fn column_values(&self, handle: ColumnHandle) -> &[f64] {
        self.columns
            .get(handle.0)
            .map(|column| column.values.as_slice())
            .unwrap_or_default()
    }

    /// Returns the raw `timestamp_ms` samples.
    #[must_use]
    pub fn timestamps_ms(&self) -> &[u64] {
        &self.timestamps_ms
    }

    /// Returns the derived time axis in seconds.
    #[must_use]
    pub fn seconds(&self) -> &[f64] {
        &self.seconds
    }

    /// Returns the time covered by the log, in seconds.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "time span")]
    pub fn duration_seconds(&self) -> f64 {
        match (self.seconds.first(), self.seconds.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    pub(crate) fn handles(&self) -> impl Iterator<Item = (ColumnHandle, &str)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(position, column)| (ColumnHandle(position), column.name.as_str()))
    }
}

fn reject_duplicate_columns(columns: &[Column]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for column in columns {
        if !seen.insert(column.name.as_str()) {
            return Err(DataFormatError::DuplicateColumn {
                column: column.name.clone(),
            });
        }
    }
    Ok(())
}

fn parse_value(row: usize, column: &str, cell: &str) -> Result<f64> {
    cell.parse::<f64>()
        .map_err(|_| DataFormatError::InvalidValue {
            row,
            column: column.to_owned(),
            value: cell.to_owned(),
        })
}

fn parse_timestamp(row: usize, cell: &str) -> Result<u64> {
    cell.parse::<u64>()
        .map_err(|_| DataFormatError::InvalidValue {
            row,
            column: TIMESTAMP_COLUMN.to_owned(),
            value: cell.to_owned(),
        })
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "millisecond timestamps stay far below 2^53"
)]
pub(crate) fn millis_to_seconds(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

fn csv_failure(table: &str, source: csv::Error) -> DataFormatError {
    DataFormatError::Csv {
        table: table.to_owned(),
        source,
    }
}

fn derive_table_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|value| value.to_str())
        .map_or_else(|| FALLBACK_TABLE_NAME.to_owned(), ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn load(csv: &str) -> Result<MetricsTable> {
        MetricsTable::try_from_reader("test", csv.as_bytes())
    }

    #[rstest]
    #[case(0, 0.0)]
    #[case(1500, 1.5)]
    #[case(250, 0.25)]
    #[case(60_000, 60.0)]
    fn millis_to_seconds_divides_by_a_thousand(#[case] millis: u64, #[case] expected: f64) {
        assert_eq!(millis_to_seconds(millis), expected);
    }

    #[rstest]
    fn seconds_column_is_derived_from_timestamps() -> Result<()> {
        let table = load("timestamp_ms,ram_kib\n0,1\n1500,2\n3000,3\n")?;
        assert_eq!(table.timestamps_ms(), [0, 1500, 3000]);
        assert_eq!(table.seconds(), [0.0, 1.5, 3.0]);
        assert_eq!(table.duration_seconds(), 3.0);
        Ok(())
    }

    #[rstest]
    fn cells_and_headers_are_trimmed() -> Result<()> {
        let table = load(" timestamp_ms , cpu0_usage \n 10 , 42.5 \n")?;
        let handle = table.column("cpu0_usage").expect("trimmed header must resolve");
        assert_eq!(table.column_values(handle), [42.5]);
        Ok(())
    }

    #[rstest]
    fn header_only_table_is_empty() -> Result<()> {
        let table = load("timestamp_ms,cpu0_usage\n")?;
        assert!(table.is_empty());
        assert_eq!(table.duration_seconds(), 0.0);
        Ok(())
    }

    #[rstest]
    #[case::no_timestamp("cpu0_usage,ram_kib\n1,2\n")]
    #[case::empty_input("")]
    fn missing_timestamp_column_is_rejected(#[case] csv: &str) {
        let err = load(csv).expect_err("timestamp_ms is required");
        assert!(matches!(
            err,
            DataFormatError::MissingColumn { ref column } if column == TIMESTAMP_COLUMN
        ));
    }

    #[rstest]
    fn duplicate_columns_are_rejected() {
        let err = load("timestamp_ms,cpu0_usage,cpu0_usage\n0,1,2\n").expect_err("duplicate");
        assert!(matches!(err, DataFormatError::DuplicateColumn { ref column } if column == "cpu0_usage"));
    }

    #[rstest]
    #[case::word("timestamp_ms,cpu0_usage\n0,busy\n", 0, "cpu0_usage", "busy")]
    #[case::empty_cell("timestamp_ms,cpu0_usage\n0,1\n5,\n", 1, "cpu0_usage", "")]
    #[case::fractional_timestamp("timestamp_ms,cpu0_usage\n0.5,1\n", 0, "timestamp_ms", "0.5")]
    #[case::negative_timestamp("timestamp_ms,cpu0_usage\n-1,1\n", 0, "timestamp_ms", "-1")]
    fn unparsable_cells_report_position(
        #[case] csv: &str,
        #[case] expected_row: usize,
        #[case] expected_column: &str,
        #[case] expected_value: &str,
    ) {
        let err = load(csv).expect_err("invalid cell must fail");
        match err {
            DataFormatError::InvalidValue { row, column, value } => {
                assert_eq!(row, expected_row);
                assert_eq!(column, expected_column);
                assert_eq!(value, expected_value);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn decreasing_timestamps_are_rejected() {
        let err = load("timestamp_ms\n0\n100\n50\n").expect_err("time must not go backwards");
        assert!(matches!(
            err,
            DataFormatError::NonMonotonicTimestamp {
                row: 2,
                previous: 100,
                current: 50
            }
        ));
    }

    #[rstest]
    fn repeated_timestamps_are_accepted() -> Result<()> {
        let table = load("timestamp_ms\n0\n0\n10\n")?;
        assert_eq!(table.len(), 3);
        Ok(())
    }

    #[rstest]
    fn ragged_rows_surface_parser_errors() {
        let err = load("timestamp_ms,cpu0_usage\n0,1\n5\n").expect_err("short row must fail");
        assert!(matches!(err, DataFormatError::Csv { ref table, .. } if table == "test"));
    }

    #[rstest]
    fn foreign_handles_yield_no_values() -> Result<()> {
        let table = load("timestamp_ms\n0\n")?;
        assert!(table.column_values(ColumnHandle(7)).is_empty());
        assert_eq!(table.column_name(ColumnHandle(7)), None);
        Ok(())
    }

    #[rstest]
    #[case::stem("/tmp/run_01.csv", "run_01")]
    #[case::no_extension("/tmp/run_02", "run_02")]
    #[case::missing_stem("", "metrics")]
    fn derive_table_name_uses_file_stem(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(derive_table_name(Path::new(raw)), expected);
    }
}

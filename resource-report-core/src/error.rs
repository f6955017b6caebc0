//! Error types for the resource report core library.
//!
//! Every failure to turn a metrics log into a renderable schema is a
//! [`DataFormatError`]. Each variant maps to a stable [`DataFormatErrorCode`]
//! so the CLI can attach a machine-readable code to its diagnostics.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::schema::GpuIndex;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// An error produced while loading or classifying a metrics log.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DataFormatError {
    /// The metrics file could not be opened or read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The delimited parser rejected the input.
    #[error("malformed metrics table `{table}`: {source}")]
    Csv {
        /// Name of the table being loaded.
        table: String,
        /// Underlying parser failure.
        #[source]
        source: csv::Error,
    },
    /// A column required to build the report is absent.
    #[error("metrics table is missing required column `{column}`")]
    MissingColumn {
        /// Name of the missing column.
        column: String,
    },
    /// The header row names the same column twice.
    #[error("metrics table declares column `{column}` more than once")]
    DuplicateColumn {
        /// Name of the repeated column.
        column: String,
    },
    /// A cell could not be parsed as a number.
    #[error("row {row}, column `{column}`: `{value}` is not a valid number")]
    InvalidValue {
        /// Zero-based data row (the header is not counted).
        row: usize,
        /// Column holding the offending cell.
        column: String,
        /// Raw cell contents.
        value: String,
    },
    /// `timestamp_ms` went backwards between two consecutive rows.
    #[error("timestamp_ms decreases at row {row}: {previous} then {current}")]
    NonMonotonicTimestamp {
        /// Zero-based data row holding the smaller timestamp.
        row: usize,
        /// Timestamp of the preceding row.
        previous: u64,
        /// Timestamp of the offending row.
        current: u64,
    },
    /// A GPU index was discovered but not every field column is present.
    #[error("GPU {gpu} is missing columns: {}", .missing.join(", "))]
    IncompleteGpu {
        /// GPU index derived from the column names.
        gpu: GpuIndex,
        /// Expected column names that were not found, in field order.
        missing: Vec<String>,
    },
}

define_error_codes! {
    /// Stable codes describing [`DataFormatError`] variants.
    enum DataFormatErrorCode for DataFormatError {
        /// The metrics file could not be opened or read.
        Io => Io { .. } => "DATA_FORMAT_IO",
        /// The delimited parser rejected the input.
        Csv => Csv { .. } => "DATA_FORMAT_CSV",
        /// A column required to build the report is absent.
        MissingColumn => MissingColumn { .. } => "DATA_FORMAT_MISSING_COLUMN",
        /// The header row names the same column twice.
        DuplicateColumn => DuplicateColumn { .. } => "DATA_FORMAT_DUPLICATE_COLUMN",
        /// A cell could not be parsed as a number.
        InvalidValue => InvalidValue { .. } => "DATA_FORMAT_INVALID_VALUE",
        /// `timestamp_ms` went backwards between two consecutive rows.
        NonMonotonicTimestamp => NonMonotonicTimestamp { .. } => "DATA_FORMAT_NON_MONOTONIC_TIMESTAMP",
        /// A GPU index was discovered but not every field column is present.
        IncompleteGpu => IncompleteGpu { .. } => "DATA_FORMAT_INCOMPLETE_GPU",
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, DataFormatError>;

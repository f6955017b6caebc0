//! Core library for turning resource-metrics logs into chart page plans.
//!
//! The pipeline is linear: [`MetricsTable`] loads the delimited log,
//! [`MetricSchema::classify`] resolves the column naming convention into
//! typed handles, and [`ReportPlan::from_schema`] lays out the pages a
//! renderer draws.

mod error;
mod plan;
mod schema;
mod table;

pub use crate::{
    error::{DataFormatError, DataFormatErrorCode, Result},
    plan::{PageKind, PageSize, PageSpec, ReportPlan, Scale, SeriesSpec, TIME_AXIS_LABEL},
    schema::{
        CpuColumn, GpuColumns, GpuField, GpuIndex, MetricSchema, RAM_COLUMN, RAM_COLUMN_ALIAS,
        RamColumn,
    },
    table::{ColumnHandle, MetricsTable, TIMESTAMP_COLUMN},
};

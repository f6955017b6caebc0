//! Typed schema resolved from metrics column names.
//!
//! Column discovery happens exactly once: [`MetricSchema::classify`] maps the
//! naming convention (`cpu<N>_usage`, `ram_kib`, `gpu<G>_<field>`) onto
//! [`ColumnHandle`]s so rendering never has to match strings again.

use std::collections::BTreeMap;

use tracing::{Span, debug, field, instrument};

use crate::{
    error::{DataFormatError, Result},
    table::{ColumnHandle, MetricsTable},
};

/// Identifier distinguishing GPUs recorded in the same log.
pub type GpuIndex = u32;

/// Resident memory column written in KiB.
pub const RAM_COLUMN: &str = "ram_kib";

/// Spelling of [`RAM_COLUMN`] used by the metrics recorder.
pub const RAM_COLUMN_ALIAS: &str = "ram_kb";

const CPU_PREFIX: &str = "cpu";
const CPU_SUFFIX: &str = "_usage";
const GPU_PREFIX: &str = "gpu";

/// Per-GPU metric recorded under `gpu<G>_<suffix>`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum GpuField {
    /// SM compute utilization (%).
    Util,
    /// Memory controller utilization (%).
    Mem,
    /// Video encoder utilization (%).
    EncUtil,
    /// Video decoder utilization (%).
    DecUtil,
    /// Graphics clock (MHz).
    GpuClock,
    /// Memory clock (MHz).
    MemClock,
    /// SM clock (MHz).
    SmClock,
    /// Video clock (MHz).
    VidClock,
    /// Core temperature (°C).
    Temp,
    /// Power draw.
    Power,
}

impl GpuField {
    /// Number of fields each GPU must provide.
    pub const COUNT: usize = 10;

    /// Every field, in column-slot order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Util,
        Self::Mem,
        Self::EncUtil,
        Self::DecUtil,
        Self::GpuClock,
        Self::MemClock,
        Self::SmClock,
        Self::VidClock,
        Self::Temp,
        Self::Power,
    ];

    /// Utilization percentages overlaid on one page.
    pub const UTILIZATION: [Self; 4] = [Self::Util, Self::Mem, Self::EncUtil, Self::DecUtil];

    /// Clock rates overlaid on one page.
    pub const CLOCKS: [Self; 4] = [Self::GpuClock, Self::MemClock, Self::SmClock, Self::VidClock];

    /// Returns the column-name suffix following `gpu<G>_`.
    ///
    /// # Examples
    /// ```
    /// use resource_report_core::GpuField;
    ///
    /// assert_eq!(GpuField::EncUtil.suffix(), "enc_util");
    /// assert_eq!(GpuField::from_suffix("sm_clock"), Some(GpuField::SmClock));
    /// assert_eq!(GpuField::Temp.column_name(3), "gpu3_temp");
    /// ```
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Util => "util",
            Self::Mem => "mem",
            Self::EncUtil => "enc_util",
            Self::DecUtil => "dec_util",
            Self::GpuClock => "gpu_clock",
            Self::MemClock => "mem_clock",
            Self::SmClock => "sm_clock",
            Self::VidClock => "vid_clock",
            Self::Temp => "temp",
            Self::Power => "power",
        }
    }

    /// Parses a column-name suffix.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.suffix() == suffix)
    }

    /// Returns the full column name of this field for `gpu`.
    #[must_use]
    pub fn column_name(self, gpu: GpuIndex) -> String {
        format!("{GPU_PREFIX}{gpu}_{}", self.suffix())
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

/// Per-core CPU usage column.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CpuColumn {
    name: String,
    handle: ColumnHandle,
}

impl CpuColumn {
    /// Returns the column name, used as the legend label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolved column handle.
    #[must_use]
    pub const fn handle(&self) -> ColumnHandle {
        self.handle
    }
}

/// Resident memory column, in KiB.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RamColumn {
    name: String,
    handle: ColumnHandle,
}

impl RamColumn {
    /// Returns the column name that was matched (`ram_kib` or its alias).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolved column handle.
    #[must_use]
    pub const fn handle(&self) -> ColumnHandle {
        self.handle
    }
}

/// All field columns of one GPU.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GpuColumns {
    index: GpuIndex,
    handles: [ColumnHandle; GpuField::COUNT],
}

impl GpuColumns {
    /// Returns the GPU index.
    #[must_use]
    pub const fn index(&self) -> GpuIndex {
        self.index
    }

    /// Returns the column holding `field` for this GPU.
    #[must_use]
    pub const fn handle(&self, field: GpuField) -> ColumnHandle {
        self.handles[field.slot()]
    }
}

/// Typed view of the metrics a table provides.
///
/// # Examples
/// ```
/// use resource_report_core::{MetricSchema, MetricsTable};
///
/// let csv = "timestamp_ms,cpu0_usage,cpu1_usage,ram_kib\n0,1,2,3\n";
/// let table = MetricsTable::try_from_reader("demo", csv.as_bytes())?;
/// let schema = MetricSchema::classify(&table)?;
/// assert_eq!(schema.cpu_cores().len(), 2);
/// assert_eq!(schema.ram().name(), "ram_kib");
/// assert!(schema.gpus().is_empty());
/// # Ok::<(), resource_report_core::DataFormatError>(())
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetricSchema {
    cpu_cores: Vec<CpuColumn>,
    ram: RamColumn,
    gpus: Vec<GpuColumns>,
}

impl MetricSchema {
    /// Classifies the columns of `table`.
    ///
    /// CPU columns keep table order; GPUs are sorted by ascending index.
    ///
    /// # Errors
    /// Returns [`DataFormatError::MissingColumn`] when no RAM column exists
    /// and [`DataFormatError::IncompleteGpu`] when a discovered GPU lacks any
    /// of its [`GpuField`] columns.
    #[instrument(
        name = "schema.classify",
        err,
        skip(table),
        fields(table = table.name(), cpu_cores = field::Empty, gpus = field::Empty),
    )]
    pub fn classify(table: &MetricsTable) -> Result<Self> {
        let cpu_cores: Vec<CpuColumn> = table
            .handles()
            .filter(|(_, name)| is_cpu_usage_column(name))
            .map(|(handle, name)| CpuColumn {
                name: name.to_owned(),
                handle,
            })
            .collect();
        let ram = resolve_ram(table)?;
        let gpus = resolve_gpus(table)?;

        let span = Span::current();
        span.record("cpu_cores", cpu_cores.len());
        span.record("gpus", gpus.len());
        Ok(Self {
            cpu_cores,
            ram,
            gpus,
        })
    }

    /// Returns CPU usage columns in table order.
    #[must_use]
    pub fn cpu_cores(&self) -> &[CpuColumn] {
        &self.cpu_cores
    }

    /// Returns the RAM column.
    #[must_use]
    pub const fn ram(&self) -> &RamColumn {
        &self.ram
    }

    /// Returns GPU column groups in ascending index order.
    #[must_use]
    pub fn gpus(&self) -> &[GpuColumns] {
        &self.gpus
    }

    /// Iterates over GPU indices in ascending order.
    pub fn gpu_indices(&self) -> impl Iterator<Item = GpuIndex> + '_ {
        self.gpus.iter().map(GpuColumns::index)
    }
}

fn is_cpu_usage_column(name: &str) -> bool {
    name.starts_with(CPU_PREFIX) && name.ends_with(CPU_SUFFIX)
}

fn resolve_ram(table: &MetricsTable) -> Result<RamColumn> {
    [RAM_COLUMN, RAM_COLUMN_ALIAS]
        .into_iter()
        .find_map(|name| {
            table.column(name).map(|handle| RamColumn {
                name: name.to_owned(),
                handle,
            })
        })
        .ok_or_else(|| DataFormatError::MissingColumn {
            column: RAM_COLUMN.to_owned(),
        })
}

/// Splits `gpu<digits>_<suffix>` into its index and suffix.
pub(crate) fn parse_gpu_column(name: &str) -> Option<(GpuIndex, &str)> {
    let rest = name.strip_prefix(GPU_PREFIX)?;
    let (digits, suffix) = rest.split_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let index = digits.parse::<GpuIndex>().ok()?;
    Some((index, suffix))
}

fn resolve_gpus(table: &MetricsTable) -> Result<Vec<GpuColumns>> {
    let mut discovered: BTreeMap<GpuIndex, [Option<ColumnHandle>; GpuField::COUNT]> =
        BTreeMap::new();
    for (handle, name) in table.handles() {
        let Some((gpu, suffix)) = parse_gpu_column(name) else {
            continue;
        };
        let slots = discovered.entry(gpu).or_insert([None; GpuField::COUNT]);
        match GpuField::from_suffix(suffix) {
            Some(gpu_field) => {
                if let Some(slot) = slots.get_mut(gpu_field.slot()) {
                    *slot = Some(handle);
                }
            }
            None => debug!(column = name, gpu, "ignoring unknown GPU field"),
        }
    }

    discovered
        .into_iter()
        .map(|(gpu, slots)| complete_gpu(gpu, &slots))
        .collect()
}

fn complete_gpu(
    gpu: GpuIndex,
    slots: &[Option<ColumnHandle>; GpuField::COUNT],
) -> Result<GpuColumns> {
    let resolved: Vec<ColumnHandle> = slots.iter().flatten().copied().collect();
    <[ColumnHandle; GpuField::COUNT]>::try_from(resolved)
        .map(|handles| GpuColumns {
            index: gpu,
            handles,
        })
        .map_err(|_| DataFormatError::IncompleteGpu {
            gpu,
            missing: GpuField::ALL
                .into_iter()
                .zip(slots)
                .filter(|(_, slot)| slot.is_none())
                .map(|(gpu_field, _)| gpu_field.column_name(gpu))
                .collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn gpu_header(gpu: GpuIndex) -> String {
        GpuField::ALL
            .iter()
            .map(|gpu_field| gpu_field.column_name(gpu))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn classify(header: &str) -> Result<MetricSchema> {
        let cells = header.split(',').map(|_| "0").collect::<Vec<_>>().join(",");
        let csv = format!("{header}\n{cells}\n");
        let table = MetricsTable::try_from_reader("test", csv.as_bytes())?;
        MetricSchema::classify(&table)
    }

    #[rstest]
    #[case::plain("gpu0_util", Some((0, "util")))]
    #[case::multi_digit("gpu12_enc_util", Some((12, "enc_util")))]
    #[case::unknown_field("gpu3_fan", Some((3, "fan")))]
    #[case::no_digits("gpu_total", None)]
    #[case::letters("gpux_util", None)]
    #[case::no_underscore("gpu0", None)]
    #[case::signed("gpu+1_util", None)]
    #[case::other_prefix("ram_kib", None)]
    fn parse_gpu_column_extracts_index(
        #[case] name: &str,
        #[case] expected: Option<(GpuIndex, &str)>,
    ) {
        assert_eq!(parse_gpu_column(name), expected);
    }

    #[rstest]
    fn cpu_columns_keep_table_order() -> Result<()> {
        let schema = classify("timestamp_ms,cpu3_usage,cpu_user_ms,cpu0_usage,cpu_sys_ms,ram_kib")?;
        let names: Vec<&str> = schema.cpu_cores().iter().map(CpuColumn::name).collect();
        assert_eq!(names, ["cpu3_usage", "cpu0_usage"]);
        Ok(())
    }

    #[rstest]
    fn gpu_indices_are_sorted_numerically() -> Result<()> {
        let header = format!(
            "timestamp_ms,ram_kib,{},{},{}",
            gpu_header(10),
            gpu_header(2),
            gpu_header(0)
        );
        let schema = classify(&header)?;
        assert_eq!(schema.gpu_indices().collect::<Vec<_>>(), [0, 2, 10]);
        Ok(())
    }

    #[rstest]
    fn gpu_handles_resolve_to_their_columns() -> Result<()> {
        let csv = format!("timestamp_ms,ram_kib,{}\n0,0,1,2,3,4,5,6,7,8,9,10\n", gpu_header(1));
        let table = MetricsTable::try_from_reader("test", csv.as_bytes())?;
        let schema = MetricSchema::classify(&table)?;
        let gpu = schema.gpus().first().expect("one GPU must be discovered");
        assert_eq!(gpu.index(), 1);
        assert_eq!(table.column_values(gpu.handle(GpuField::Util)), [1.0]);
        assert_eq!(table.column_values(gpu.handle(GpuField::Temp)), [9.0]);
        assert_eq!(
            table.column_name(gpu.handle(GpuField::VidClock)),
            Some("gpu1_vid_clock")
        );
        Ok(())
    }

    #[rstest]
    fn incomplete_gpu_lists_missing_columns() {
        let err = classify("timestamp_ms,ram_kib,gpu4_util,gpu4_temp").expect_err("gpu4 is incomplete");
        match err {
            DataFormatError::IncompleteGpu { gpu, missing } => {
                assert_eq!(gpu, 4);
                assert_eq!(missing.len(), GpuField::COUNT - 2);
                assert_eq!(missing.first().map(String::as_str), Some("gpu4_mem"));
                assert!(!missing.iter().any(|name| name == "gpu4_temp"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn unknown_gpu_field_alone_declares_an_incomplete_gpu() {
        let err = classify("timestamp_ms,ram_kib,gpu0_fan").expect_err("gpu0 has no known field");
        assert!(matches!(err, DataFormatError::IncompleteGpu { gpu: 0, .. }));
    }

    #[rstest]
    fn unknown_gpu_fields_are_ignored_when_complete() -> Result<()> {
        let header = format!("timestamp_ms,ram_kib,{},gpu0_fan", gpu_header(0));
        let schema = classify(&header)?;
        assert_eq!(schema.gpus().len(), 1);
        Ok(())
    }

    #[rstest]
    #[case::canonical("timestamp_ms,ram_kib", "ram_kib")]
    #[case::recorder_alias("timestamp_ms,ram_kb", "ram_kb")]
    #[case::canonical_wins("timestamp_ms,ram_kb,ram_kib", "ram_kib")]
    fn ram_column_accepts_alias(#[case] header: &str, #[case] expected: &str) -> Result<()> {
        let schema = classify(header)?;
        assert_eq!(schema.ram().name(), expected);
        Ok(())
    }

    #[rstest]
    fn missing_ram_column_is_rejected() {
        let err = classify("timestamp_ms,cpu0_usage").expect_err("RAM is required");
        assert!(matches!(
            err,
            DataFormatError::MissingColumn { ref column } if column == RAM_COLUMN
        ));
    }
}

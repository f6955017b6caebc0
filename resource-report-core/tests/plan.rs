//! Page-plan properties over synthetic metrics logs.

use resource_report_core::{
    DataFormatError, GpuField, MetricSchema, MetricsTable, PageKind, ReportPlan, Scale,
};
use resource_report_test_support::{
    fixtures::{self, MetricsCsv},
    tracing::capture,
};
use rstest::rstest;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn load(csv: &MetricsCsv) -> Result<MetricsTable, Box<dyn std::error::Error>> {
    let bytes = csv.to_bytes()?;
    Ok(MetricsTable::try_from_reader("fixture", bytes.as_slice())?)
}

fn plan(table: &MetricsTable) -> Result<ReportPlan, DataFormatError> {
    Ok(ReportPlan::from_schema(&MetricSchema::classify(table)?))
}

#[rstest]
#[case(1, vec![])]
#[case(4, vec![0])]
#[case(8, vec![1, 0])]
#[case(2, vec![7, 3, 12])]
fn page_count_is_two_plus_four_per_gpu(#[case] cores: usize, #[case] gpus: Vec<u32>) -> TestResult {
    let table = load(&MetricsCsv::new().cpu_cores(cores).gpus(gpus.clone()))?;
    let plan = plan(&table)?;
    assert_eq!(plan.len(), 2 + 4 * gpus.len());

    let cpu = plan.pages().first().expect("CPU page");
    assert_eq!(cpu.kind(), PageKind::CpuCores);
    assert_eq!(cpu.series().len(), cores);
    assert_eq!(plan.pages().get(1).map(|page| page.kind()), Some(PageKind::Ram));
    Ok(())
}

#[rstest]
fn gpu_pages_follow_ascending_index_in_fixed_order() -> TestResult {
    let table = load(&MetricsCsv::new().gpus([2, 0]))?;
    let kinds: Vec<PageKind> = plan(&table)?.pages().iter().map(|page| page.kind()).collect();
    assert_eq!(
        kinds,
        [
            PageKind::CpuCores,
            PageKind::Ram,
            PageKind::GpuUtilization(0),
            PageKind::GpuClocks(0),
            PageKind::GpuTemperature(0),
            PageKind::GpuPower(0),
            PageKind::GpuUtilization(2),
            PageKind::GpuClocks(2),
            PageKind::GpuTemperature(2),
            PageKind::GpuPower(2),
        ]
    );
    Ok(())
}

#[rstest]
fn single_gpu_three_has_a_temperature_page() -> TestResult {
    let table = load(&MetricsCsv::new().gpus([3]).rows(4))?;
    let plan = plan(&table)?;
    let page = plan
        .pages()
        .iter()
        .find(|page| page.kind() == PageKind::GpuTemperature(3))
        .expect("temperature page for GPU 3");
    assert_eq!(page.title(), "GPU 3 Temperature");
    assert_eq!(page.y_label(), "Temperature (°C)");
    assert_eq!(page.x_label(), "Time (s)");
    assert!(!page.legend());

    let series = page.series().first().expect("one temperature series");
    let temp_slot = GpuField::ALL
        .iter()
        .position(|field| *field == GpuField::Temp)
        .expect("temp is a GPU field");
    let expected: Vec<f64> = (0..4)
        .map(|row| fixtures::gpu_value(row, 3, temp_slot) as f64)
        .collect();
    assert_eq!(series.values(&table).collect::<Vec<_>>(), expected);
    Ok(())
}

#[rstest]
fn page_titles_name_the_gpu() -> TestResult {
    let table = load(&MetricsCsv::new().gpus([5]))?;
    let titles: Vec<String> = plan(&table)?
        .pages()
        .iter()
        .map(|page| page.title().to_owned())
        .collect();
    assert_eq!(
        titles,
        [
            "CPU Usage per Core",
            "RAM Usage Over Time",
            "GPU 5 SM compute, VRAM & Encoder/Decoder Utilization",
            "GPU 5 Clock Rates",
            "GPU 5 Temperature",
            "GPU 5 Power Consumption",
        ]
    );
    Ok(())
}

#[rstest]
fn legend_labels_match_the_series() -> TestResult {
    let table = load(&MetricsCsv::new().cpu_cores(2).gpus([0]))?;
    let plan = plan(&table)?;
    let labels = |index: usize| -> Vec<String> {
        plan.pages()
            .get(index)
            .map(|page| page.series().iter().map(|s| s.label().to_owned()).collect())
            .unwrap_or_default()
    };
    assert_eq!(labels(0), ["cpu0_usage", "cpu1_usage"]);
    assert_eq!(labels(2), ["GPU Util", "Mem Util", "Enc Util", "Dec Util"]);
    assert_eq!(labels(3), ["gpu_clock", "mem_clock", "sm_clock", "vid_clock"]);
    Ok(())
}

#[rstest]
fn ram_is_converted_to_mib_on_a_seconds_axis() -> TestResult {
    let table = load(&MetricsCsv::new().rows(2).interval_ms(1500).ram_column("ram_kb"))?;
    let plan = plan(&table)?;
    let ram = plan.pages().get(1).expect("RAM page");
    let series = ram.series().first().expect("RAM series");
    assert_eq!(series.scale(), Scale::KibToMib);
    assert_eq!(series.points(&table).collect::<Vec<_>>(), [(0.0, 2.0), (1.5, 4.0)]);
    Ok(())
}

#[rstest]
fn recorder_process_time_columns_are_not_plotted() -> TestResult {
    let csv = MetricsCsv::new()
        .cpu_cores(1)
        .extra_column("cpu_user_ms")
        .extra_column("cpu_sys_ms");
    let table = load(&csv)?;
    assert_eq!(table.column_names().count(), 5);
    let plan = plan(&table)?;
    assert_eq!(plan.pages().first().map(|page| page.series().len()), Some(1));
    Ok(())
}

#[rstest]
fn load_and_classify_are_instrumented() -> TestResult {
    let bytes = MetricsCsv::new().cpu_cores(3).gpus([1]).rows(5).to_bytes()?;
    let (result, layer) = capture(|| -> Result<MetricSchema, DataFormatError> {
        let table = MetricsTable::try_from_reader("traced", bytes.as_slice())?;
        MetricSchema::classify(&table)
    });
    result?;

    let load = layer.span("table.load").expect("table.load span");
    assert_eq!(load.field("rows"), Some("5"));
    let classify = layer.span("schema.classify").expect("schema.classify span");
    assert_eq!(classify.field("cpu_cores"), Some("3"));
    assert_eq!(classify.field("gpus"), Some("1"));
    Ok(())
}

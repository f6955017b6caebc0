//! Shared test utilities used across resource-report crates.

pub mod tracing {
    //! Recording layer utilities for capturing spans and events in tests.
    use std::{
        collections::HashMap,
        fmt,
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    };

    use tracing::{
        Event, Level, Subscriber,
        field::{Field, Visit},
        span::{Attributes, Id, Record},
    };
    use tracing_subscriber::{
        Layer, Registry, layer::Context, layer::SubscriberExt, registry::LookupSpan,
    };

    /// Layer that keeps every closed span and emitted event for later
    /// assertions.
    #[derive(Clone, Default)]
    pub struct RecordingLayer {
        spans: Arc<Mutex<Vec<SpanRecord>>>,
        events: Arc<Mutex<Vec<EventRecord>>>,
    }

    impl RecordingLayer {
        /// Returns closed spans in completion order.
        ///
        /// # Examples
        /// ```
        /// use resource_report_test_support::tracing::RecordingLayer;
        ///
        /// let layer = RecordingLayer::default();
        /// assert!(layer.spans().is_empty());
        /// ```
        #[must_use]
        pub fn spans(&self) -> Vec<SpanRecord> {
            lock(&self.spans).clone()
        }

        /// Returns emitted events in emission order.
        #[must_use]
        pub fn events(&self) -> Vec<EventRecord> {
            lock(&self.events).clone()
        }

        /// Returns the first closed span called `name`.
        #[must_use]
        pub fn span(&self, name: &str) -> Option<SpanRecord> {
            lock(&self.spans)
                .iter()
                .find(|span| span.name == name)
                .cloned()
        }

        /// Returns every closed span called `name`.
        #[must_use]
        pub fn spans_named(&self, name: &str) -> Vec<SpanRecord> {
            lock(&self.spans)
                .iter()
                .filter(|span| span.name == name)
                .cloned()
                .collect()
        }

        /// Returns events emitted at `level`.
        #[must_use]
        pub fn events_at(&self, level: Level) -> Vec<EventRecord> {
            lock(&self.events)
                .iter()
                .filter(|event| event.level == level)
                .cloned()
                .collect()
        }
    }

    /// Runs `body` with a fresh [`RecordingLayer`] as the thread's default
    /// subscriber and returns its result alongside the layer.
    ///
    /// # Examples
    /// ```
    /// use resource_report_test_support::tracing::capture;
    ///
    /// let ((), layer) = capture(|| {
    ///     let _span = tracing::info_span!("demo", answer = 42).entered();
    /// });
    /// let span = layer.span("demo").expect("span must be recorded");
    /// assert_eq!(span.fields.get("answer").map(String::as_str), Some("42"));
    /// ```
    pub fn capture<T>(body: impl FnOnce() -> T) -> (T, RecordingLayer) {
        let layer = RecordingLayer::default();
        let subscriber = Registry::default().with(layer.clone());
        let output = tracing::subscriber::with_default(subscriber, body);
        (output, layer)
    }

    /// A closed span and the fields recorded against it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SpanRecord {
        /// Span name from the callsite metadata.
        pub name: String,
        /// Fields recorded at creation or through `Span::record`.
        pub fields: HashMap<String, String>,
    }

    impl SpanRecord {
        /// Returns the recorded value of `field`, if any.
        #[must_use]
        pub fn field(&self, field: &str) -> Option<&str> {
            self.fields.get(field).map(String::as_str)
        }
    }

    /// An emitted event with its level, target and fields.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EventRecord {
        /// Event level.
        pub level: Level,
        /// Event target, usually the emitting module path.
        pub target: String,
        /// Structured fields including `message`.
        pub fields: HashMap<String, String>,
    }

    impl EventRecord {
        /// Returns the recorded value of `field`, if any.
        #[must_use]
        pub fn field(&self, field: &str) -> Option<&str> {
            self.fields.get(field).map(String::as_str)
        }
    }

    struct OpenSpan(SpanRecord);

    impl<S> Layer<S> for RecordingLayer
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(id) else {
                return;
            };
            let mut record = SpanRecord {
                name: attrs.metadata().name().to_owned(),
                fields: HashMap::new(),
            };
            attrs.record(&mut FieldRecorder(&mut record.fields));
            span.extensions_mut().insert(OpenSpan(record));
        }

        fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(id) else {
                return;
            };
            if let Some(OpenSpan(record)) = span.extensions_mut().get_mut::<OpenSpan>() {
                values.record(&mut FieldRecorder(&mut record.fields));
            }
        }

        fn on_close(&self, id: Id, ctx: Context<'_, S>) {
            let Some(span) = ctx.span(&id) else {
                return;
            };
            if let Some(OpenSpan(record)) = span.extensions_mut().remove::<OpenSpan>() {
                lock(&self.spans).push(record);
            }
        }

        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            event.record(&mut FieldRecorder(&mut fields));
            lock(&self.events).push(EventRecord {
                level: *event.metadata().level(),
                target: event.metadata().target().to_owned(),
                fields,
            });
        }
    }

    fn lock<T>(records: &Mutex<Vec<T>>) -> MutexGuard<'_, Vec<T>> {
        records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    struct FieldRecorder<'a>(&'a mut HashMap<String, String>);

    impl FieldRecorder<'_> {
        fn insert(&mut self, field: &Field, value: impl ToString) {
            self.0.insert(field.name().to_owned(), value.to_string());
        }
    }

    impl Visit for FieldRecorder<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.insert(field, format!("{value:?}"));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.insert(field, value);
        }

        fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
            self.insert(field, value);
        }

        fn record_bool(&mut self, field: &Field, value: bool) {
            self.insert(field, value);
        }

        fn record_i64(&mut self, field: &Field, value: i64) {
            self.insert(field, value);
        }

        fn record_u64(&mut self, field: &Field, value: u64) {
            self.insert(field, value);
        }

        fn record_f64(&mut self, field: &Field, value: f64) {
            self.insert(field, value);
        }
    }
}

pub mod fixtures {
    //! Builders for synthetic metrics logs.
    //!
    //! Values are deterministic functions of the row, core, GPU and field so
    //! tests can predict exactly what a loader or renderer sees.

    use std::path::{Path, PathBuf};

    /// Column suffixes every GPU provides, in canonical order.
    pub const GPU_FIELDS: [&str; 10] = [
        "util",
        "mem",
        "enc_util",
        "dec_util",
        "gpu_clock",
        "mem_clock",
        "sm_clock",
        "vid_clock",
        "temp",
        "power",
    ];

    /// Builder for a metrics CSV log.
    ///
    /// # Examples
    /// ```
    /// use resource_report_test_support::fixtures::MetricsCsv;
    ///
    /// let csv = MetricsCsv::new().cpu_cores(1).rows(2).to_string_lossy()?;
    /// assert_eq!(csv, "timestamp_ms,cpu0_usage,ram_kib\n0,0,2048\n500,7,4096\n");
    /// # Ok::<(), csv::Error>(())
    /// ```
    #[derive(Clone, Debug)]
    pub struct MetricsCsv {
        cpu_cores: usize,
        gpus: Vec<u32>,
        rows: usize,
        interval_ms: u64,
        ram_column: String,
        extra_columns: Vec<String>,
        omitted: Vec<String>,
    }

    impl Default for MetricsCsv {
        fn default() -> Self {
            Self {
                cpu_cores: 2,
                gpus: Vec::new(),
                rows: 3,
                interval_ms: 500,
                ram_column: "ram_kib".to_owned(),
                extra_columns: Vec::new(),
                omitted: Vec::new(),
            }
        }
    }

    impl MetricsCsv {
        /// Two cores, no GPUs, three rows sampled every 500 ms.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets the number of `cpu<N>_usage` columns.
        #[must_use]
        pub fn cpu_cores(mut self, cores: usize) -> Self {
            self.cpu_cores = cores;
            self
        }

        /// Adds a full set of columns for each GPU index, in the given order.
        #[must_use]
        pub fn gpus(mut self, gpus: impl IntoIterator<Item = u32>) -> Self {
            self.gpus = gpus.into_iter().collect();
            self
        }

        /// Sets the number of data rows.
        #[must_use]
        pub fn rows(mut self, rows: usize) -> Self {
            self.rows = rows;
            self
        }

        /// Sets the sampling interval.
        #[must_use]
        pub fn interval_ms(mut self, interval_ms: u64) -> Self {
            self.interval_ms = interval_ms;
            self
        }

        /// Renames the RAM column, e.g. to the recorder's `ram_kb`.
        #[must_use]
        pub fn ram_column(mut self, name: impl Into<String>) -> Self {
            self.ram_column = name.into();
            self
        }

        /// Appends a column holding the row number.
        #[must_use]
        pub fn extra_column(mut self, name: impl Into<String>) -> Self {
            self.extra_columns.push(name.into());
            self
        }

        /// Drops a column that would otherwise be written.
        #[must_use]
        pub fn without_column(mut self, name: impl Into<String>) -> Self {
            self.omitted.push(name.into());
            self
        }

        /// Returns the header row.
        #[must_use]
        pub fn header(&self) -> Vec<String> {
            self.columns().into_iter().map(|(name, _)| name).collect()
        }

        /// Serializes the log into CSV bytes.
        ///
        /// # Errors
        /// Returns the writer's error if serialization fails.
        pub fn to_bytes(&self) -> csv::Result<Vec<u8>> {
            let mut writer = csv::Writer::from_writer(Vec::new());
            self.write(&mut writer)?;
            writer
                .into_inner()
                .map_err(|err| csv::Error::from(err.into_error()))
        }

        /// Serializes the log into a CSV string.
        ///
        /// # Errors
        /// Returns the writer's error if serialization fails.
        pub fn to_string_lossy(&self) -> csv::Result<String> {
            self.to_bytes()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        }

        /// Writes the log to `path`.
        ///
        /// # Errors
        /// Returns the writer's error if the file cannot be created or written.
        pub fn write_to(&self, path: &Path) -> csv::Result<()> {
            let mut writer = csv::Writer::from_path(path)?;
            self.write(&mut writer)?;
            writer.flush()?;
            Ok(())
        }

        /// Writes the log as `file_name` inside `dir` and returns the path.
        ///
        /// # Errors
        /// Returns the writer's error if the file cannot be created or written.
        pub fn write_into(&self, dir: &Path, file_name: &str) -> csv::Result<PathBuf> {
            let path = dir.join(file_name);
            self.write_to(&path)?;
            Ok(path)
        }

        fn write<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
            let columns = self.columns();
            writer.write_record(columns.iter().map(|(name, _)| name))?;
            for row in 0..self.rows {
                writer.write_record(columns.iter().map(|(_, cell)| cell.value(row)))?;
            }
            Ok(())
        }

        fn columns(&self) -> Vec<(String, Cell)> {
            let mut columns = vec![(
                "timestamp_ms".to_owned(),
                Cell::Timestamp(self.interval_ms),
            )];
            columns.extend((0..self.cpu_cores).map(|core| (format!("cpu{core}_usage"), Cell::Cpu(core))));
            columns.push((self.ram_column.clone(), Cell::Ram));
            for gpu in &self.gpus {
                columns.extend(GPU_FIELDS.iter().enumerate().map(|(slot, field)| {
                    (format!("gpu{gpu}_{field}"), Cell::Gpu { gpu: *gpu, slot })
                }));
            }
            columns.extend(
                self.extra_columns
                    .iter()
                    .map(|name| (name.clone(), Cell::RowNumber)),
            );
            columns.retain(|(name, _)| !self.omitted.contains(name));
            columns
        }
    }

    #[derive(Clone, Copy, Debug)]
    enum Cell {
        Timestamp(u64),
        Cpu(usize),
        Ram,
        Gpu { gpu: u32, slot: usize },
        RowNumber,
    }

    impl Cell {
        fn value(self, row: usize) -> String {
            match self {
                Self::Timestamp(interval) => (row as u64 * interval).to_string(),
                Self::Cpu(core) => cpu_usage(row, core).to_string(),
                Self::Ram => ram_kib(row).to_string(),
                Self::Gpu { gpu, slot } => gpu_value(row, gpu, slot).to_string(),
                Self::RowNumber => row.to_string(),
            }
        }
    }

    /// Usage percentage written for `core` at `row`.
    #[must_use]
    pub const fn cpu_usage(row: usize, core: usize) -> usize {
        (row * 7 + core * 13) % 100
    }

    /// RAM in KiB written at `row`: 2 MiB per elapsed sample.
    #[must_use]
    pub const fn ram_kib(row: usize) -> usize {
        2048 * (row + 1)
    }

    /// Value written for GPU field `slot` (index into [`GPU_FIELDS`]).
    #[must_use]
    pub const fn gpu_value(row: usize, gpu: u32, slot: usize) -> usize {
        slot * 10 + row + gpu as usize
    }
}

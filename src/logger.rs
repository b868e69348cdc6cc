use std::sync::{Arc, OnceLock};

use eyre::Context;
use log::{Level, LevelFilter, Log};

use crate::formatters::FormatterKind;
use crate::processors::{shared_chain, Processor};
use crate::record::{Record, Value};
use crate::settings::Settings;
use crate::sinks::{StdoutSink, WatchedFileSink};
use crate::LogSink;

/// Every record at or above this level reaches all three handlers.
const ROOT_LEVEL: LevelFilter = LevelFilter::Debug;

static PIPELINE: OnceLock<Arc<Pipeline>> = OnceLock::new();

/// The shared enrichment chain plus the three handlers it fans out to.
pub(crate) struct Pipeline {
    processors: Vec<Processor>,
    handlers: Vec<Box<dyn LogSink>>,
}

impl Pipeline {
    fn dispatch(&self, mut record: Record) {
        if record.level > ROOT_LEVEL {
            return;
        }

        for step in &self.processors {
            step(&mut record);
        }

        for handler in &self.handlers {
            // Write failures are dropped: logging never raises into the
            // code that logged.
            let _ = handler.write_log(&record);
        }
    }
}

/// Configure the process-wide logging pipeline.
///
/// Creates `logs_dir` if missing, opens `json.log` and `flat_line.log`
/// inside it, binds stdout to the console formatter and registers the
/// pipeline as the `log` facade's logger at minimum level debug. A
/// failure to create or open either log file aborts configuration.
///
/// Calling this a second time is a no-op: the already-installed handlers
/// stay, nothing is registered twice.
pub fn configure(settings: &Settings) -> eyre::Result<()> {
    if PIPELINE.get().is_some() {
        return Ok(());
    }

    std::fs::create_dir_all(&settings.logs_dir).with_context(|| {
        format!(
            "Failed creating logs directory {}",
            settings.logs_dir.display()
        )
    })?;

    let handlers: Vec<Box<dyn LogSink>> = vec![
        Box::new(StdoutSink::new(FormatterKind::Console.build(settings))),
        Box::new(WatchedFileSink::new(
            settings.logs_dir.join("json.log"),
            FormatterKind::Json.build(settings),
        )?),
        Box::new(WatchedFileSink::new(
            settings.logs_dir.join("flat_line.log"),
            FormatterKind::KeyValue.build(settings),
        )?),
    ];

    let pipeline = Arc::new(Pipeline {
        processors: shared_chain(),
        handlers,
    });

    if PIPELINE.set(pipeline.clone()).is_err() {
        return Ok(());
    }

    log::set_boxed_logger(Box::new(FacadeLogger(pipeline)))
        .context("Failed registering boxed logger")?;
    log::set_max_level(ROOT_LEVEL);

    Ok(())
}

pub(crate) fn dispatch(record: Record) {
    if let Some(pipeline) = PIPELINE.get() {
        pipeline.dispatch(record);
    }
}

/// Adapter that feeds `log` facade records into the pipeline.
struct FacadeLogger(Arc<Pipeline>);

impl Log for FacadeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= ROOT_LEVEL
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.0.dispatch(Record::from_facade(record));
        }
    }

    fn flush(&self) {
        for handler in &self.0.handlers {
            handler.flush();
        }
    }
}

/// Named logger carrying bound fields, the structured counterpart to the
/// `log` macros. Obtain one through [`logger!`](crate::logger!) so the
/// binding site's module path lands in the call-site fields.
#[derive(Debug, Clone)]
pub struct BoundLogger {
    name: String,
    module_path: &'static str,
    fields: Vec<(String, Value)>,
}

impl BoundLogger {
    pub fn new(name: impl Into<String>, module_path: &'static str) -> Self {
        Self {
            name: name.into(),
            module_path,
            fields: Vec::new(),
        }
    }

    /// Return a copy with one more bound field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    #[track_caller]
    pub fn trace(&self, event: &str) {
        self.emit(Level::Trace, event);
    }

    #[track_caller]
    pub fn debug(&self, event: &str) {
        self.emit(Level::Debug, event);
    }

    #[track_caller]
    pub fn info(&self, event: &str) {
        self.emit(Level::Info, event);
    }

    #[track_caller]
    pub fn warn(&self, event: &str) {
        self.emit(Level::Warn, event);
    }

    #[track_caller]
    pub fn error(&self, event: &str) {
        self.emit(Level::Error, event);
    }

    #[track_caller]
    fn emit(&self, level: Level, event: &str) {
        let location = std::panic::Location::caller();
        dispatch(self.build_record(level, event, location.line()));
    }

    fn build_record(&self, level: Level, event: &str, line: u32) -> Record {
        let mut record = Record::new(self.name.clone(), level);
        record.module_path = Some(self.module_path.to_string());
        record.line = Some(line);
        for (key, value) in &self.fields {
            record.fields.insert(key.clone(), value.clone());
        }
        // The call's event text wins over a bound `event` field.
        record
            .fields
            .insert("event".to_string(), Value::Str(event.to_string()));
        record
    }
}

/// Create a [`BoundLogger`] named after its argument and bound to the
/// current module path.
#[macro_export]
macro_rules! logger {
    ($name:expr) => {
        $crate::BoundLogger::new($name, module_path!())
    };
}

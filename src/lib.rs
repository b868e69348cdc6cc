//! Structured logging pipeline.
//!
//! [`configure`] wires a shared record-enrichment chain (ambient context,
//! thread-locals, timestamp, logger name, level, call-site, UTF-8
//! decoding) to the `log` facade and fans every record out to three
//! handlers: a console line on stdout, one JSON object per line in
//! `json.log`, and `key=value` tokens in `flat_line.log`. Records logged
//! through the `log` macros and through [`BoundLogger`] pass through the
//! same chain, so all sinks see field-consistent data.

pub mod context;
mod formatters;
mod logger;
mod processors;
mod record;
mod settings;
mod sinks;

pub use formatters::FormatterKind;
pub use logger::{configure, BoundLogger};
pub use record::{Record, Value};
pub use settings::Settings;

pub trait LogFormatter: Sync + Send {
    fn format(&self, record: &Record) -> String;
}

pub trait LogSink: Sync + Send {
    fn write_log(&self, record: &Record) -> eyre::Result<()>;
    fn flush(&self);
}

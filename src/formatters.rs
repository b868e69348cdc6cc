use yansi::Paint;

use crate::record::{Record, Value};
use crate::settings::Settings;
use crate::LogFormatter;

/// The three renderers this pipeline knows how to build. Explicit
/// enumeration, no runtime class lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterKind {
    Json,
    Console,
    KeyValue,
}

impl FormatterKind {
    pub fn build(self, settings: &Settings) -> Box<dyn LogFormatter> {
        match self {
            FormatterKind::Json => Box::new(JsonFormatter),
            FormatterKind::Console => Box::new(ConsoleFormatter {
                colors: settings.console_color_logs,
            }),
            FormatterKind::KeyValue => Box::new(KeyValueFormatter),
        }
    }
}

/// One JSON object per line, every enriched field included.
pub struct JsonFormatter;

impl LogFormatter for JsonFormatter {
    fn format(&self, record: &Record) -> String {
        let mut object = serde_json::Map::new();
        for (key, value) in &record.fields {
            object.insert(key.clone(), value.as_json());
        }
        serde_json::Value::Object(object).to_string()
    }
}

/// Human-readable line: timestamp, padded level, event, then the
/// remaining fields as key=value sorted by key.
pub struct ConsoleFormatter {
    colors: bool,
}

const LEADING: [&str; 3] = ["timestamp", "level", "event"];

impl ConsoleFormatter {
    fn paint_level(&self, level: &str) -> String {
        let padded = format!("{:<5}", level);
        if !self.colors {
            return format!("[{}]", padded);
        }

        let painted = match level {
            "error" => padded.red().bold().to_string(),
            "warn" => padded.yellow().bold().to_string(),
            "info" => padded.green().bold().to_string(),
            "debug" => padded.blue().bold().to_string(),
            _ => padded.dim().to_string(),
        };
        format!("[{}]", painted)
    }
}

impl LogFormatter for ConsoleFormatter {
    fn format(&self, record: &Record) -> String {
        let timestamp = field_text(record, "timestamp");
        let level = field_text(record, "level");
        let event = field_text(record, "event");

        let mut line = if self.colors {
            format!(
                "{} {} {}",
                timestamp.dim(),
                self.paint_level(&level),
                event.bold()
            )
        } else {
            format!("{} {} {}", timestamp, self.paint_level(&level), event)
        };

        for (key, value) in &record.fields {
            if LEADING.contains(&key.as_str()) {
                continue;
            }
            if self.colors {
                line.push_str(&format!(" {}={}", key.cyan(), value.render()));
            } else {
                line.push_str(&format!(" {}={}", key, value.render()));
            }
        }

        line
    }
}

/// `key=value` tokens with a fixed leading order: timestamp, level,
/// event, logger. Remaining fields follow sorted by key.
pub struct KeyValueFormatter;

const KEY_ORDER: [&str; 4] = ["timestamp", "level", "event", "logger"];

impl LogFormatter for KeyValueFormatter {
    fn format(&self, record: &Record) -> String {
        let mut tokens = Vec::with_capacity(record.fields.len());

        for key in KEY_ORDER {
            if let Some(value) = record.fields.get(key) {
                tokens.push(format!("{}={}", key, quote(&value.render())));
            }
        }

        for (key, value) in &record.fields {
            if KEY_ORDER.contains(&key.as_str()) {
                continue;
            }
            tokens.push(format!("{}={}", key, quote(&value.render())));
        }

        tokens.join(" ")
    }
}

fn field_text(record: &Record, key: &str) -> String {
    record
        .fields
        .get(key)
        .map(Value::render)
        .unwrap_or_default()
}

fn quote(text: &str) -> String {
    if text.is_empty() || text.contains(|c: char| c.is_whitespace() || c == '=') {
        format!("'{}'", text)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::shared_chain;
    use crate::record::Record;
    use log::Level;
    use std::path::PathBuf;

    fn enriched_record() -> Record {
        let mut record = Record::new("app.web", Level::Info);
        record.message = Some("started".to_string());
        record.module_path = Some("app::web".to_string());
        record.line = Some(42);
        record.fields.insert("count".to_string(), Value::Int(3));
        for step in shared_chain() {
            step(&mut record);
        }
        record
    }

    fn settings(colors: bool) -> Settings {
        Settings::new(PathBuf::from("/tmp"), colors)
    }

    #[test]
    fn json_line_is_valid_and_round_trips_fields() {
        let line = JsonFormatter.format(&enriched_record());
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "started");
        assert_eq!(parsed["count"], 3);
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["logger"], "app.web");
        assert_eq!(parsed["func_name"], "app::web");
        assert_eq!(parsed["lineno"], 42);
        assert!(parsed["timestamp"].is_string());
        assert!(!line.contains('\n'));
    }

    #[test]
    fn key_value_line_has_fixed_leading_order() {
        let line = KeyValueFormatter.format(&enriched_record());
        assert!(line.starts_with("timestamp="));
        let tail = line.split_once(" level=info event=started logger=app.web").unwrap().1;
        assert!(tail.contains("count=3"));
        assert!(tail.contains("func_name=app::web"));
        assert!(tail.contains("lineno=42"));
    }

    #[test]
    fn key_value_quotes_values_with_spaces() {
        assert_eq!(quote("two words"), "'two words'");
        assert_eq!(quote("started"), "started");
    }

    #[test]
    fn console_output_is_plain_when_colors_off() {
        let formatter = FormatterKind::Console.build(&settings(false));
        let line = formatter.format(&enriched_record());
        assert!(!line.contains("\x1b["));
        assert!(line.contains("started"));
        assert!(line.contains("count=3"));
        assert!(line.contains("[info ]"));
    }

    #[test]
    fn console_output_has_ansi_when_colors_on() {
        let formatter = ConsoleFormatter { colors: true };
        let line = formatter.format(&enriched_record());
        assert!(line.contains("\x1b["));
    }

    #[test]
    fn console_trailing_fields_are_sorted_by_key() {
        let mut record = enriched_record();
        record.fields.insert("alpha".to_string(), Value::Int(1));
        record.fields.insert("zulu".to_string(), Value::Int(2));
        let line = ConsoleFormatter { colors: false }.format(&record);
        let alpha = line.find("alpha=").unwrap();
        let count = line.find("count=").unwrap();
        let zulu = line.find("zulu=").unwrap();
        assert!(alpha < count && count < zulu);
    }
}

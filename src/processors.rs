//! The shared enrichment chain.
//!
//! Every record, whether it came through the `log` facade or a
//! [`BoundLogger`](crate::BoundLogger), runs through [`shared_chain`]
//! before any formatter sees it. Step order is an invariant: the legacy
//! message must be resolved before rendering, and byte decoding runs
//! last so it also covers values merged in from the ambient stores.

use chrono::{SecondsFormat, Utc};

use crate::context;
use crate::record::{Record, Value};

pub type Processor = fn(&mut Record);

pub fn shared_chain() -> Vec<Processor> {
    vec![
        merge_context,
        merge_threadlocal,
        add_timestamp,
        add_logger_name,
        add_log_level,
        resolve_legacy_message,
        add_callsite,
        decode_bytes,
    ]
}

/// Merge context variables bound for the current logical task. Fields
/// already on the record win over ambient ones.
fn merge_context(record: &mut Record) {
    for (key, value) in context::context_snapshot() {
        record.fields.entry(key).or_insert(value);
    }
}

fn merge_threadlocal(record: &mut Record) {
    for (key, value) in context::threadlocal_snapshot() {
        record.fields.entry(key).or_insert(value);
    }
}

fn add_timestamp(record: &mut Record) {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    record.fields.insert("timestamp".to_string(), Value::Str(now));
}

fn add_logger_name(record: &mut Record) {
    record
        .fields
        .insert("logger".to_string(), Value::Str(record.logger.clone()));
}

fn add_log_level(record: &mut Record) {
    let level = record.level.as_str().to_ascii_lowercase();
    record.fields.insert("level".to_string(), Value::Str(level));
}

/// Promote the facade message into the `event` field. Records from the
/// structured front-end set `event` directly and carry no message.
fn resolve_legacy_message(record: &mut Record) {
    if let Some(message) = record.message.take() {
        record
            .fields
            .entry("event".to_string())
            .or_insert(Value::Str(message));
    }
}

fn add_callsite(record: &mut Record) {
    if let Some(ref module_path) = record.module_path {
        record
            .fields
            .insert("func_name".to_string(), Value::Str(module_path.clone()));
    }
    if let Some(line) = record.line {
        record
            .fields
            .insert("lineno".to_string(), Value::Uint(u64::from(line)));
    }
}

fn decode_bytes(record: &mut Record) {
    for value in record.fields.values_mut() {
        if let Value::Bytes(bytes) = value {
            *value = Value::Str(String::from_utf8_lossy(bytes).into_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use log::Level;

    fn run_chain(record: &mut Record) {
        for step in shared_chain() {
            step(record);
        }
    }

    #[test]
    fn chain_attaches_all_enrichment_fields() {
        let mut record = Record::new("app.db", Level::Info);
        record.message = Some("connected".to_string());
        record.module_path = Some("app::db".to_string());
        record.line = Some(17);
        run_chain(&mut record);

        assert_eq!(record.fields["logger"], Value::Str("app.db".to_string()));
        assert_eq!(record.fields["level"], Value::Str("info".to_string()));
        assert_eq!(record.fields["event"], Value::Str("connected".to_string()));
        assert_eq!(record.fields["func_name"], Value::Str("app::db".to_string()));
        assert_eq!(record.fields["lineno"], Value::Uint(17));
        assert!(record.fields.contains_key("timestamp"));
    }

    #[test]
    fn timestamp_is_iso8601() {
        let mut record = Record::new("t", Level::Debug);
        add_timestamp(&mut record);
        let Value::Str(ts) = &record.fields["timestamp"] else {
            panic!("timestamp is not a string");
        };
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn explicit_fields_win_over_context() {
        let _guard = crate::context::bind("request_id", "ambient");
        let mut record = Record::new("t", Level::Info);
        record
            .fields
            .insert("request_id".to_string(), Value::Str("explicit".to_string()));
        merge_context(&mut record);
        assert_eq!(
            record.fields["request_id"],
            Value::Str("explicit".to_string())
        );
    }

    #[test]
    fn context_vars_are_merged() {
        let _a = crate::context::bind("request_id", "r-1");
        let _b = crate::context::bind("user_id", 9);
        let mut record = Record::new("t", Level::Info);
        merge_context(&mut record);
        assert_eq!(record.fields["request_id"], Value::Str("r-1".to_string()));
        assert_eq!(record.fields["user_id"], Value::Int(9));
    }

    #[test]
    fn threadlocal_vars_are_merged() {
        crate::context::bind_threadlocal("worker", "w-3");
        let mut record = Record::new("t", Level::Info);
        record
            .fields
            .insert("batch".to_string(), Value::Str("explicit".to_string()));
        crate::context::bind_threadlocal("batch", "ambient");
        merge_threadlocal(&mut record);
        crate::context::clear_threadlocal();

        assert_eq!(record.fields["worker"], Value::Str("w-3".to_string()));
        assert_eq!(record.fields["batch"], Value::Str("explicit".to_string()));
    }

    #[test]
    fn byte_fields_decode_to_utf8_text() {
        let mut record = Record::new("t", Level::Info);
        record
            .fields
            .insert("payload".to_string(), Value::Bytes(vec![0xc3, 0xa9]));
        decode_bytes(&mut record);
        assert_eq!(record.fields["payload"], Value::Str("é".to_string()));
    }

    #[test]
    fn invalid_bytes_are_replaced_not_dropped() {
        let mut record = Record::new("t", Level::Info);
        record
            .fields
            .insert("payload".to_string(), Value::Bytes(vec![0xff]));
        decode_bytes(&mut record);
        assert_eq!(record.fields["payload"], Value::Str("\u{fffd}".to_string()));
    }

    #[test]
    fn native_event_is_not_overwritten_by_message() {
        let mut record = Record::new("t", Level::Info);
        record.message = Some("facade text".to_string());
        record
            .fields
            .insert("event".to_string(), Value::Str("native".to_string()));
        resolve_legacy_message(&mut record);
        assert_eq!(record.fields["event"], Value::Str("native".to_string()));
        assert!(record.message.is_none());
    }
}

use std::collections::BTreeMap;

use log::kv::{self, VisitSource};

/// A single structured field value.
///
/// Caller-supplied fields keep their native type all the way to the JSON
/// sink; `Bytes` only survives until the decoding step of the shared
/// chain turns it into `Str`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Uint(u) => serde_json::Value::from(*u),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Str(s) => serde_json::Value::from(s.as_str()),
            // Bytes normally never reach a formatter, the shared chain
            // decodes them first. Fall back to lossy text if one does.
            Value::Bytes(b) => serde_json::Value::from(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Plain text rendering used by the console and key=value formatters.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => u.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    fn from_kv(value: &kv::Value) -> Self {
        if let Some(b) = value.to_bool() {
            Value::Bool(b)
        } else if let Some(i) = value.to_i64() {
            Value::Int(i)
        } else if let Some(u) = value.to_u64() {
            Value::Uint(u)
        } else if let Some(f) = value.to_f64() {
            Value::Float(f)
        } else if let Some(s) = value.to_borrowed_str() {
            Value::Str(s.to_string())
        } else {
            Value::Str(value.to_string())
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint(u64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// One structured log event on its way through the pipeline.
///
/// `message` holds the unresolved text of records that came through the
/// `log` facade; the shared chain promotes it into the `event` field
/// before any formatter runs.
#[derive(Debug, Clone)]
pub struct Record {
    pub logger: String,
    pub level: log::Level,
    pub message: Option<String>,
    pub module_path: Option<String>,
    pub line: Option<u32>,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(logger: impl Into<String>, level: log::Level) -> Self {
        Self {
            logger: logger.into(),
            level,
            message: None,
            module_path: None,
            line: None,
            fields: BTreeMap::new(),
        }
    }

    /// Capture a facade record into an owned one, including any
    /// structured key-values attached through the kv syntax.
    pub fn from_facade(record: &log::Record) -> Self {
        let mut fields = BTreeMap::new();
        let mut visitor = FieldVisitor(&mut fields);
        // A source that fails to enumerate its pairs loses those pairs,
        // it must not lose the whole record.
        let _ = record.key_values().visit(&mut visitor);

        Self {
            logger: record.target().to_string(),
            level: record.level(),
            message: Some(record.args().to_string()),
            module_path: record.module_path().map(str::to_string),
            line: record.line(),
            fields,
        }
    }
}

struct FieldVisitor<'a>(&'a mut BTreeMap<String, Value>);

impl<'kvs> VisitSource<'kvs> for FieldVisitor<'_> {
    fn visit_pair(&mut self, key: kv::Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        self.0.insert(key.to_string(), Value::from_kv(&value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_conversions_keep_native_types() {
        assert_eq!(Value::from(3), Value::Int(3));
        assert_eq!(Value::from(3u64), Value::Uint(3));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from("abc"), Value::Str("abc".to_string()));
        assert_eq!(Value::from(&b"\xc3\xa9"[..]), Value::Bytes(vec![0xc3, 0xa9]));
    }

    #[test]
    fn json_mapping_preserves_numbers() {
        assert_eq!(Value::Int(3).as_json(), serde_json::json!(3));
        assert_eq!(Value::Float(1.5).as_json(), serde_json::json!(1.5));
        assert_eq!(Value::Bool(false).as_json(), serde_json::json!(false));
    }

    #[test]
    fn invalid_utf8_bytes_render_lossy() {
        let v = Value::Bytes(vec![0xff, 0xfe]);
        assert_eq!(v.render(), "\u{fffd}\u{fffd}");
    }
}

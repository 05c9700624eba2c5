//! Typed log fields
//!
//! A [`Field`] is a key plus a tagged value. Encoding is deferred: a field
//! dispatches itself into an [`ObjectEncoder`] at encode time via
//! [`Field::add_to`]. Object and array fields invoke their marshaler
//! lazily, so callers pay nothing for records the level gate rejects.

use super::error::Result;
use super::stacktrace;
use crate::encoders::{ArrayEncoder, ObjectEncoder};
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Map- or struct-like values encode themselves through this trait.
pub trait ObjectMarshaler: Send + Sync {
    fn marshal_object(&self, enc: &mut dyn ObjectEncoder) -> Result<()>;
}

/// Sequence values encode themselves through this trait.
pub trait ArrayMarshaler: Send + Sync {
    fn marshal_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()>;
}

/// The closed set of value variants a field can carry.
#[derive(Clone)]
pub enum FieldValue {
    Skip,
    Bool(bool),
    Int64(i64),
    Int32(i32),
    Uint64(u64),
    Uint32(u32),
    Float64(f64),
    Float32(f32),
    Str(String),
    /// UTF-8 text carried as bytes.
    ByteString(Vec<u8>),
    /// Opaque binary, base64-encoded by the JSON encoder.
    Binary(Vec<u8>),
    Time(DateTime<FixedOffset>),
    Duration(Duration),
    /// An error rendered as its message.
    Error(String),
    Object(Arc<dyn ObjectMarshaler>),
    Array(Arc<dyn ArrayMarshaler>),
    /// Arbitrary reflected value, serialized through serde_json.
    Reflect(serde_json::Value),
    /// Opens a nested namespace for all subsequent fields.
    Namespace,
    /// Stack marker: a pre-rendered stack promoted into the entry's stack
    /// slot at encode time instead of being rendered as a body field.
    Stacktrace(String),
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Skip => write!(f, "Skip"),
            FieldValue::Bool(v) => write!(f, "Bool({})", v),
            FieldValue::Int64(v) => write!(f, "Int64({})", v),
            FieldValue::Int32(v) => write!(f, "Int32({})", v),
            FieldValue::Uint64(v) => write!(f, "Uint64({})", v),
            FieldValue::Uint32(v) => write!(f, "Uint32({})", v),
            FieldValue::Float64(v) => write!(f, "Float64({})", v),
            FieldValue::Float32(v) => write!(f, "Float32({})", v),
            FieldValue::Str(v) => write!(f, "Str({:?})", v),
            FieldValue::ByteString(v) => write!(f, "ByteString({} bytes)", v.len()),
            FieldValue::Binary(v) => write!(f, "Binary({} bytes)", v.len()),
            FieldValue::Time(v) => write!(f, "Time({})", v),
            FieldValue::Duration(v) => write!(f, "Duration({:?})", v),
            FieldValue::Error(v) => write!(f, "Error({:?})", v),
            FieldValue::Object(_) => write!(f, "Object(..)"),
            FieldValue::Array(_) => write!(f, "Array(..)"),
            FieldValue::Reflect(v) => write!(f, "Reflect({})", v),
            FieldValue::Namespace => write!(f, "Namespace"),
            FieldValue::Stacktrace(_) => write!(f, "Stacktrace(..)"),
        }
    }
}

/// A typed key/value pair attached to one record.
#[derive(Debug, Clone)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<String>, value: FieldValue) -> Self {
        Field {
            key: key.into(),
            value,
        }
    }

    /// True for the stack-marker variant.
    pub fn is_stack_marker(&self) -> bool {
        matches!(self.value, FieldValue::Stacktrace(_))
    }

    /// Dispatch this field into the encoder.
    ///
    /// A field with an empty key is a no-op.
    pub fn add_to(&self, enc: &mut dyn ObjectEncoder) {
        if self.key.is_empty() {
            return;
        }
        match &self.value {
            FieldValue::Skip => {}
            FieldValue::Bool(v) => enc.add_bool(&self.key, *v),
            FieldValue::Int64(v) => enc.add_i64(&self.key, *v),
            FieldValue::Int32(v) => enc.add_i64(&self.key, i64::from(*v)),
            FieldValue::Uint64(v) => enc.add_u64(&self.key, *v),
            FieldValue::Uint32(v) => enc.add_u64(&self.key, u64::from(*v)),
            FieldValue::Float64(v) => enc.add_f64(&self.key, *v),
            FieldValue::Float32(v) => enc.add_f32(&self.key, *v),
            FieldValue::Str(v) => enc.add_str(&self.key, v),
            FieldValue::ByteString(v) => enc.add_byte_string(&self.key, v),
            FieldValue::Binary(v) => enc.add_binary(&self.key, v),
            FieldValue::Time(v) => enc.add_time(&self.key, v),
            FieldValue::Duration(v) => enc.add_duration(&self.key, *v),
            FieldValue::Error(v) => enc.add_str(&self.key, v),
            FieldValue::Object(m) => {
                if let Err(err) = enc.add_object(&self.key, m.as_ref()) {
                    enc.add_str(&format!("{}Error", self.key), &err.to_string());
                }
            }
            FieldValue::Array(m) => {
                if let Err(err) = enc.add_array(&self.key, m.as_ref()) {
                    enc.add_str(&format!("{}Error", self.key), &err.to_string());
                }
            }
            FieldValue::Reflect(v) => enc.add_reflected(&self.key, v),
            FieldValue::Namespace => enc.open_namespace(&self.key),
            // The console encoder lifts stack markers into the entry; any
            // encoder that sees one here renders the string as-is.
            FieldValue::Stacktrace(v) => enc.add_str(&self.key, v),
        }
    }
}

// Typed constructors ======================================================

/// A no-op field, useful when handling invalid inputs in other
/// constructors.
pub fn skip() -> Field {
    Field::new("", FieldValue::Skip)
}

pub fn boolean(key: impl Into<String>, value: bool) -> Field {
    Field::new(key, FieldValue::Bool(value))
}

pub fn string(key: impl Into<String>, value: impl Into<String>) -> Field {
    Field::new(key, FieldValue::Str(value.into()))
}

pub fn int(key: impl Into<String>, value: i64) -> Field {
    Field::new(key, FieldValue::Int64(value))
}

pub fn int32(key: impl Into<String>, value: i32) -> Field {
    Field::new(key, FieldValue::Int32(value))
}

pub fn int64(key: impl Into<String>, value: i64) -> Field {
    Field::new(key, FieldValue::Int64(value))
}

pub fn uint32(key: impl Into<String>, value: u32) -> Field {
    Field::new(key, FieldValue::Uint32(value))
}

pub fn uint64(key: impl Into<String>, value: u64) -> Field {
    Field::new(key, FieldValue::Uint64(value))
}

pub fn float32(key: impl Into<String>, value: f32) -> Field {
    Field::new(key, FieldValue::Float32(value))
}

pub fn float64(key: impl Into<String>, value: f64) -> Field {
    Field::new(key, FieldValue::Float64(value))
}

/// UTF-8 text carried as bytes. For opaque blobs use [`binary`].
pub fn byte_string(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Field {
    Field::new(key, FieldValue::ByteString(value.into()))
}

/// An opaque binary blob, base64-encoded by the JSON encoder.
pub fn binary(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Field {
    Field::new(key, FieldValue::Binary(value.into()))
}

pub fn time(key: impl Into<String>, value: DateTime<FixedOffset>) -> Field {
    Field::new(key, FieldValue::Time(value))
}

pub fn duration(key: impl Into<String>, value: Duration) -> Field {
    Field::new(key, FieldValue::Duration(value))
}

/// An error under the key `"error"`, serialized as its message.
pub fn error(err: &dyn std::error::Error) -> Field {
    named_error("error", err)
}

pub fn named_error(key: impl Into<String>, err: &dyn std::error::Error) -> Field {
    Field::new(key, FieldValue::Error(err.to_string()))
}

/// Opens a named, isolated scope in the record's context. All subsequent
/// fields land inside the new namespace.
pub fn namespace(key: impl Into<String>) -> Field {
    Field::new(key, FieldValue::Namespace)
}

/// The value's `Display` output, rendered eagerly.
pub fn stringer(key: impl Into<String>, value: &dyn fmt::Display) -> Field {
    Field::new(key, FieldValue::Str(value.to_string()))
}

pub fn object(key: impl Into<String>, value: Arc<dyn ObjectMarshaler>) -> Field {
    Field::new(key, FieldValue::Object(value))
}

pub fn array(key: impl Into<String>, value: Arc<dyn ArrayMarshaler>) -> Field {
    Field::new(key, FieldValue::Array(value))
}

/// An arbitrary value serialized through serde. Slower and
/// allocation-heavier than the typed constructors; outside tests prefer
/// [`any`].
pub fn reflect<T: serde::Serialize>(key: impl Into<String>, value: &T) -> Field {
    match serde_json::to_value(value) {
        Ok(v) => Field::new(key, FieldValue::Reflect(v)),
        Err(err) => Field::new(key, FieldValue::Error(err.to_string())),
    }
}

/// Pick the best representation for a value convertible into the variant
/// set. Recording the same key with different value types breaks
/// downstream index search, so keep keys type-stable.
pub fn any(key: impl Into<String>, value: impl Into<FieldValue>) -> Field {
    Field::new(key, value.into())
}

/// Capture the current stack under `key`.
///
/// Capture happens here, synchronously: by encode time the interesting
/// frames have already returned. Capturing costs ~10us, so the allocation
/// for the rendered string is acceptable.
pub fn stack(key: impl Into<String>) -> Field {
    stack_skip(key, 0, 0)
}

/// Capture the current stack, skipping `skip` frames from the top.
///
/// `duplicate_frame_skip` filters recursion spam: a value of N drops any
/// frame whose file and line match the frame N positions earlier.
pub fn stack_skip(key: impl Into<String>, skip: usize, duplicate_frame_skip: usize) -> Field {
    Field::new(
        key,
        FieldValue::Stacktrace(stacktrace::take_stacktrace_skip(
            skip + 1,
            duplicate_frame_skip,
        )),
    )
}

// Conversions for `any` and the sugared API ==============================

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int32(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int64(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Uint32(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Uint64(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float32(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float64(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<Duration> for FieldValue {
    fn from(v: Duration) -> Self {
        FieldValue::Duration(v)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        FieldValue::Time(v)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Reflect(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct SpyEncoder {
        seen: BTreeMap<String, String>,
        namespaces: Vec<String>,
    }

    impl ObjectEncoder for SpyEncoder {
        fn add_bool(&mut self, key: &str, value: bool) {
            self.seen.insert(key.into(), value.to_string());
        }
        fn add_i64(&mut self, key: &str, value: i64) {
            self.seen.insert(key.into(), value.to_string());
        }
        fn add_u64(&mut self, key: &str, value: u64) {
            self.seen.insert(key.into(), value.to_string());
        }
        fn add_f64(&mut self, key: &str, value: f64) {
            self.seen.insert(key.into(), value.to_string());
        }
        fn add_f32(&mut self, key: &str, value: f32) {
            self.seen.insert(key.into(), value.to_string());
        }
        fn add_str(&mut self, key: &str, value: &str) {
            self.seen.insert(key.into(), value.to_string());
        }
        fn add_byte_string(&mut self, key: &str, value: &[u8]) {
            self.seen
                .insert(key.into(), String::from_utf8_lossy(value).into_owned());
        }
        fn add_binary(&mut self, key: &str, value: &[u8]) {
            self.seen.insert(key.into(), format!("{} bytes", value.len()));
        }
        fn add_time(&mut self, key: &str, value: &DateTime<FixedOffset>) {
            self.seen.insert(key.into(), value.to_rfc3339());
        }
        fn add_duration(&mut self, key: &str, value: Duration) {
            self.seen.insert(key.into(), format!("{:?}", value));
        }
        fn add_reflected(&mut self, key: &str, value: &serde_json::Value) {
            self.seen.insert(key.into(), value.to_string());
        }
        fn add_object(&mut self, key: &str, _value: &dyn ObjectMarshaler) -> Result<()> {
            self.seen.insert(key.into(), "object".to_string());
            Ok(())
        }
        fn add_array(&mut self, key: &str, _value: &dyn ArrayMarshaler) -> Result<()> {
            self.seen.insert(key.into(), "array".to_string());
            Ok(())
        }
        fn open_namespace(&mut self, key: &str) {
            self.namespaces.push(key.to_string());
        }
    }

    #[test]
    fn test_typed_dispatch() {
        let mut enc = SpyEncoder::default();
        string("s", "v").add_to(&mut enc);
        int("i", -3).add_to(&mut enc);
        uint64("u", 9).add_to(&mut enc);
        boolean("b", true).add_to(&mut enc);
        float64("f", 1.5).add_to(&mut enc);

        assert_eq!(enc.seen["s"], "v");
        assert_eq!(enc.seen["i"], "-3");
        assert_eq!(enc.seen["u"], "9");
        assert_eq!(enc.seen["b"], "true");
        assert_eq!(enc.seen["f"], "1.5");
    }

    #[test]
    fn test_empty_key_is_noop() {
        let mut enc = SpyEncoder::default();
        string("", "ignored").add_to(&mut enc);
        skip().add_to(&mut enc);
        assert!(enc.seen.is_empty());
    }

    #[test]
    fn test_namespace_opens_scope() {
        let mut enc = SpyEncoder::default();
        namespace("outer").add_to(&mut enc);
        string("k", "v").add_to(&mut enc);
        assert_eq!(enc.namespaces, vec!["outer".to_string()]);
        assert_eq!(enc.seen["k"], "v");
    }

    #[test]
    fn test_error_field_carries_message() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let f = error(&io_err);
        assert_eq!(f.key, "error");
        let mut enc = SpyEncoder::default();
        f.add_to(&mut enc);
        assert_eq!(enc.seen["error"], "boom");
    }

    #[test]
    fn test_stack_field_captured_at_call_time() {
        let f = stack("stk");
        assert!(f.is_stack_marker());
        match &f.value {
            FieldValue::Stacktrace(s) => assert!(!s.is_empty()),
            other => panic!("expected stack marker, got {:?}", other),
        }
    }

    #[test]
    fn test_any_conversions() {
        assert!(matches!(any("k", 1i64).value, FieldValue::Int64(1)));
        assert!(matches!(any("k", "s").value, FieldValue::Str(_)));
        assert!(matches!(any("k", true).value, FieldValue::Bool(true)));
        assert!(matches!(
            any("k", Duration::from_secs(1)).value,
            FieldValue::Duration(_)
        ));
    }
}

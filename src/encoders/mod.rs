//! Encoders over the entry + field set
//!
//! Two encoders ship with the crate: a streaming JSON encoder and a
//! console encoder that renders TAB-separated headers with a JSON context
//! block. Both consume an [`EncoderConfig`], an [`Entry`](crate::core::Entry)
//! and a field slice, and produce a pooled buffer.

pub mod console;
pub mod json;

pub use console::ConsoleEncoder;
pub use json::JsonEncoder;

use crate::buffer::PooledBuffer;
use crate::core::entry::{Entry, EntryCaller};
use crate::core::error::{LoggerError, Result};
use crate::core::field::{ArrayMarshaler, Field, ObjectMarshaler};
use crate::core::level::Level;
use chrono::{DateTime, FixedOffset};
use colored::Colorize;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

/// RFC3339 with milliseconds and offset: `2006-01-02T15:04:05.000+08:00`.
pub const RFC3339_MILLIS: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

pub const DEFAULT_LINE_ENDING: &str = "\n";

pub const JSON_ENCODING: &str = "json";
pub const CONSOLE_ENCODING: &str = "console";

/// Keyed encoding surface fields dispatch into.
pub trait ObjectEncoder {
    fn add_bool(&mut self, key: &str, value: bool);
    fn add_i64(&mut self, key: &str, value: i64);
    fn add_u64(&mut self, key: &str, value: u64);
    fn add_f64(&mut self, key: &str, value: f64);
    fn add_f32(&mut self, key: &str, value: f32);
    fn add_str(&mut self, key: &str, value: &str);
    fn add_byte_string(&mut self, key: &str, value: &[u8]);
    fn add_binary(&mut self, key: &str, value: &[u8]);
    fn add_time(&mut self, key: &str, value: &DateTime<FixedOffset>);
    fn add_duration(&mut self, key: &str, value: Duration);
    fn add_reflected(&mut self, key: &str, value: &serde_json::Value);
    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<()>;
    fn add_array(&mut self, key: &str, value: &dyn ArrayMarshaler) -> Result<()>;
    /// Open a nested scope; every later field lands inside it until the
    /// encoder closes its open namespaces at the end of the record.
    fn open_namespace(&mut self, key: &str);
}

/// Positional encoding surface used by array fields and the header hooks.
pub trait ArrayEncoder {
    fn append_bool(&mut self, value: bool);
    fn append_i64(&mut self, value: i64);
    fn append_u64(&mut self, value: u64);
    fn append_f64(&mut self, value: f64);
    fn append_str(&mut self, value: &str);
    fn append_time(&mut self, value: &DateTime<FixedOffset>);
    fn append_duration(&mut self, value: Duration);
    fn append_reflected(&mut self, value: &serde_json::Value);
    fn append_object(&mut self, value: &dyn ObjectMarshaler) -> Result<()>;
}

pub type TimeEncoderFn = fn(&DateTime<FixedOffset>, &mut dyn ArrayEncoder);
pub type LevelEncoderFn = fn(Level, &mut dyn ArrayEncoder);
pub type DurationEncoderFn = fn(Duration, &mut dyn ArrayEncoder);
pub type CallerEncoderFn = fn(&EntryCaller, &mut dyn ArrayEncoder);
pub type NameEncoderFn = fn(&str, &mut dyn ArrayEncoder);

/// Header keys and formatting hooks for both encoders.
///
/// Any key set to the empty string elides that header slot.
#[derive(Clone)]
pub struct EncoderConfig {
    pub time_key: String,
    pub level_key: String,
    pub name_key: String,
    pub caller_key: String,
    pub message_key: String,
    pub stacktrace_key: String,
    pub line_ending: String,
    pub encode_time: TimeEncoderFn,
    pub encode_level: LevelEncoderFn,
    pub encode_duration: DurationEncoderFn,
    pub encode_caller: CallerEncoderFn,
    pub encode_name: Option<NameEncoderFn>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            time_key: String::new(),
            level_key: String::new(),
            name_key: String::new(),
            caller_key: String::new(),
            message_key: String::new(),
            stacktrace_key: String::new(),
            line_ending: DEFAULT_LINE_ENDING.to_string(),
            encode_time: rfc3339_time_encoder,
            encode_level: capital_level_encoder,
            encode_duration: seconds_duration_encoder,
            encode_caller: short_caller_encoder,
            encode_name: None,
        }
    }
}

/// Serializes entries plus fields into bytes.
///
/// `add_fields` folds context into the encoder; `clone_encoder` snapshots
/// that context so clones diverge independently.
pub trait Encoder: Send + Sync {
    fn clone_encoder(&self) -> Box<dyn Encoder>;
    fn add_fields(&mut self, fields: &[Field]);
    fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<PooledBuffer>;
}

// Time hooks.

pub fn rfc3339_time_encoder(t: &DateTime<FixedOffset>, enc: &mut dyn ArrayEncoder) {
    enc.append_str(&t.format(RFC3339_MILLIS).to_string());
}

pub fn epoch_time_encoder(t: &DateTime<FixedOffset>, enc: &mut dyn ArrayEncoder) {
    enc.append_i64(t.timestamp());
}

pub fn epoch_millis_time_encoder(t: &DateTime<FixedOffset>, enc: &mut dyn ArrayEncoder) {
    enc.append_i64(t.timestamp_millis());
}

// Level hooks.

pub fn capital_level_encoder(level: Level, enc: &mut dyn ArrayEncoder) {
    enc.append_str(level.as_str());
}

pub fn lowercase_level_encoder(level: Level, enc: &mut dyn ArrayEncoder) {
    enc.append_str(level.lowercase_str());
}

pub fn capital_color_level_encoder(level: Level, enc: &mut dyn ArrayEncoder) {
    enc.append_str(&level.as_str().color(level.color_code()).to_string());
}

// Duration hooks.

pub fn seconds_duration_encoder(d: Duration, enc: &mut dyn ArrayEncoder) {
    enc.append_f64(d.as_secs_f64());
}

pub fn string_duration_encoder(d: Duration, enc: &mut dyn ArrayEncoder) {
    enc.append_str(&format!("{:?}", d));
}

// Caller hooks.

pub fn short_caller_encoder(caller: &EntryCaller, enc: &mut dyn ArrayEncoder) {
    enc.append_str(&caller.trimmed_path());
}

pub fn full_caller_encoder(caller: &EntryCaller, enc: &mut dyn ArrayEncoder) {
    enc.append_str(&caller.full_path());
}

// Name hook.

pub fn full_name_encoder(name: &str, enc: &mut dyn ArrayEncoder) {
    enc.append_str(name);
}

pub type EncoderConstructor = fn(EncoderConfig) -> Result<Box<dyn Encoder>>;

static ENCODERS: Lazy<RwLock<HashMap<String, EncoderConstructor>>> = Lazy::new(|| {
    let mut m: HashMap<String, EncoderConstructor> = HashMap::new();
    m.insert(JSON_ENCODING.to_string(), |cfg| {
        Ok(Box::new(JsonEncoder::new(cfg)))
    });
    m.insert(CONSOLE_ENCODING.to_string(), |cfg| {
        Ok(Box::new(ConsoleEncoder::new(cfg)))
    });
    RwLock::new(m)
});

/// Register an encoder constructor under a new name.
///
/// `"json"` and `"console"` are registered at init; taking an existing
/// name fails.
pub fn register_encoder(name: &str, constructor: EncoderConstructor) -> Result<()> {
    if name.is_empty() {
        return Err(LoggerError::NoEncoderName);
    }
    let mut encoders = ENCODERS.write();
    if encoders.contains_key(name) {
        return Err(LoggerError::EncoderExists(name.to_string()));
    }
    encoders.insert(name.to_string(), constructor);
    Ok(())
}

/// Build an encoder by registered name.
pub fn new_encoder(name: &str, config: EncoderConfig) -> Result<Box<dyn Encoder>> {
    if name.is_empty() {
        return Err(LoggerError::NoEncoderName);
    }
    let encoders = ENCODERS.read();
    let constructor = encoders
        .get(name)
        .ok_or_else(|| LoggerError::UnknownEncoder(name.to_string()))?;
    constructor(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_encoders_registered() {
        let cfg = EncoderConfig::default();
        assert!(new_encoder("json", cfg.clone()).is_ok());
        assert!(new_encoder("console", cfg.clone()).is_ok());
        assert!(matches!(
            new_encoder("msgpack", cfg.clone()),
            Err(LoggerError::UnknownEncoder(_))
        ));
        assert!(matches!(
            new_encoder("", cfg),
            Err(LoggerError::NoEncoderName)
        ));
    }

    #[test]
    fn test_register_taken_name_fails() {
        let err = register_encoder("json", |cfg| Ok(Box::new(JsonEncoder::new(cfg))));
        assert!(matches!(err, Err(LoggerError::EncoderExists(_))));
    }
}

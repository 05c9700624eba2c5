//! Sugared adapter: alternating key/value pairs and printf templating
//!
//! Trades a little of the typed API's performance for terser call sites.
//! Loose values travel as [`SugarValue`]; the [`kv!`](crate::kv) macro
//! builds the alternating list.

use super::error::Result;
use super::field::{self, ArrayMarshaler, Field, FieldValue, ObjectMarshaler};
use super::level::Level;
use super::logger::Logger;
use crate::encoders::{ArrayEncoder, ObjectEncoder};
use std::fmt;
use std::sync::Arc;

const ODD_NUMBER_ERR: &str = "Ignored key without a value.";
const NON_STRING_KEY_ERR: &str = "Ignored key-value pairs with non-string keys.";

/// A loosely-typed value for the sugared API: either a ready-made typed
/// field or a plain value awaiting its key.
#[derive(Debug, Clone)]
pub enum SugarValue {
    Field(Field),
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    Json(serde_json::Value),
}

impl SugarValue {
    fn as_key(&self) -> Option<&str> {
        match self {
            SugarValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn into_field_value(self) -> FieldValue {
        match self {
            SugarValue::Field(f) => f.value,
            SugarValue::Bool(v) => FieldValue::Bool(v),
            SugarValue::I64(v) => FieldValue::Int64(v),
            SugarValue::U64(v) => FieldValue::Uint64(v),
            SugarValue::F64(v) => FieldValue::Float64(v),
            SugarValue::Str(v) => FieldValue::Str(v),
            SugarValue::Json(v) => FieldValue::Reflect(v),
        }
    }
}

impl fmt::Display for SugarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SugarValue::Field(v) => write!(f, "{:?}", v),
            SugarValue::Bool(v) => write!(f, "{}", v),
            SugarValue::I64(v) => write!(f, "{}", v),
            SugarValue::U64(v) => write!(f, "{}", v),
            SugarValue::F64(v) => write!(f, "{}", v),
            SugarValue::Str(v) => write!(f, "{}", v),
            SugarValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<Field> for SugarValue {
    fn from(v: Field) -> Self {
        SugarValue::Field(v)
    }
}

impl From<bool> for SugarValue {
    fn from(v: bool) -> Self {
        SugarValue::Bool(v)
    }
}

impl From<i32> for SugarValue {
    fn from(v: i32) -> Self {
        SugarValue::I64(i64::from(v))
    }
}

impl From<i64> for SugarValue {
    fn from(v: i64) -> Self {
        SugarValue::I64(v)
    }
}

impl From<u32> for SugarValue {
    fn from(v: u32) -> Self {
        SugarValue::U64(u64::from(v))
    }
}

impl From<u64> for SugarValue {
    fn from(v: u64) -> Self {
        SugarValue::U64(v)
    }
}

impl From<f64> for SugarValue {
    fn from(v: f64) -> Self {
        SugarValue::F64(v)
    }
}

impl From<&str> for SugarValue {
    fn from(v: &str) -> Self {
        SugarValue::Str(v.to_string())
    }
}

impl From<String> for SugarValue {
    fn from(v: String) -> Self {
        SugarValue::Str(v)
    }
}

impl From<serde_json::Value> for SugarValue {
    fn from(v: serde_json::Value) -> Self {
        SugarValue::Json(v)
    }
}

struct InvalidPair {
    position: usize,
    key: String,
    value: String,
}

impl ObjectMarshaler for InvalidPair {
    fn marshal_object(&self, enc: &mut dyn ObjectEncoder) -> Result<()> {
        enc.add_i64("position", self.position as i64);
        enc.add_str("key", &self.key);
        enc.add_str("value", &self.value);
        Ok(())
    }
}

struct InvalidPairs(Vec<InvalidPair>);

impl ArrayMarshaler for InvalidPairs {
    fn marshal_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()> {
        for pair in &self.0 {
            enc.append_object(pair)?;
        }
        Ok(())
    }
}

/// The key-value / printf wrapper around [`Logger`].
#[derive(Clone)]
pub struct SugaredLogger {
    base: Logger,
}

impl SugaredLogger {
    pub(crate) fn new(base: Logger) -> Self {
        SugaredLogger { base }
    }

    /// The wrapped typed logger.
    pub fn desugar(&self) -> Logger {
        self.base.clone()
    }

    pub fn sync(&self) -> Result<()> {
        self.base.sync()
    }

    pub fn named(&self, name: impl Into<String>) -> SugaredLogger {
        SugaredLogger {
            base: self.base.named(name),
        }
    }

    /// Clone with context from alternating key/value pairs.
    pub fn with(&self, keys_and_values: Vec<SugarValue>) -> SugaredLogger {
        SugaredLogger {
            base: self.base.with(&self.sweeten(keys_and_values)),
        }
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, keys_and_values: Vec<SugarValue>) {
        self.log(Level::Debug, msg, keys_and_values);
    }

    #[track_caller]
    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Debug, args);
    }

    #[track_caller]
    pub fn info(&self, msg: &str, keys_and_values: Vec<SugarValue>) {
        self.log(Level::Info, msg, keys_and_values);
    }

    #[track_caller]
    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Info, args);
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, keys_and_values: Vec<SugarValue>) {
        self.log(Level::Warn, msg, keys_and_values);
    }

    #[track_caller]
    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Warn, args);
    }

    #[track_caller]
    pub fn error(&self, msg: &str, keys_and_values: Vec<SugarValue>) {
        self.log(Level::Error, msg, keys_and_values);
    }

    #[track_caller]
    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Error, args);
    }

    #[track_caller]
    pub fn critical(&self, msg: &str, keys_and_values: Vec<SugarValue>) {
        self.log(Level::Critical, msg, keys_and_values);
    }

    #[track_caller]
    pub fn criticalf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Critical, args);
    }

    #[track_caller]
    pub fn fixed(&self, msg: &str, keys_and_values: Vec<SugarValue>) {
        self.log(Level::Fixed, msg, keys_and_values);
    }

    #[track_caller]
    pub fn fixedf(&self, args: fmt::Arguments<'_>) {
        self.logf(Level::Fixed, args);
    }

    /// Format and log at an arbitrary level.
    #[track_caller]
    pub fn logf(&self, level: Level, args: fmt::Arguments<'_>) {
        // Skip the string formatting overhead when the record cannot pass.
        if level < Level::Critical && !self.base.core().enabled(level) {
            return;
        }
        if let Some(ce) = self.base.check(level, &args.to_string()) {
            ce.write(&[]);
        }
    }

    #[track_caller]
    fn log(&self, level: Level, msg: &str, keys_and_values: Vec<SugarValue>) {
        // Skip the pair-sweetening overhead when the record cannot pass.
        if level < Level::Critical && !self.base.core().enabled(level) {
            return;
        }
        if let Some(ce) = self.base.check(level, msg) {
            ce.write(&self.sweeten(keys_and_values));
        }
    }

    /// Turn an alternating key/value list into typed fields.
    ///
    /// Ready-made fields pass straight through. A trailing key without a
    /// value and pairs whose key is not a string are skipped and reported
    /// through the logger itself.
    fn sweeten(&self, args: Vec<SugarValue>) -> Vec<Field> {
        if args.is_empty() {
            return Vec::new();
        }

        let mut fields = Vec::with_capacity(args.len());
        let mut invalid: Vec<InvalidPair> = Vec::new();

        let mut i = 0;
        while i < args.len() {
            if let SugarValue::Field(f) = &args[i] {
                fields.push(f.clone());
                i += 1;
                continue;
            }

            if i == args.len() - 1 {
                self.base.error(
                    ODD_NUMBER_ERR,
                    &[field::string("ignored", args[i].to_string())],
                );
                break;
            }

            let key = &args[i];
            let value = &args[i + 1];
            match key.as_key() {
                Some(k) => fields.push(Field::new(k, value.clone().into_field_value())),
                None => invalid.push(InvalidPair {
                    position: i,
                    key: key.to_string(),
                    value: value.to_string(),
                }),
            }
            i += 2;
        }

        if !invalid.is_empty() {
            self.base.error(
                NON_STRING_KEY_ERR,
                &[field::array("invalid", Arc::new(InvalidPairs(invalid)))],
            );
        }

        fields
    }
}

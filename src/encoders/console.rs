//! Console encoder
//!
//! Human-oriented output: TAB-separated header slots, the message, then
//! the structured context as a JSON block. Stack-marker fields are lifted
//! into the entry's stack slot so the stack is appended once, after the
//! structured block, never inside it.

use super::json::JsonEncoder;
use super::{full_name_encoder, ArrayEncoder, Encoder, EncoderConfig, DEFAULT_LINE_ENDING};
use crate::buffer::{self, PooledBuffer};
use crate::core::entry::Entry;
use crate::core::error::Result;
use crate::core::field::{Field, FieldValue, ObjectMarshaler};
use chrono::{DateTime, FixedOffset};
use std::time::Duration;

/// Collects header primitives as display strings.
///
/// Header metadata must not be quoted or escaped the way JSON strings are,
/// so the header hooks run against this collector instead of the JSON
/// encoder.
#[derive(Default)]
pub(crate) struct SliceArrayEncoder {
    pub(crate) elems: Vec<String>,
}

impl ArrayEncoder for SliceArrayEncoder {
    fn append_bool(&mut self, value: bool) {
        self.elems.push(value.to_string());
    }

    fn append_i64(&mut self, value: i64) {
        self.elems.push(value.to_string());
    }

    fn append_u64(&mut self, value: u64) {
        self.elems.push(value.to_string());
    }

    fn append_f64(&mut self, value: f64) {
        self.elems.push(value.to_string());
    }

    fn append_str(&mut self, value: &str) {
        self.elems.push(value.to_string());
    }

    fn append_time(&mut self, value: &DateTime<FixedOffset>) {
        self.elems.push(value.to_rfc3339());
    }

    fn append_duration(&mut self, value: Duration) {
        self.elems.push(format!("{:?}", value));
    }

    fn append_reflected(&mut self, value: &serde_json::Value) {
        self.elems.push(value.to_string());
    }

    fn append_object(&mut self, _value: &dyn ObjectMarshaler) -> Result<()> {
        // Header hooks only emit primitives.
        Ok(())
    }
}

pub struct ConsoleEncoder {
    json: JsonEncoder,
}

impl ConsoleEncoder {
    pub fn new(cfg: EncoderConfig) -> Self {
        ConsoleEncoder {
            json: JsonEncoder::new(cfg),
        }
    }

    fn add_tab_if_necessary(line: &mut Vec<u8>) {
        if !line.is_empty() {
            line.push(b'\t');
        }
    }

    /// Render the structured context, lifting stack markers into `stack`.
    fn write_context(&self, line: &mut Vec<u8>, fields: &[Field], stack: &mut String) {
        let mut context = self.json.clone_with_context();
        for field in fields {
            if let FieldValue::Stacktrace(s) = &field.value {
                *stack = s.clone();
            } else {
                field.add_to(&mut context);
            }
        }
        context.close_open_namespaces();
        if context.context_is_empty() {
            return;
        }

        Self::add_tab_if_necessary(line);
        line.push(b'{');
        line.extend_from_slice(context.context_bytes());
        line.push(b'}');
    }
}

impl Encoder for ConsoleEncoder {
    fn clone_encoder(&self) -> Box<dyn Encoder> {
        Box::new(ConsoleEncoder {
            json: self.json.clone_with_context(),
        })
    }

    fn add_fields(&mut self, fields: &[Field]) {
        self.json.add_fields(fields);
    }

    fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<PooledBuffer> {
        let cfg = self.json.config().clone();
        let mut line = buffer::get().take();

        let mut arr = SliceArrayEncoder::default();
        if !cfg.time_key.is_empty() {
            (cfg.encode_time)(&entry.time, &mut arr);
        }
        if !cfg.level_key.is_empty() {
            (cfg.encode_level)(entry.level, &mut arr);
        }
        if !entry.logger_name.is_empty() && !cfg.name_key.is_empty() {
            let encode_name = cfg.encode_name.unwrap_or(full_name_encoder);
            encode_name(&entry.logger_name, &mut arr);
        }
        if entry.caller.defined && !cfg.caller_key.is_empty() {
            (cfg.encode_caller)(&entry.caller, &mut arr);
        }
        for (i, elem) in arr.elems.iter().enumerate() {
            if i > 0 {
                line.push(b'\t');
            }
            line.extend_from_slice(elem.as_bytes());
        }

        if !cfg.message_key.is_empty() {
            Self::add_tab_if_necessary(&mut line);
            line.extend_from_slice(entry.message.as_bytes());
        }

        let mut stack = entry.stack.clone();
        self.write_context(&mut line, fields, &mut stack);

        // No stacktrace key means the user forced single-line output.
        if !stack.is_empty() && !cfg.stacktrace_key.is_empty() {
            line.push(b'\n');
            line.extend_from_slice(stack.as_bytes());
        }

        if cfg.line_ending.is_empty() {
            line.extend_from_slice(DEFAULT_LINE_ENDING.as_bytes());
        } else {
            line.extend_from_slice(cfg.line_ending.as_bytes());
        }

        Ok(PooledBuffer::from_vec(line))
    }
}

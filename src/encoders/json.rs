//! Streaming JSON encoder
//!
//! Serializes one record per line straight into a pooled byte buffer, with
//! a namespace stack for nested context. Context added through `With` is
//! accumulated in the encoder's own buffer; clones snapshot those bytes so
//! sibling loggers never share state.

use super::{
    full_name_encoder, ArrayEncoder, Encoder, EncoderConfig, ObjectEncoder, DEFAULT_LINE_ENDING,
};
use crate::buffer::{self, PooledBuffer};
use crate::core::entry::Entry;
use crate::core::error::Result;
use crate::core::field::{ArrayMarshaler, Field, ObjectMarshaler};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use std::time::Duration;

pub struct JsonEncoder {
    cfg: EncoderConfig,
    buf: Vec<u8>,
    open_namespaces: usize,
}

impl JsonEncoder {
    pub fn new(cfg: EncoderConfig) -> Self {
        JsonEncoder {
            cfg,
            buf: Vec::new(),
            open_namespaces: 0,
        }
    }

    /// Duplicate this encoder, snapshotting context bytes and namespace
    /// depth into a fresh buffer.
    pub(crate) fn clone_with_context(&self) -> JsonEncoder {
        JsonEncoder {
            cfg: self.cfg.clone(),
            buf: self.buf.clone(),
            open_namespaces: self.open_namespaces,
        }
    }

    fn clone_with_storage(&self, buf: Vec<u8>) -> JsonEncoder {
        JsonEncoder {
            cfg: self.cfg.clone(),
            buf,
            open_namespaces: 0,
        }
    }

    pub(crate) fn config(&self) -> &EncoderConfig {
        &self.cfg
    }

    pub(crate) fn context_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn context_is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn add_element_separator(&mut self) {
        match self.buf.last() {
            None | Some(b'{') | Some(b'[') | Some(b':') | Some(b',') | Some(b' ') => {}
            _ => self.buf.push(b','),
        }
    }

    fn add_key(&mut self, key: &str) {
        self.add_element_separator();
        self.buf.push(b'"');
        self.append_escaped(key);
        self.buf.push(b'"');
        self.buf.push(b':');
    }

    fn append_escaped(&mut self, s: &str) {
        let mut tmp = [0u8; 4];
        for c in s.chars() {
            match c {
                '"' => self.buf.extend_from_slice(b"\\\""),
                '\\' => self.buf.extend_from_slice(b"\\\\"),
                '\n' => self.buf.extend_from_slice(b"\\n"),
                '\r' => self.buf.extend_from_slice(b"\\r"),
                '\t' => self.buf.extend_from_slice(b"\\t"),
                c if (c as u32) < 0x20 => {
                    self.buf
                        .extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
                }
                c => self
                    .buf
                    .extend_from_slice(c.encode_utf8(&mut tmp).as_bytes()),
            }
        }
    }

    fn append_quoted(&mut self, s: &str) {
        self.buf.push(b'"');
        self.append_escaped(s);
        self.buf.push(b'"');
    }

    fn append_f64_value(&mut self, v: f64) {
        if v.is_nan() {
            self.buf.extend_from_slice(b"\"NaN\"");
        } else if v.is_infinite() {
            if v.is_sign_positive() {
                self.buf.extend_from_slice(b"\"+Inf\"");
            } else {
                self.buf.extend_from_slice(b"\"-Inf\"");
            }
        } else {
            self.buf.extend_from_slice(format!("{}", v).as_bytes());
        }
    }

    pub(crate) fn close_open_namespaces(&mut self) {
        for _ in 0..self.open_namespaces {
            self.buf.push(b'}');
        }
        self.open_namespaces = 0;
    }
}

impl ObjectEncoder for JsonEncoder {
    fn add_bool(&mut self, key: &str, value: bool) {
        self.add_key(key);
        self.append_bool(value);
    }

    fn add_i64(&mut self, key: &str, value: i64) {
        self.add_key(key);
        self.append_i64(value);
    }

    fn add_u64(&mut self, key: &str, value: u64) {
        self.add_key(key);
        self.append_u64(value);
    }

    fn add_f64(&mut self, key: &str, value: f64) {
        self.add_key(key);
        self.append_f64(value);
    }

    fn add_f32(&mut self, key: &str, value: f32) {
        self.add_key(key);
        self.append_f64_value(f64::from(value));
    }

    fn add_str(&mut self, key: &str, value: &str) {
        self.add_key(key);
        self.append_str(value);
    }

    fn add_byte_string(&mut self, key: &str, value: &[u8]) {
        self.add_key(key);
        let text = String::from_utf8_lossy(value);
        self.append_quoted(&text);
    }

    fn add_binary(&mut self, key: &str, value: &[u8]) {
        self.add_key(key);
        let encoded = BASE64_STANDARD.encode(value);
        self.append_quoted(&encoded);
    }

    fn add_time(&mut self, key: &str, value: &DateTime<FixedOffset>) {
        self.add_key(key);
        self.append_time(value);
    }

    fn add_duration(&mut self, key: &str, value: Duration) {
        self.add_key(key);
        self.append_duration(value);
    }

    fn add_reflected(&mut self, key: &str, value: &serde_json::Value) {
        self.add_key(key);
        self.append_reflected(value);
    }

    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<()> {
        self.add_key(key);
        self.buf.push(b'{');
        let res = value.marshal_object(self);
        self.buf.push(b'}');
        res
    }

    fn add_array(&mut self, key: &str, value: &dyn ArrayMarshaler) -> Result<()> {
        self.add_key(key);
        self.buf.push(b'[');
        let res = value.marshal_array(self);
        self.buf.push(b']');
        res
    }

    fn open_namespace(&mut self, key: &str) {
        self.add_key(key);
        self.buf.push(b'{');
        self.open_namespaces += 1;
    }
}

impl ArrayEncoder for JsonEncoder {
    fn append_bool(&mut self, value: bool) {
        self.add_element_separator();
        self.buf
            .extend_from_slice(if value { b"true" } else { b"false" });
    }

    fn append_i64(&mut self, value: i64) {
        self.add_element_separator();
        self.buf.extend_from_slice(value.to_string().as_bytes());
    }

    fn append_u64(&mut self, value: u64) {
        self.add_element_separator();
        self.buf.extend_from_slice(value.to_string().as_bytes());
    }

    fn append_f64(&mut self, value: f64) {
        self.add_element_separator();
        self.append_f64_value(value);
    }

    fn append_str(&mut self, value: &str) {
        self.add_element_separator();
        self.append_quoted(value);
    }

    fn append_time(&mut self, value: &DateTime<FixedOffset>) {
        let encode_time = self.cfg.encode_time;
        encode_time(value, self);
    }

    fn append_duration(&mut self, value: Duration) {
        let encode_duration = self.cfg.encode_duration;
        encode_duration(value, self);
    }

    fn append_reflected(&mut self, value: &serde_json::Value) {
        self.add_element_separator();
        let _ = serde_json::to_writer(&mut self.buf, value);
    }

    fn append_object(&mut self, value: &dyn ObjectMarshaler) -> Result<()> {
        self.add_element_separator();
        self.buf.push(b'{');
        let res = value.marshal_object(self);
        self.buf.push(b'}');
        res
    }
}

impl Encoder for JsonEncoder {
    fn clone_encoder(&self) -> Box<dyn Encoder> {
        Box::new(self.clone_with_context())
    }

    fn add_fields(&mut self, fields: &[Field]) {
        for field in fields {
            field.add_to(self);
        }
    }

    fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<PooledBuffer> {
        let mut fin = self.clone_with_storage(buffer::get().take());
        fin.buf.push(b'{');

        if !fin.cfg.time_key.is_empty() {
            let key = fin.cfg.time_key.clone();
            fin.add_key(&key);
            let encode_time = fin.cfg.encode_time;
            encode_time(&entry.time, &mut fin);
        }
        if !fin.cfg.level_key.is_empty() {
            let key = fin.cfg.level_key.clone();
            fin.add_key(&key);
            let encode_level = fin.cfg.encode_level;
            encode_level(entry.level, &mut fin);
        }
        if !entry.logger_name.is_empty() && !fin.cfg.name_key.is_empty() {
            let key = fin.cfg.name_key.clone();
            fin.add_key(&key);
            let encode_name = fin.cfg.encode_name.unwrap_or(full_name_encoder);
            encode_name(&entry.logger_name, &mut fin);
        }
        if entry.caller.defined && !fin.cfg.caller_key.is_empty() {
            let key = fin.cfg.caller_key.clone();
            fin.add_key(&key);
            let encode_caller = fin.cfg.encode_caller;
            encode_caller(&entry.caller, &mut fin);
        }
        if !fin.cfg.message_key.is_empty() {
            let key = fin.cfg.message_key.clone();
            fin.add_key(&key);
            fin.append_quoted(&entry.message);
        }

        if !self.buf.is_empty() {
            fin.add_element_separator();
            fin.buf.extend_from_slice(&self.buf);
            fin.open_namespaces = self.open_namespaces;
        }

        fin.add_fields(fields);
        fin.close_open_namespaces();

        if !entry.stack.is_empty() && !fin.cfg.stacktrace_key.is_empty() {
            let key = fin.cfg.stacktrace_key.clone();
            fin.add_str(&key, &entry.stack);
        }

        fin.buf.push(b'}');
        if fin.cfg.line_ending.is_empty() {
            fin.buf.extend_from_slice(DEFAULT_LINE_ENDING.as_bytes());
        } else {
            let ending = fin.cfg.line_ending.clone();
            fin.buf.extend_from_slice(ending.as_bytes());
        }

        Ok(PooledBuffer::from_vec(fin.buf))
    }
}

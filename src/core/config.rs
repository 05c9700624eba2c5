//! Declarative logger construction and the opinionated presets

use super::core::EncoderCore;
use super::entry::TimeZone;
use super::error::Result;
use super::field;
use super::level::{AtomicLevel, Level, StackLevel};
use super::logger::{
    add_caller, add_stacktrace, development, fields, Logger, LoggerOption,
};
use super::registry;
use crate::encoders::{
    capital_level_encoder, new_encoder, rfc3339_time_encoder, seconds_duration_encoder,
    short_caller_encoder, string_duration_encoder, EncoderConfig, CONSOLE_ENCODING,
    JSON_ENCODING,
};
use crate::writers::{self, WriteSyncer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A declarative way to assemble a logger.
///
/// Covers the common setups only; anything more unusual (per-level routing,
/// custom cores) goes through [`Logger::with_core`] directly.
pub struct Config {
    /// Fills the encoder's name slot when the name key is configured.
    pub name: String,
    /// When non-empty, the built logger registers under this id. Usually
    /// equal to `name`.
    pub id: String,
    /// Replace an existing registration instead of failing on conflict.
    pub force_replace: bool,
    /// Shared level cell; `Config::level.set_level` retunes the whole
    /// logger tree at run time.
    pub level: AtomicLevel,
    /// Development mode makes `Critical` panic after the write.
    pub development: bool,
    /// Annotate records with their call site.
    pub enable_caller: bool,
    /// Lower the stack-capture gate; see [`Config::build`] for the exact
    /// levels.
    pub enable_stacktrace: bool,
    /// Registered encoder name, `"json"` or `"console"` out of the box.
    pub encoding: String,
    pub encoder_config: EncoderConfig,
    /// Fields stamped on every record, emitted in sorted key order.
    pub initial_fields: BTreeMap<String, serde_json::Value>,
    /// Output sink; stderr when unset.
    pub writer: Option<Arc<dyn WriteSyncer>>,
    /// Time zone entries are stamped in.
    pub time_zone: TimeZone,
}

impl Config {
    /// Build the logger, applying `options` after the config-derived ones.
    pub fn build(self, options: impl IntoIterator<Item = LoggerOption>) -> Result<Logger> {
        let encoder = new_encoder(&self.encoding, self.encoder_config.clone())?;

        let mut opts: Vec<LoggerOption> = Vec::new();

        // Stacks are captured at Critical by default; development plus
        // enable_stacktrace lowers the gate to Warn. Fixed stays exempt
        // either way.
        let mut stack_gate = StackLevel::new(Level::Critical);
        if self.enable_stacktrace && self.development {
            stack_gate = StackLevel::new(Level::Warn);
        }
        opts.push(add_stacktrace(stack_gate));
        opts.push(super::logger::location(self.time_zone));

        if self.development {
            opts.push(development());
        }
        if self.enable_caller {
            opts.push(add_caller());
        }
        if !self.initial_fields.is_empty() {
            let fs: Vec<_> = self
                .initial_fields
                .iter()
                .map(|(k, v)| field::any(k.clone(), v.clone()))
                .collect();
            opts.push(fields(fs));
        }
        opts.extend(options);

        let writer = self.writer.unwrap_or_else(writers::stderr);
        let core = EncoderCore::new(encoder, writer, Arc::new(self.level.clone()));

        let mut log = Logger::with_core(core, opts);
        if !self.name.is_empty() {
            log = log.named(&self.name);
        }
        if !self.id.is_empty() {
            log.id = self.id.clone();
            registry::register(&log, self.force_replace)?;
        }
        Ok(log)
    }
}

/// Header keys and hooks for machine-consumed JSON output.
pub fn production_encoder_config() -> EncoderConfig {
    EncoderConfig {
        time_key: "generated_time".to_string(),
        level_key: "level".to_string(),
        name_key: "log".to_string(),
        caller_key: "caller".to_string(),
        message_key: "msg".to_string(),
        stacktrace_key: "stack".to_string(),
        encode_time: rfc3339_time_encoder,
        encode_level: capital_level_encoder,
        encode_duration: seconds_duration_encoder,
        encode_caller: short_caller_encoder,
        ..EncoderConfig::default()
    }
}

/// Production keys with the name slot renamed for ES routing.
///
/// The indexer reads `@fluentd_tag`; set the logger name (or add the field
/// by hand through `with`) so downstream search can route the stream.
pub fn production_es_encoder_config() -> EncoderConfig {
    EncoderConfig {
        name_key: "@fluentd_tag".to_string(),
        ..production_encoder_config()
    }
}

/// Production keys with human-readable durations for console output.
pub fn development_encoder_config() -> EncoderConfig {
    EncoderConfig {
        encode_duration: string_duration_encoder,
        ..production_encoder_config()
    }
}

fn combined_writer(mut writers: Vec<Arc<dyn WriteSyncer>>) -> Option<Arc<dyn WriteSyncer>> {
    match writers.len() {
        0 => None,
        1 => Some(writers.remove(0)),
        _ => Some(writers::multi(writers)),
    }
}

/// JSON at Info and above, caller annotation on, stacks at Critical.
pub fn production_config(writers: Vec<Arc<dyn WriteSyncer>>) -> Config {
    Config {
        name: String::new(),
        id: String::new(),
        force_replace: false,
        level: AtomicLevel::new(Level::Info),
        development: false,
        enable_caller: true,
        enable_stacktrace: false,
        encoding: JSON_ENCODING.to_string(),
        encoder_config: production_encoder_config(),
        initial_fields: BTreeMap::new(),
        writer: combined_writer(writers),
        time_zone: TimeZone::Local,
    }
}

/// Production JSON shaped for the ES pipeline.
pub fn production_es_config(writers: Vec<Arc<dyn WriteSyncer>>) -> Config {
    Config {
        enable_caller: false,
        encoder_config: production_es_encoder_config(),
        ..production_config(writers)
    }
}

/// Console at Debug and above, development mode, caller annotation on.
pub fn development_config(writers: Vec<Arc<dyn WriteSyncer>>) -> Config {
    Config {
        level: AtomicLevel::new(Level::Debug),
        development: true,
        encoding: CONSOLE_ENCODING.to_string(),
        encoder_config: development_encoder_config(),
        ..production_config(writers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_encoding_fails() {
        let mut cfg = production_config(vec![]);
        cfg.encoding = "protobuf".to_string();
        assert!(cfg.build([]).is_err());
    }

    #[test]
    fn test_presets() {
        let prod = production_config(vec![]);
        assert_eq!(prod.level.level(), Level::Info);
        assert_eq!(prod.encoding, "json");
        assert!(prod.enable_caller);

        let dev = development_config(vec![]);
        assert_eq!(dev.level.level(), Level::Debug);
        assert_eq!(dev.encoding, "console");
        assert!(dev.development);

        let es = production_es_config(vec![]);
        assert_eq!(es.encoder_config.name_key, "@fluentd_tag");
    }

    #[test]
    fn test_initial_fields_sorted() {
        let mut cfg = production_config(vec![]);
        cfg.initial_fields
            .insert("zebra".to_string(), serde_json::json!(1));
        cfg.initial_fields
            .insert("alpha".to_string(), serde_json::json!(2));
        let keys: Vec<_> = cfg.initial_fields.keys().cloned().collect();
        assert_eq!(keys, vec!["alpha".to_string(), "zebra".to_string()]);
    }
}

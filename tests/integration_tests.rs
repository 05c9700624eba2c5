//! Integration tests for the logger pipeline
//!
//! These tests verify:
//! - Level gating and run-time level changes
//! - Clone-on-with isolation between parent and child loggers
//! - JSON and console output shape end to end
//! - Registry behaviour and the process-default logger
//! - The sugared adapter's invalid-pair reporting

use parking_lot::Mutex;
use shiplog::core::EncoderCore;
use shiplog::prelude::field;
use shiplog::{
    add_stacktrace, development_config, production_config, AtomicLevel, Level, Logger, Result,
    StackLevel, WriteSyncer,
};
use std::sync::Arc;

struct SpySyncer {
    data: Mutex<Vec<u8>>,
}

impl SpySyncer {
    fn new() -> Arc<Self> {
        Arc::new(SpySyncer {
            data: Mutex::new(Vec::new()),
        })
    }

    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.data.lock()).into_owned()
    }

    fn lines(&self) -> Vec<String> {
        self.contents().lines().map(String::from).collect()
    }
}

impl WriteSyncer for SpySyncer {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

fn production_logger(level: Level) -> (Logger, Arc<SpySyncer>) {
    let spy = SpySyncer::new();
    let mut cfg = production_config(vec![spy.clone() as Arc<dyn WriteSyncer>]);
    cfg.level = AtomicLevel::new(level);
    cfg.enable_caller = false;
    (cfg.build([]).expect("build logger"), spy)
}

fn console_logger(level: Level) -> (Logger, Arc<SpySyncer>) {
    let spy = SpySyncer::new();
    let mut cfg = development_config(vec![spy.clone() as Arc<dyn WriteSyncer>]);
    cfg.level = AtomicLevel::new(level);
    cfg.enable_caller = false;
    cfg.development = false;
    (cfg.build([]).expect("build logger"), spy)
}

#[test]
fn test_json_header_key_order() {
    let (logger, spy) = production_logger(Level::Info);
    let logger = logger.named("svc");

    logger
        .with(&[field::int("req", 7)])
        .error("boom", &[field::string("why", "x")]);

    let line = spy.lines().remove(0);
    let positions: Vec<usize> = ["generated_time", "\"level\"", "\"log\"", "\"msg\"", "\"req\"", "\"why\""]
        .iter()
        .map(|k| line.find(k).unwrap_or_else(|| panic!("missing {} in {}", k, line)))
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted, "header keys out of order: {}", line);

    let parsed: serde_json::Value = serde_json::from_str(&line).expect("valid JSON");
    assert_eq!(parsed["level"], "ERROR");
    assert_eq!(parsed["log"], "svc");
    assert_eq!(parsed["req"], 7);
    // EnableStacktrace is off and Error sits below the gate: no stack.
    assert!(parsed.get("stack").is_none());
}

#[test]
fn test_console_line_shape() {
    let (logger, spy) = console_logger(Level::Debug);
    let logger = logger.named("svc");

    logger.info("hello", &[field::string("k", "v")]);

    let line = spy.lines().remove(0);
    let parts: Vec<&str> = line.split('\t').collect();
    assert_eq!(parts.len(), 5, "unexpected shape: {}", line);
    assert_eq!(parts[1], "INFO");
    assert_eq!(parts[2], "svc");
    assert_eq!(parts[3], "hello");
    assert_eq!(parts[4], "{\"k\":\"v\"}");
}

#[test]
fn test_level_gate_and_atomic_flip() {
    let level = AtomicLevel::new(Level::Warn);
    let spy = SpySyncer::new();
    let mut cfg = production_config(vec![spy.clone() as Arc<dyn WriteSyncer>]);
    cfg.level = level.clone();
    cfg.enable_caller = false;
    let logger = cfg.build([]).expect("build");

    logger.debug("dropped", &[]);
    logger.warn("kept", &[]);
    assert_eq!(spy.lines().len(), 1);

    // Every logger derived from the config observes the flip without
    // reconstruction.
    let derived = logger.with(&[field::string("scope", "child")]);
    level.set_level(Level::Debug);
    derived.debug("now visible", &[]);

    let lines = spy.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("now visible"));
}

#[test]
fn test_with_clone_isolation() {
    let (parent, spy) = production_logger(Level::Debug);

    let child = parent.with(&[field::string("child_key", "present")]);
    child.info("from child", &[]);
    parent.info("from parent", &[]);

    let lines = spy.lines();
    assert!(lines[0].contains("child_key"));
    assert!(
        !lines[1].contains("child_key"),
        "parent output gained the child's field: {}",
        lines[1]
    );
}

#[test]
fn test_stack_captured_at_gate_level() {
    let (logger, spy) = production_logger(Level::Debug);
    let logger = logger.with_options([add_stacktrace(StackLevel::new(Level::Error))]);

    logger.warn("no stack", &[]);
    logger.error("with stack", &[]);
    logger.fixed("status line", &[]);

    let lines = spy.lines();
    let warn: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    let error: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    let fixed: serde_json::Value = serde_json::from_str(&lines[2]).unwrap();

    assert!(warn.get("stack").is_none());
    assert!(error.get("stack").is_some());
    assert!(fixed.get("stack").is_none(), "FIXED must never carry a stack");
}

#[test]
fn test_console_stack_field_promotion() {
    let (logger, spy) = console_logger(Level::Debug);

    logger.error("failed", &[field::string("k", "v"), field::stack("stk")]);

    let out = spy.contents();
    let first_line = out.lines().next().unwrap();
    // The context block keeps only the plain field.
    assert!(first_line.ends_with("{\"k\":\"v\"}"), "line: {}", first_line);
    // The stack follows the structured block.
    assert!(out.lines().count() > 1, "stack missing: {}", out);
}

#[test]
fn test_sugared_invalid_pairs() {
    let (logger, spy) = production_logger(Level::Debug);
    let sugar = logger.sugar();

    sugar.info("odd", vec!["k".into(), 1i64.into(), "tail".into()]);
    sugar.info("bad key", vec![7i64.into(), "v".into()]);

    let out = spy.contents();
    assert!(out.contains("Ignored key without a value."));
    assert!(out.contains("Ignored key-value pairs with non-string keys."));
    assert!(out.contains("\"k\":1"));
}

#[test]
fn test_registry_global_roundtrip() {
    let spy = SpySyncer::new();
    let mut cfg = production_config(vec![spy.clone() as Arc<dyn WriteSyncer>]);
    cfg.name = "integration-registry".to_string();
    cfg.id = "integration-registry".to_string();
    cfg.enable_caller = false;
    let logger = cfg.build([]).expect("build");

    let found = shiplog::get_logger("integration-registry").expect("registered");
    found.info("via registry", &[]);
    assert!(spy.contents().contains("via registry"));

    // Re-registering the same id without force fails.
    let mut clash = production_config(vec![]);
    clash.id = "integration-registry".to_string();
    assert!(clash.build([]).is_err());

    shiplog::deregister_logger("integration-registry");
    assert!(shiplog::get_logger("integration-registry").is_none());
    drop(logger);
}

#[test]
fn test_initial_fields_on_every_record() {
    let spy = SpySyncer::new();
    let mut cfg = production_config(vec![spy.clone() as Arc<dyn WriteSyncer>]);
    cfg.enable_caller = false;
    cfg.initial_fields
        .insert("service".to_string(), serde_json::json!("api"));
    cfg.initial_fields
        .insert("az".to_string(), serde_json::json!("eu-1"));
    let logger = cfg.build([]).expect("build");

    logger.info("one", &[]);
    logger.info("two", &[]);

    for line in spy.lines() {
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["service"], "api");
        assert_eq!(parsed["az"], "eu-1");
    }
}

#[test]
fn test_custom_core_per_level_routing() {
    // Split streams: Error and above to one sink, the rest to another.
    use shiplog::encoders::{EncoderConfig, JsonEncoder};

    let low_spy = SpySyncer::new();
    let high_spy = SpySyncer::new();
    let cfg = EncoderConfig {
        level_key: "level".to_string(),
        message_key: "msg".to_string(),
        ..EncoderConfig::default()
    };

    let low = EncoderCore::new(
        Box::new(JsonEncoder::new(cfg.clone())),
        low_spy.clone(),
        Arc::new(AtomicLevel::new(Level::Debug)),
    );
    let high = EncoderCore::new(
        Box::new(JsonEncoder::new(cfg)),
        high_spy.clone(),
        Arc::new(AtomicLevel::new(Level::Error)),
    );

    let low_logger = Logger::with_core(low, []);
    let high_logger = Logger::with_core(high, []);

    low_logger.info("routine", &[]);
    high_logger.info("routine", &[]);
    high_logger.error("alarm", &[]);

    assert_eq!(low_spy.lines().len(), 1);
    let high_lines = high_spy.lines();
    assert_eq!(high_lines.len(), 1);
    assert!(high_lines[0].contains("alarm"));
}

#[test]
fn test_concurrent_emission() {
    let (logger, spy) = production_logger(Level::Debug);

    let mut handles = Vec::new();
    for t in 0..8 {
        let logger = logger.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..50 {
                logger.info("tick", &[field::int("t", t), field::int("i", i)]);
            }
        }));
    }
    for handle in handles {
        handle.join().expect("writer thread");
    }

    let lines = spy.lines();
    assert_eq!(lines.len(), 400);
    for line in lines {
        serde_json::from_str::<serde_json::Value>(&line).expect("interleaved write corrupted");
    }
}

//! Named, replaceable global logger table and the process-default logger

use super::config::development_config;
use super::error::{LoggerError, Result};
use super::field::Field;
use super::logger::Logger;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The distinguished id mirrored into the process-default logger.
pub const DEFAULT_NAME: &str = "root";

static GLOBAL: Lazy<RwLock<Logger>> = Lazy::new(|| {
    let mut cfg = development_config(vec![crate::writers::stdout()]);
    cfg.name = DEFAULT_NAME.to_string();
    // Built without an id: registration happens in the MANAGER
    // initializer, not here.
    let mut log = cfg.build([]).unwrap_or_else(|_| Logger::nop());
    log.id = DEFAULT_NAME.to_string();
    RwLock::new(log)
});

static MANAGER: Lazy<RwLock<HashMap<String, Logger>>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert(DEFAULT_NAME.to_string(), global_logger());
    RwLock::new(table)
});

/// The process-default logger.
pub fn global_logger() -> Logger {
    GLOBAL.read().clone()
}

/// Replace the process-default logger.
pub fn update_global(logger: Logger) {
    *GLOBAL.write() = logger;
}

pub(crate) fn register(logger: &Logger, force: bool) -> Result<()> {
    if logger.id.is_empty() {
        return Err(LoggerError::EmptyLoggerId);
    }
    {
        let mut table = MANAGER.write();
        if let Some(existing) = table.get(&logger.id) {
            // Only a different logger under a taken id is a conflict;
            // re-registering the same one is idempotent. Clones share
            // their core, so the core is the identity signal.
            if !force && !Arc::ptr_eq(&existing.core(), &logger.core()) {
                return Err(LoggerError::ExistedLogger(logger.id.clone()));
            }
        }
        table.insert(logger.id.clone(), logger.clone());
    }
    if logger.id == DEFAULT_NAME {
        update_global(logger.clone());
    }
    Ok(())
}

/// Register a logger under its id; fails on conflict.
pub fn register_logger(logger: &Logger) -> Result<()> {
    register(logger, false)
}

/// Register a logger under its id, replacing any existing registration.
pub fn replace_logger(logger: &Logger) -> Result<()> {
    register(logger, true)
}

/// Look up a registered logger by id.
pub fn get_logger(id: &str) -> Option<Logger> {
    MANAGER.read().get(id).cloned()
}

/// Drop a registration. The process-default logger is untouched even when
/// the root id is deregistered.
pub fn deregister_logger(id: &str) {
    MANAGER.write().remove(id);
}

// Process-default shortcuts ==============================================

#[track_caller]
pub fn debug(msg: &str, fields: &[Field]) {
    global_logger().debug(msg, fields);
}

#[track_caller]
pub fn info(msg: &str, fields: &[Field]) {
    global_logger().info(msg, fields);
}

#[track_caller]
pub fn warn(msg: &str, fields: &[Field]) {
    global_logger().warn(msg, fields);
}

#[track_caller]
pub fn error(msg: &str, fields: &[Field]) {
    global_logger().error(msg, fields);
}

#[track_caller]
pub fn critical(msg: &str, fields: &[Field]) {
    global_logger().critical(msg, fields);
}

#[track_caller]
pub fn fixed(msg: &str, fields: &[Field]) {
    global_logger().fixed(msg, fields);
}

pub fn sync() -> Result<()> {
    global_logger().sync()
}

/// Clone the process-default logger with extra context.
pub fn with(fields: &[Field]) -> Logger {
    global_logger().with(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::level::Level;

    fn named_nop(id: &str) -> Logger {
        let mut log = Logger::nop().named(id);
        log.id = id.to_string();
        log
    }

    #[test]
    fn test_register_and_get() {
        let log = named_nop("registry-test-a");
        register_logger(&log).expect("register");
        let found = get_logger("registry-test-a").expect("lookup");
        assert_eq!(found.id, "registry-test-a");
        deregister_logger("registry-test-a");
        assert!(get_logger("registry-test-a").is_none());
    }

    #[test]
    fn test_duplicate_id_needs_force() {
        let a = named_nop("registry-test-b");
        let b = named_nop("registry-test-b");
        register_logger(&a).expect("first register");

        // The same logger again is idempotent, not a conflict.
        register_logger(&a).expect("re-register same logger");

        let err = register_logger(&b).expect_err("conflict");
        assert!(matches!(err, LoggerError::ExistedLogger(_)));

        replace_logger(&b).expect("forced replace");
        deregister_logger("registry-test-b");
    }

    #[test]
    fn test_empty_id_rejected() {
        let log = Logger::nop();
        let err = register_logger(&log).expect_err("empty id");
        assert!(matches!(err, LoggerError::EmptyLoggerId));
    }

    #[test]
    fn test_root_registration_updates_global() {
        let before = global_logger();
        assert_eq!(before.id, DEFAULT_NAME);

        let mut replacement = Logger::nop().named(DEFAULT_NAME);
        replacement.id = DEFAULT_NAME.to_string();
        replace_logger(&replacement).expect("replace root");

        // The default logger mirror observed the swap: the new root is a
        // nop, so nothing is admitted.
        assert!(global_logger().check(Level::Fixed, "probe").is_none());

        // Restore a working root for other tests.
        update_global(before.clone());
        let _ = replace_logger(&before);
    }
}

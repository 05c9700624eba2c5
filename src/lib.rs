//! # shiplog
//!
//! A structured logging library built around asynchronous, disk-buffered
//! log shippers: one spools records into a flume-style sharded directory
//! tree for downstream pickup, the other ships them to a remote syslog
//! collector over TCP with a local-disk fallback.
//!
//! ## Features
//!
//! - **Leveled, typed records**: field constructors, JSON and console
//!   encoders, run-time level changes through a shared atomic cell
//! - **Shippers that never block producers**: bounded channels, disk
//!   fallback and drop-plus-report under overload
//! - **At-least-once to local disk**: rename-on-success spool files and a
//!   quota-tracked syslog cache survive downstream outages
//! - **Global registry**: named, replaceable loggers plus a
//!   process-default logger
//!
//! ## Quick start
//!
//! ```
//! use shiplog::{development_config, field};
//!
//! let logger = shiplog::global_logger();
//! logger.info("service started", &[field::string("listen", ":8080")]);
//!
//! let scoped = logger.with(&[field::int("worker", 3)]);
//! scoped.warn("queue is deep", &[field::int("depth", 512)]);
//! # let _ = development_config(vec![]);
//! ```

pub mod buffer;
pub mod core;
pub mod encoders;
pub mod macros;
pub mod writers;

pub mod prelude {
    pub use crate::core::{
        development_config, production_config, production_es_config, AtomicLevel, Config, Field,
        Level, LevelFilter, Logger, LoggerError, Result, StackLevel, SugarValue, SugaredLogger,
        TimeZone,
    };
    pub use crate::core::field;
    pub use crate::encoders::EncoderConfig;
    pub use crate::writers::flume::{FlumeWriter, Selector, SendMode};
    pub use crate::writers::syslog::{new_tcp_syslog, new_tcp_syslog2, SyslogOptions};
    pub use crate::writers::WriteSyncer;
}

pub use crate::core::field;
pub use crate::core::registry::{
    critical, debug, deregister_logger, error, fixed, get_logger, global_logger, info,
    register_logger, replace_logger, sync, update_global, warn, with, DEFAULT_NAME,
};
pub use crate::core::{
    add_caller, add_caller_skip, add_stacktrace, development, development_config,
    development_encoder_config, fields, location, production_config, production_encoder_config,
    production_es_config, production_es_encoder_config, wrap_core, AtomicLevel, CheckedEntry,
    Config, Entry, EntryCaller, Field, FieldValue, Level, LevelFilter, Logger, LoggerError,
    LoggerOption, Result, StackLevel, SugarValue, SugaredLogger, TimeZone,
};
pub use crate::encoders::{register_encoder, EncoderConfig};
pub use crate::writers::flume::FlumeWriter;
pub use crate::writers::syslog::{new_tcp_syslog, new_tcp_syslog2, SyslogOptions};
pub use crate::writers::WriteSyncer;

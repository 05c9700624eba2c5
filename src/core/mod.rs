//! Record model, logger pipeline and global registry

pub mod config;
pub mod core;
pub mod entry;
pub mod error;
pub mod field;
pub mod level;
pub mod logger;
pub mod registry;
pub mod stacktrace;
pub mod sugar;

pub use config::{
    development_config, development_encoder_config, production_config,
    production_encoder_config, production_es_config, production_es_encoder_config, Config,
};
pub use self::core::{nop_core, Core, CoreExt, EncoderCore};
pub use entry::{CheckedEntry, Entry, EntryCaller, TerminalAction, TimeZone};
pub use error::{aggregate, LoggerError, Result};
pub use field::{ArrayMarshaler, Field, FieldValue, ObjectMarshaler};
pub use level::{AtomicLevel, Level, LevelFilter, StackLevel};
pub use logger::{
    add_caller, add_caller_skip, add_stacktrace, development, error_output, fields, location,
    wrap_core, Logger, LoggerOption,
};
pub use registry::{
    deregister_logger, get_logger, global_logger, register_logger, replace_logger,
    update_global, DEFAULT_NAME,
};
pub use sugar::{SugarValue, SugaredLogger};

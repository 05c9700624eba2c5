//! Logger: caller/stack annotation, entry assembly, core invocation

use super::core::{nop_core, Core, CoreExt};
use super::entry::{CheckedEntry, Entry, EntryCaller, TerminalAction, TimeZone};
use super::field::Field;
use super::level::{Level, LevelFilter, StackLevel};
use super::stacktrace;
use super::sugar::SugaredLogger;
use crate::core::error::Result;
use crate::writers::{self, WriteSyncer};
use std::panic::Location;
use std::sync::Arc;

/// A leveled, structured logger.
///
/// Immutable as far as callers are concerned: [`Logger::with`],
/// [`Logger::named`] and [`Logger::with_options`] hand back shallow clones
/// that share the underlying core.
#[derive(Clone)]
pub struct Logger {
    core: Arc<dyn Core>,
    /// Registry handle; loggers with an empty id are never registered.
    pub id: String,
    name: String,
    development: bool,
    error_output: Arc<dyn WriteSyncer>,
    add_caller: bool,
    add_stack: Arc<dyn LevelFilter>,
    caller_skip: usize,
    time_zone: TimeZone,
}

/// Configures a [`Logger`] at construction or through
/// [`Logger::with_options`].
pub struct LoggerOption {
    apply: Box<dyn Fn(&mut Logger) + Send + Sync>,
}

impl LoggerOption {
    fn new(apply: impl Fn(&mut Logger) + Send + Sync + 'static) -> Self {
        LoggerOption {
            apply: Box::new(apply),
        }
    }
}

/// Wrap or replace the logger's underlying core.
pub fn wrap_core(
    f: impl Fn(Arc<dyn Core>) -> Arc<dyn Core> + Send + Sync + 'static,
) -> LoggerOption {
    LoggerOption::new(move |log| log.core = f(Arc::clone(&log.core)))
}

/// Add fields to every record, like a construction-time `with`.
pub fn fields(fs: Vec<Field>) -> LoggerOption {
    LoggerOption::new(move |log| log.core = log.core.with(&fs))
}

/// Route the logger's own internal errors to this syncer.
pub fn error_output(out: Arc<dyn WriteSyncer>) -> LoggerOption {
    LoggerOption::new(move |log| log.error_output = Arc::clone(&out))
}

/// Development mode: `Critical` panics after the record is written.
pub fn development() -> LoggerOption {
    LoggerOption::new(|log| log.development = true)
}

/// Annotate records with the call site.
pub fn add_caller() -> LoggerOption {
    LoggerOption::new(|log| log.add_caller = true)
}

/// Deepen stack-capture skip for wrappers around the logger.
pub fn add_caller_skip(skip: usize) -> LoggerOption {
    LoggerOption::new(move |log| log.caller_skip += skip)
}

/// Record a stack trace for all records the filter admits.
pub fn add_stacktrace(filter: impl LevelFilter + 'static) -> LoggerOption {
    let filter: Arc<dyn LevelFilter> = Arc::new(filter);
    LoggerOption::new(move |log| log.add_stack = Arc::clone(&filter))
}

/// Stamp entries in this time zone.
pub fn location(tz: TimeZone) -> LoggerOption {
    LoggerOption::new(move |log| log.time_zone = tz)
}

impl Logger {
    /// Build a logger over a custom core. A custom core is how different
    /// levels get routed to different sinks.
    pub fn with_core(
        core: Arc<dyn Core>,
        options: impl IntoIterator<Item = LoggerOption>,
    ) -> Logger {
        let log = Logger {
            core,
            id: String::new(),
            name: String::new(),
            development: false,
            error_output: writers::stderr(),
            add_caller: false,
            // Panic is never emitted, so the default gate captures nothing;
            // StackLevel keeps Fixed exempt even if the gate is lowered.
            add_stack: Arc::new(StackLevel::new(Level::Panic)),
            caller_skip: 0,
            time_zone: TimeZone::Local,
        };
        log.with_options(options)
    }

    /// A logger that never writes records or internal errors. Replacing
    /// its core through `with_options` re-enables logging.
    pub fn nop() -> Logger {
        Logger::with_core(nop_core(), [error_output(Arc::new(writers::Discard))])
    }

    pub fn core(&self) -> Arc<dyn Core> {
        Arc::clone(&self.core)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    /// Clone this logger with extra context fields.
    pub fn with(&self, fields: &[Field]) -> Logger {
        if fields.is_empty() {
            return self.clone();
        }
        let mut log = self.clone();
        log.core = log.core.with(fields);
        log
    }

    /// Clone this logger under a new name; the name feeds the encoder's
    /// name slot.
    pub fn named(&self, name: impl Into<String>) -> Logger {
        let mut log = self.clone();
        log.name = name.into();
        log
    }

    /// Clone this logger and apply the given options to the clone.
    pub fn with_options(&self, options: impl IntoIterator<Item = LoggerOption>) -> Logger {
        let mut log = self.clone();
        for opt in options {
            (opt.apply)(&mut log);
        }
        log
    }

    /// The key-value / printf adapter over this logger.
    pub fn sugar(&self) -> SugaredLogger {
        SugaredLogger::new(self.clone())
    }

    /// Flush the underlying core. Call once before dropping the last
    /// handle to a logger whose sink buffers.
    pub fn sync(&self) -> Result<()> {
        self.core.sync()
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, fields: &[Field]) {
        if let Some(ce) = self.check(Level::Debug, msg) {
            ce.write(fields);
        }
    }

    #[track_caller]
    pub fn info(&self, msg: &str, fields: &[Field]) {
        if let Some(ce) = self.check(Level::Info, msg) {
            ce.write(fields);
        }
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, fields: &[Field]) {
        if let Some(ce) = self.check(Level::Warn, msg) {
            ce.write(fields);
        }
    }

    /// Error does not capture a stack unless the stack gate admits it.
    #[track_caller]
    pub fn error(&self, msg: &str, fields: &[Field]) {
        if let Some(ce) = self.check(Level::Error, msg) {
            ce.write(fields);
        }
    }

    /// In development mode the record is written, then the thread panics.
    #[track_caller]
    pub fn critical(&self, msg: &str, fields: &[Field]) {
        if let Some(ce) = self.check(Level::Critical, msg) {
            ce.write(fields);
        }
    }

    /// The highest-priority normal record: service status lines, loaded
    /// configuration. Exempt from stack capture.
    #[track_caller]
    pub fn fixed(&self, msg: &str, fields: &[Field]) {
        if let Some(ce) = self.check(Level::Fixed, msg) {
            ce.write(fields);
        }
    }

    /// Gate a record; `Some` means at least one core accepted it (or a
    /// terminal action is pending) and the caller owes a
    /// [`CheckedEntry::write`].
    #[track_caller]
    pub fn check(&self, level: Level, msg: &str) -> Option<CheckedEntry> {
        let mut entry = Entry::new(level, msg, self.time_zone);
        entry.logger_name = self.name.clone();

        let mut ce = self.core.check(&entry, None);
        let will_write = ce.is_some();

        if level == Level::Critical && self.development {
            let base = ce.unwrap_or_else(|| CheckedEntry::new(entry.clone()));
            ce = Some(base.should(TerminalAction::WriteThenPanic));
        }

        // Entries kept only for their terminal action gain nothing from
        // annotation.
        if !will_write {
            return ce;
        }

        let mut ce = ce.expect("will_write implies a checked entry");
        ce.set_error_output(Arc::clone(&self.error_output));

        if self.add_caller {
            let loc = Location::caller();
            ce.entry.caller = EntryCaller::new(loc.file(), loc.line());
        }
        if self.add_stack.enabled(level) {
            ce.entry.stack = stacktrace::take_stacktrace_skip(self.caller_skip + 1, 0);
        }

        Some(ce)
    }
}

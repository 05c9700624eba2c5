//! Log entry, caller annotation and the gate-approved checked entry

use super::core::Core;
use super::field::Field;
use super::level::Level;
use crate::encoders::RFC3339_MILLIS;
use crate::writers::WriteSyncer;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

/// Time zone a logger stamps its entries in.
///
/// Fixed offsets cover the deployments this library targets; there is no
/// tz-database lookup here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZone {
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl TimeZone {
    /// Fixed offset east of UTC, in whole hours.
    pub fn fixed_east(hours: i32) -> TimeZone {
        TimeZone::Fixed(
            FixedOffset::east_opt(hours * 3600).expect("offset within +/-24h"),
        )
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        match self {
            TimeZone::Local => chrono::Local::now().fixed_offset(),
            TimeZone::Utc => chrono::Utc::now().fixed_offset(),
            TimeZone::Fixed(off) => chrono::Utc::now().with_timezone(off),
        }
    }
}

impl Default for TimeZone {
    fn default() -> Self {
        TimeZone::Local
    }
}

/// Call site annotation for one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryCaller {
    pub defined: bool,
    pub file: String,
    pub line: u32,
}

impl EntryCaller {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        EntryCaller {
            defined: true,
            file: file.into(),
            line,
        }
    }

    pub fn undefined() -> Self {
        EntryCaller::default()
    }

    /// `dir/file.rs:line`, keeping only the last two path components.
    pub fn trimmed_path(&self) -> String {
        if !self.defined {
            return "undefined".to_string();
        }
        let mut trimmed = self.file.as_str();
        if let Some(idx) = trimmed.rfind('/') {
            if let Some(idx2) = trimmed[..idx].rfind('/') {
                trimmed = &trimmed[idx2 + 1..];
            }
        }
        format!("{}:{}", trimmed, self.line)
    }

    pub fn full_path(&self) -> String {
        if !self.defined {
            return "undefined".to_string();
        }
        format!("{}:{}", self.file, self.line)
    }
}

/// One log record. Constructed fresh per emission and never mutated after
/// it is handed to a shipper.
#[derive(Debug, Clone)]
pub struct Entry {
    pub logger_name: String,
    pub time: DateTime<FixedOffset>,
    pub level: Level,
    pub message: String,
    pub caller: EntryCaller,
    pub stack: String,
}

impl Entry {
    pub fn new(level: Level, message: impl Into<String>, tz: TimeZone) -> Self {
        Entry {
            logger_name: String::new(),
            time: tz.now(),
            level,
            message: message.into(),
            caller: EntryCaller::undefined(),
            stack: String::new(),
        }
    }
}

/// What happens after a checked entry is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalAction {
    /// Panic the calling thread once every core has seen the record.
    WriteThenPanic,
}

/// A gate-approved entry awaiting fields and commit.
///
/// Holds the entry plus the cores that accepted it; consumed exactly once
/// by [`CheckedEntry::write`].
pub struct CheckedEntry {
    pub entry: Entry,
    cores: Vec<Arc<dyn Core>>,
    error_output: Option<Arc<dyn WriteSyncer>>,
    should: Option<TerminalAction>,
}

impl CheckedEntry {
    pub fn new(entry: Entry) -> Self {
        CheckedEntry {
            entry,
            cores: Vec::with_capacity(1),
            error_output: None,
            should: None,
        }
    }

    pub fn add_core(&mut self, core: Arc<dyn Core>) {
        self.cores.push(core);
    }

    /// Attach a terminal action honoured after the write.
    pub fn should(mut self, action: TerminalAction) -> Self {
        self.should = Some(action);
        self
    }

    pub fn set_error_output(&mut self, out: Arc<dyn WriteSyncer>) {
        self.error_output = Some(out);
    }

    pub fn will_write(&self) -> bool {
        !self.cores.is_empty()
    }

    /// Commit the entry to every accepting core.
    ///
    /// Core write failures are reported to the error-output syncer and the
    /// record is dropped there; the call itself never fails. The terminal
    /// action, if any, fires after the last core has been given the record.
    pub fn write(self, fields: &[Field]) {
        for core in &self.cores {
            if let Err(err) = core.write(&self.entry, fields) {
                if let Some(out) = &self.error_output {
                    let diag = format!(
                        "{} write error: {}\n",
                        chrono::Utc::now().format(RFC3339_MILLIS),
                        err
                    );
                    let _ = out.write(diag.as_bytes());
                    let _ = out.sync();
                }
            }
        }

        if let Some(TerminalAction::WriteThenPanic) = self.should {
            panic!("{}", self.entry.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_path() {
        let caller = EntryCaller::new("src/writers/flume/handle.rs", 42);
        assert_eq!(caller.trimmed_path(), "flume/handle.rs:42");

        let short = EntryCaller::new("main.rs", 7);
        assert_eq!(short.trimmed_path(), "main.rs:7");

        assert_eq!(EntryCaller::undefined().trimmed_path(), "undefined");
    }

    #[test]
    fn test_fixed_zone_offset() {
        let tz = TimeZone::fixed_east(8);
        let now = tz.now();
        assert_eq!(now.offset().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_entry_defaults() {
        let entry = Entry::new(Level::Info, "hello", TimeZone::Utc);
        assert!(!entry.caller.defined);
        assert!(entry.stack.is_empty());
        assert!(entry.logger_name.is_empty());
    }
}

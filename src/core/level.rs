//! Severity levels and dynamic level gates

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Log severity, ordered from least to most important.
///
/// `Fixed` sits above `Critical` and names intentional, high-importance
/// status records (startup/shutdown lines, loaded configuration) rather
/// than errors. `Panic` and `Fatal` are reserved slots kept for ordering
/// compatibility; the public logging API never emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    Debug = 0,
    #[default]
    Info = 1,
    Warn = 2,
    Error = 3,
    Critical = 4,
    Panic = 5,
    Fatal = 6,
    Fixed = 7,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
            Level::Panic => "PANIC",
            Level::Fatal => "FATAL",
            Level::Fixed => "FIXED",
        }
    }

    pub fn lowercase_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Critical => "critical",
            Level::Panic => "PANIC",
            Level::Fatal => "FATAL",
            Level::Fixed => "fixed",
        }
    }

    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            Level::Debug => Blue,
            Level::Info => Green,
            Level::Warn => Yellow,
            Level::Error => Red,
            Level::Critical => BrightRed,
            Level::Panic | Level::Fatal => BrightRed,
            Level::Fixed => Cyan,
        }
    }

    fn from_u8(v: u8) -> Level {
        match v {
            0 => Level::Debug,
            1 => Level::Info,
            2 => Level::Warn,
            3 => Level::Error,
            4 => Level::Critical,
            5 => Level::Panic,
            6 => Level::Fatal,
            _ => Level::Fixed,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" => Ok(Level::Critical),
            "PANIC" => Ok(Level::Panic),
            "FATAL" => Ok(Level::Fatal),
            "FIXED" => Ok(Level::Fixed),
            _ => Err(format!("invalid log level: '{}'", s)),
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Decides whether a record at a given level is recorded.
pub trait LevelFilter: Send + Sync {
    fn enabled(&self, level: Level) -> bool;
}

impl LevelFilter for Level {
    fn enabled(&self, level: Level) -> bool {
        level >= *self
    }
}

/// A level cell with lock-free reads and writes.
///
/// Shared by every core derived from one config, so run-time level changes
/// propagate to the whole logger tree without reconstruction.
#[derive(Debug, Clone)]
pub struct AtomicLevel(Arc<AtomicU8>);

impl AtomicLevel {
    pub fn new(level: Level) -> Self {
        AtomicLevel(Arc::new(AtomicU8::new(level as u8)))
    }

    pub fn level(&self) -> Level {
        Level::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set_level(&self, level: Level) {
        self.0.store(level as u8, Ordering::Release);
    }
}

impl Default for AtomicLevel {
    fn default() -> Self {
        AtomicLevel::new(Level::Info)
    }
}

impl LevelFilter for AtomicLevel {
    fn enabled(&self, level: Level) -> bool {
        level >= self.level()
    }
}

impl fmt::Display for AtomicLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

impl Serialize for AtomicLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.level().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AtomicLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(AtomicLevel::new(Level::deserialize(deserializer)?))
    }
}

/// Stack-capture gate: a base level that never admits `Fixed`.
///
/// `Fixed` records are status lines; their stacks carry no signal.
#[derive(Debug, Clone, Copy)]
pub struct StackLevel {
    pub level: Level,
}

impl StackLevel {
    pub fn new(level: Level) -> Self {
        StackLevel { level }
    }
}

impl LevelFilter for StackLevel {
    fn enabled(&self, level: Level) -> bool {
        if level >= Level::Fixed {
            return false;
        }
        level >= self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Critical);
        assert!(Level::Critical < Level::Fixed);
        assert!(Level::Panic < Level::Fixed);
        assert!(Level::Fatal < Level::Fixed);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("debug".parse::<Level>().unwrap(), Level::Debug);
        assert_eq!("INFO".parse::<Level>().unwrap(), Level::Info);
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("FIXED".parse::<Level>().unwrap(), Level::Fixed);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Critical.to_string(), "CRITICAL");
        assert_eq!(Level::Fixed.lowercase_str(), "fixed");
    }

    #[test]
    fn test_atomic_level() {
        let lvl = AtomicLevel::new(Level::Warn);
        assert!(!lvl.enabled(Level::Info));
        assert!(lvl.enabled(Level::Warn));
        assert!(lvl.enabled(Level::Fixed));

        let shared = lvl.clone();
        shared.set_level(Level::Debug);
        assert!(lvl.enabled(Level::Debug));
    }

    #[test]
    fn test_atomic_level_serde() {
        let lvl = AtomicLevel::new(Level::Critical);
        let json = serde_json::to_string(&lvl).unwrap();
        assert_eq!(json, "\"CRITICAL\"");

        let parsed: AtomicLevel = serde_json::from_str("\"FIXED\"").unwrap();
        assert_eq!(parsed.level(), Level::Fixed);
    }

    #[test]
    fn test_stack_level_gate() {
        let gate = StackLevel::new(Level::Warn);
        assert!(!gate.enabled(Level::Info));
        assert!(gate.enabled(Level::Warn));
        assert!(gate.enabled(Level::Critical));
        // Fixed is exempt regardless of the comparison.
        assert!(!gate.enabled(Level::Fixed));
    }
}

//! Syslog TCP writer
//!
//! Ships already-encoded records to a remote collector over raw TCP with
//! `<P>payload\n` framing, spilling to a local on-disk cache whenever the
//! network path fails, and draining that cache back out on idle ticks.
//! Two wire-compatible pipelines share the external contract: v1 batches
//! by record count through a string queue, v2 batches by bytes through a
//! single commit buffer.

pub(crate) mod conn;
pub mod manager;
mod v1;
mod v2;

pub use manager::{
    clear_syslog_writers, dial, dial_by_level, new_tcp_syslog, new_tcp_syslog2, SyslogHandle,
    UniqueSyslogWriter,
};
pub use v1::SyslogWriter;
pub use v2::SyslogWriterV2;

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::ops::Add;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// BSD syslog priority: severity plus facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub i32);

impl Priority {
    // Severities, per sys/syslog.h.
    pub const EMERG: Priority = Priority(0);
    pub const ALERT: Priority = Priority(1);
    pub const CRIT: Priority = Priority(2);
    pub const ERR: Priority = Priority(3);
    pub const WARNING: Priority = Priority(4);
    pub const NOTICE: Priority = Priority(5);
    pub const INFO: Priority = Priority(6);
    pub const DEBUG: Priority = Priority(7);

    // Facilities.
    pub const KERN: Priority = Priority(0 << 3);
    pub const USER: Priority = Priority(1 << 3);
    pub const DAEMON: Priority = Priority(3 << 3);
    pub const LOCAL0: Priority = Priority(16 << 3);
    pub const LOCAL1: Priority = Priority(17 << 3);
    pub const LOCAL2: Priority = Priority(18 << 3);
    pub const LOCAL3: Priority = Priority(19 << 3);
    pub const LOCAL4: Priority = Priority(20 << 3);
    pub const LOCAL5: Priority = Priority(21 << 3);
    pub const LOCAL6: Priority = Priority(22 << 3);
    pub const LOCAL7: Priority = Priority(23 << 3);

    /// True for a bare severity, the only thing [`dial`] accepts.
    pub fn is_severity(&self) -> bool {
        (Priority::EMERG.0..=Priority::DEBUG.0).contains(&self.0)
    }
}

impl Add for Priority {
    type Output = Priority;

    fn add(self, rhs: Priority) -> Priority {
        Priority(self.0 + rhs.0)
    }
}

/// Map a level string to its syslog severity; unknown names ship at INFO.
pub fn priority_for_level(level: &str) -> Priority {
    match level {
        "DEBUG" => Priority::DEBUG,
        "INFO" => Priority::INFO,
        "ERROR" => Priority::ERR,
        "WARNING" => Priority::WARNING,
        "CRITICAL" => Priority::CRIT,
        "FIXED" => Priority::ALERT,
        _ => Priority::INFO,
    }
}

pub(crate) fn priority_prefix(priority: Priority) -> String {
    format!("<{}>", (Priority::LOCAL0 + priority).0)
}

/// Injection seam for tests and custom transports.
pub type DialFn = Arc<dyn Fn(&str, Duration) -> io::Result<TcpStream> + Send + Sync>;

pub(crate) fn default_dial() -> DialFn {
    Arc::new(|addr, timeout| {
        let target = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))?;
        let stream = TcpStream::connect_timeout(&target, timeout)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    })
}

/// Construction-time overrides on top of the environment defaults.
#[derive(Clone, Default)]
pub struct SyslogOptions {
    pub(crate) dial_fn: Option<DialFn>,
    pub(crate) cache_dir: Option<PathBuf>,
}

impl SyslogOptions {
    pub fn new() -> Self {
        SyslogOptions::default()
    }

    /// Replace the dial function; the seam the tests use to fake the
    /// collector.
    pub fn dial_fn(mut self, dial: DialFn) -> Self {
        self.dial_fn = Some(dial);
        self
    }

    /// Override the on-disk fallback directory (`SYSLOG_BUFFER`
    /// otherwise).
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

pub(crate) fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub(crate) fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub(crate) fn env_millis(name: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

pub(crate) fn env_path(name: &str, default: &str) -> PathBuf {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    PathBuf::from(raw.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_mapping() {
        assert_eq!(priority_for_level("DEBUG"), Priority::DEBUG);
        assert_eq!(priority_for_level("ERROR"), Priority::ERR);
        assert_eq!(priority_for_level("CRITICAL"), Priority::CRIT);
        assert_eq!(priority_for_level("FIXED"), Priority::ALERT);
        assert_eq!(priority_for_level("TRACE"), Priority::INFO);
    }

    #[test]
    fn test_priority_prefix() {
        // LOG_LOCAL0 is 128; INFO is 6.
        assert_eq!(priority_prefix(Priority::INFO), "<134>");
        assert_eq!(priority_prefix(Priority::ALERT), "<129>");
    }

    #[test]
    fn test_severity_range() {
        assert!(Priority::DEBUG.is_severity());
        assert!(Priority::EMERG.is_severity());
        assert!(!Priority::LOCAL0.is_severity());
        assert!(!Priority(-1).is_severity());
    }
}

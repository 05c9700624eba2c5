//! De-duplicating, reference-counted syslog writer manager
//!
//! Several loggers in one process usually ship to the same collector;
//! the manager hands them one shared writer per `(version, raddr)` pair
//! and tears it down when the last user closes.

use super::{SyslogOptions, SyslogWriter, SyslogWriterV2};
use crate::core::error::{LoggerError, Result};
use crate::writers::syslog::{priority_for_level, Priority};
use crate::writers::WriteSyncer;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// The contract both pipeline variants satisfy.
pub trait SyslogHandle: Send + Sync {
    fn write(&self, buf: &[u8]) -> Result<usize>;
    fn sync(&self) -> Result<()>;
    fn close(&self) -> Result<()>;
}

impl SyslogHandle for SyslogWriter {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        SyslogWriter::write(self, buf)
    }

    fn sync(&self) -> Result<()> {
        SyslogWriter::sync(self)
    }

    fn close(&self) -> Result<()> {
        SyslogWriter::close(self)
    }
}

impl SyslogHandle for SyslogWriterV2 {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        SyslogWriterV2::write(self, buf)
    }

    fn sync(&self) -> Result<()> {
        SyslogWriterV2::sync(self)
    }

    fn close(&self) -> Result<()> {
        SyslogWriterV2::close(self)
    }
}

/// A reference-counted view of one shared syslog writer.
#[derive(Clone)]
pub struct UniqueSyslogWriter {
    inner: Arc<dyn SyslogHandle>,
    id: String,
    count: Arc<AtomicI32>,
}

impl UniqueSyslogWriter {
    /// Decrement the reference count; the last close tears down the
    /// underlying writer and drops it from the manager table.
    pub fn close(&self) -> Result<()> {
        let remaining = self.count.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining <= 0 {
            MANAGER.lock().remove(&self.id);
            return self.inner.close();
        }
        Ok(())
    }

    pub fn reference(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn referenced(&self) -> i32 {
        self.count.load(Ordering::Acquire)
    }
}

impl WriteSyncer for UniqueSyslogWriter {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.inner.write(buf)
    }

    fn sync(&self) -> Result<()> {
        self.inner.sync()
    }
}

static MANAGER: Lazy<Mutex<HashMap<String, UniqueSyslogWriter>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Build a writer of the requested pipeline version. `priority` must be a
/// bare severity; only TCP is spoken.
pub fn dial(
    version: u8,
    network: &str,
    raddr: &str,
    priority: Priority,
    opts: SyslogOptions,
) -> Result<Arc<dyn SyslogHandle>> {
    if !priority.is_severity() {
        return Err(LoggerError::InvalidPriority);
    }
    if network != "tcp" {
        return Err(LoggerError::UnsupportedNetwork);
    }
    match version {
        1 => Ok(Arc::new(SyslogWriter::new(raddr, priority, opts)?)),
        2 => Ok(Arc::new(SyslogWriterV2::new(raddr, priority, opts)?)),
        other => Err(LoggerError::config(
            "syslog",
            format!("unknown pipeline version {}", other),
        )),
    }
}

/// Fetch or create the shared writer for `(version, raddr)`, mapping the
/// level string to its syslog severity.
pub fn dial_by_level(
    version: u8,
    network: &str,
    raddr: &str,
    level: &str,
    opts: SyslogOptions,
) -> Result<UniqueSyslogWriter> {
    let mut table = MANAGER.lock();

    let id = format!("v{}-{}", version, raddr);
    if let Some(existing) = table.get(&id) {
        existing.reference();
        return Ok(existing.clone());
    }

    let handle = dial(version, network, raddr, priority_for_level(level), opts)?;
    let writer = UniqueSyslogWriter {
        inner: handle,
        id: id.clone(),
        count: Arc::new(AtomicI32::new(1)),
    };
    table.insert(id, writer.clone());
    Ok(writer)
}

/// v1 shipper to `raddr`, shared and INFO-tagged.
pub fn new_tcp_syslog(raddr: &str, opts: SyslogOptions) -> Result<UniqueSyslogWriter> {
    dial_by_level(1, "tcp", raddr, "INFO", opts)
}

/// v2 shipper to `raddr`, shared and INFO-tagged.
pub fn new_tcp_syslog2(raddr: &str, opts: SyslogOptions) -> Result<UniqueSyslogWriter> {
    dial_by_level(2, "tcp", raddr, "INFO", opts)
}

/// Drop one reference from every managed writer, closing those that reach
/// zero.
pub fn clear_syslog_writers() {
    let mut table = MANAGER.lock();
    let ids: Vec<String> = table.keys().cloned().collect();
    for id in ids {
        if let Some(writer) = table.get(&id) {
            let remaining = writer.count.fetch_sub(1, Ordering::AcqRel) - 1;
            if remaining <= 0 {
                let writer = table.remove(&id).expect("key just read");
                let _ = writer.inner.close();
            }
        }
    }
}

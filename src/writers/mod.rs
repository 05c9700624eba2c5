//! Byte sinks with flush, and their composition
//!
//! A [`WriteSyncer`] is the seam between the logger pipeline and anything
//! that accepts encoded records: stderr, the flume spooler, the syslog
//! shipper. Syncers are shared by reference (`Arc`); the multi-syncer owns
//! nothing and only delegates.

pub mod flume;
pub mod syslog;

use crate::core::error::{aggregate, LoggerError, Result};
use crate::encoders::RFC3339_MILLIS;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

pub trait WriteSyncer: Send + Sync {
    fn write(&self, buf: &[u8]) -> Result<usize>;
    fn sync(&self) -> Result<()>;
}

/// Serializes writes to a single `io::Write`.
pub struct Lock<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> Lock<W> {
    pub fn new(writer: W) -> Self {
        Lock {
            inner: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> WriteSyncer for Lock<W> {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut w = self.inner.lock();
        w.write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> Result<()> {
        self.inner.lock().flush()?;
        Ok(())
    }
}

/// Wrap any `io::Write` into a syncer; `sync` maps to `flush`.
pub fn add_sync<W: Write + Send + 'static>(writer: W) -> Arc<dyn WriteSyncer> {
    Arc::new(Lock::new(writer))
}

pub fn stderr() -> Arc<dyn WriteSyncer> {
    add_sync(std::io::stderr())
}

pub fn stdout() -> Arc<dyn WriteSyncer> {
    add_sync(std::io::stdout())
}

/// Discards every write; the no-op logger's error output.
pub struct Discard;

impl WriteSyncer for Discard {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        Ok(buf.len())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

struct MultiWriteSyncer {
    syncers: Vec<Arc<dyn WriteSyncer>>,
}

impl WriteSyncer for MultiWriteSyncer {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        for syncer in &self.syncers {
            let n = syncer.write(buf)?;
            if n < buf.len() {
                return Err(LoggerError::writer("short write"));
            }
        }
        Ok(buf.len())
    }

    fn sync(&self) -> Result<()> {
        let mut errs = Vec::new();
        for syncer in &self.syncers {
            if let Err(e) = syncer.sync() {
                errs.push(e);
            }
        }
        match aggregate(errs) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

/// Duplicate writes and sync calls across all given syncers.
pub fn multi(mut syncers: Vec<Arc<dyn WriteSyncer>>) -> Arc<dyn WriteSyncer> {
    if syncers.len() == 1 {
        return syncers.remove(0);
    }
    Arc::new(MultiWriteSyncer { syncers })
}

/// Timestamped internal diagnostic on stderr.
///
/// Faults inside the library cannot surface to the caller, so they land
/// here by default.
pub(crate) fn error_output(msg: &str) {
    let ts = chrono::Local::now().format(RFC3339_MILLIS);
    if msg.ends_with('\n') {
        eprint!("{} ERROR {}", ts, msg);
    } else {
        eprintln!("{} ERROR {}", ts, msg);
    }
}

pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a shipper thread, reporting any panic instead of crashing the
/// process. The thread then exits and the shipper degrades to writes
/// returning errors.
pub(crate) fn spawn_guarded(name: &str, f: impl FnOnce() + Send + 'static) {
    let label = name.to_string();
    let result = std::thread::Builder::new().name(label.clone()).spawn(move || {
        if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
            error_output(&format!("{} panicked: {}", label, panic_message(payload)));
        }
    });
    if let Err(e) = result {
        error_output(&format!("failed to spawn {}: {}", name, e));
    }
}

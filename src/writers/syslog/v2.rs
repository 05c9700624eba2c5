//! v2 pipeline: byte-batched commit buffer with a quota-tracked cache
//!
//! v2 removes v1's per-record string allocation and queue copy: framed
//! bytes accumulate in one growing buffer which is handed off to a
//! detached emit thread once it crosses the commit threshold. The disk
//! cache grows a second directory level (`<epoch%1000>/<epoch>`) so a
//! backlog of files never turns directory reads into the bottleneck, and
//! a running byte counter enforces an advisory quota.

use super::conn::ConnPool;
use super::{
    default_dial, env_i64, env_millis, env_path, priority_prefix, Priority, SyslogOptions,
};
use crate::buffer;
use crate::core::error::{LoggerError, Result};
use crate::writers::{error_output, spawn_guarded};
use crossbeam_channel::{after, bounded, Receiver, Sender, TrySendError};
use crossbeam_utils::sync::WaitGroup;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const QUEUE_CAPACITY: usize = 100_000;

pub(crate) struct V2Inner {
    self_ref: Weak<V2Inner>,
    priority_prefix: String,
    daemon: AtomicI32,
    pool: ConnPool,
    log_tx: Sender<Vec<u8>>,
    log_rx: Receiver<Vec<u8>>,
    wg: Mutex<WaitGroup>,
    cache_dir: PathBuf,
    timeout: Duration,
    commit_buffer: Mutex<Vec<u8>>,
    commit_buffer_size: usize,
    stop_rx: Receiver<()>,
    cache_quota: i64,
    cache_size: AtomicI64,
}

/// The byte-batching syslog writer.
#[derive(Clone)]
pub struct SyslogWriterV2 {
    inner: Arc<V2Inner>,
}

impl SyslogWriterV2 {
    pub fn new(raddr: &str, priority: Priority, opts: SyslogOptions) -> Result<SyslogWriterV2> {
        let cache_dir = opts
            .cache_dir
            .clone()
            .unwrap_or_else(|| env_path("SYSLOG_BUFFER", "/data/syslog_buffer2"));
        fs::create_dir_all(&cache_dir)?;

        let timeout = env_millis("SYSLOG_TIMEOUT", 3000);
        let life_time = env_millis("SYSLOG_CONN_LIFE_TIME", 100);
        let commit_buffer_size = env_i64("SYSLOG_COMMIT_BUFFER_SIZE", 1024 * 1024) as usize;
        let cache_quota = env_i64("SYSLOG_CACHE_QUOTA", 10 * 1024 * 1024 * 1024);
        let dial = opts.dial_fn.clone().unwrap_or_else(default_dial);

        let (log_tx, log_rx) = bounded(QUEUE_CAPACITY);
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let inner = Arc::new_cyclic(|weak| V2Inner {
            self_ref: weak.clone(),
            priority_prefix: priority_prefix(priority),
            daemon: AtomicI32::new(1),
            pool: ConnPool::new(raddr, dial, life_time, timeout),
            log_tx,
            log_rx,
            wg: Mutex::new(WaitGroup::new()),
            cache_dir,
            timeout,
            commit_buffer: Mutex::new(buffer::get().take()),
            commit_buffer_size,
            stop_rx,
            cache_quota,
            cache_size: AtomicI64::new(0),
        });

        // Account for whatever an earlier run left in the cache.
        inner.scan_cache(true);

        // An unreachable collector is an outage, not a construction
        // failure.
        let _ = inner.pool.create_conn();

        let pump = Arc::clone(&inner);
        spawn_guarded("syslog-v2-pump", move || pump.loop_write(stop_tx));

        Ok(SyslogWriterV2 { inner })
    }

    /// Never blocks beyond one non-blocking reserve: a full queue emits
    /// synchronously and reports `LoggerBusyNow`; a cache at 90% of quota
    /// reports `CacheNearFull` before anything is enqueued.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.inner.write(buf)
    }

    /// Drain the queue into the commit buffer and emit it.
    pub fn sync(&self) -> Result<()> {
        self.inner.sync_all();
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.inner.close();
        Ok(())
    }

    /// Total bytes currently parked in the on-disk cache.
    pub fn cache_size(&self) -> i64 {
        self.inner.cache_size.load(Ordering::Acquire)
    }
}

impl V2Inner {
    fn is_near_full(&self) -> bool {
        self.cache_size.load(Ordering::Acquire) > self.cache_quota * 90 / 100
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.daemon.load(Ordering::Acquire) == 0 {
            return Err(LoggerError::LoggerStopped);
        }
        // A nearly-full cache means the producer outruns the collector;
        // push back before the disk fills.
        if self.is_near_full() {
            return Err(LoggerError::CacheNearFull);
        }

        match self.log_tx.try_send(buf.to_vec()) {
            Ok(()) => Ok(buf.len()),
            Err(TrySendError::Full(msg)) => {
                let framed = self.frame(&msg);
                self.emit(&framed);
                Err(LoggerError::LoggerBusyNow)
            }
            Err(TrySendError::Disconnected(_)) => Err(LoggerError::LoggerStopped),
        }
    }

    fn frame(&self, msg: &[u8]) -> Vec<u8> {
        let mut framed = Vec::with_capacity(self.priority_prefix.len() + msg.len() + 1);
        framed.extend_from_slice(self.priority_prefix.as_bytes());
        framed.extend_from_slice(msg);
        if msg.last() != Some(&b'\n') {
            framed.push(b'\n');
        }
        framed
    }

    fn loop_write(&self, _stop_guard: Sender<()>) {
        // Dropping the guard on exit unblocks close().
        while self.daemon.load(Ordering::Acquire) > 0 {
            let timeout = after(self.timeout);
            crossbeam_channel::select! {
                recv(timeout) -> _ => {
                    // A quiet tick: flush what little accumulated and use
                    // the idle time to replay the disk cache.
                    self.flush_buffer();
                    self.scan_cache(false);
                }
                recv(self.log_rx) -> msg => {
                    if let Ok(msg) = msg {
                        self.write_buffer(&msg);
                    }
                }
            }
        }
    }

    fn write_buffer(&self, msg: &[u8]) {
        if msg.is_empty() {
            return;
        }
        let mut buf = self.commit_buffer.lock();
        buf.extend_from_slice(self.priority_prefix.as_bytes());
        buf.extend_from_slice(msg);
        if msg.last() != Some(&b'\n') {
            buf.push(b'\n');
        }
        if buf.len() > self.commit_buffer_size {
            let full = std::mem::replace(&mut *buf, buffer::get().take());
            drop(buf);
            self.emit_detached(full);
        }
    }

    fn flush_buffer(&self) {
        let mut buf = self.commit_buffer.lock();
        if buf.is_empty() {
            return;
        }
        let full = std::mem::replace(&mut *buf, buffer::get().take());
        drop(buf);
        self.emit_detached(full);
    }

    fn emit_detached(&self, batch: Vec<u8>) {
        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        let in_flight = self.wg.lock().clone();
        spawn_guarded("syslog-v2-emit", move || {
            this.emit(&batch);
            // Return the batch storage to the pool.
            drop(crate::buffer::PooledBuffer::from_vec(batch));
            drop(in_flight);
        });
    }

    fn emit(&self, b: &[u8]) {
        if b.is_empty() {
            return;
        }
        match self.pool.get() {
            None => self.write_file(b),
            Some(mut conn) => {
                conn.set_timeout();
                match conn.write_all(b) {
                    Ok(()) => self.pool.put(conn),
                    Err(err) => {
                        error_output(&format!("syslog send fail and write file:{}", err));
                        drop(conn);
                        self.write_file(b);
                    }
                }
            }
        }
    }

    /// Two-level cache: `cacheDir/<epoch%1000>/<epoch>`, append mode.
    ///
    /// The quota is advisory: crossing it raises a diagnostic but the
    /// write is still attempted, because dropping the bytes is strictly
    /// worse.
    fn write_file(&self, data: &[u8]) {
        if self.cache_size.load(Ordering::Acquire) + data.len() as i64 > self.cache_quota {
            error_output(&LoggerError::CacheFull.to_string());
        }

        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let dir = self.cache_dir.join((epoch % 1000).to_string());
        if !dir.is_dir() {
            let _ = fs::create_dir_all(&dir);
        }
        let path = dir.join(epoch.to_string());

        let result = open_cache_file(&path).and_then(|mut f| {
            use std::io::Write;
            f.write_all(data)
        });
        match result {
            Ok(()) => {
                self.cache_size
                    .fetch_add(data.len() as i64, Ordering::AcqRel);
            }
            Err(err) => error_output(&err.to_string()),
        }
    }

    fn scan_cache(&self, is_get_size: bool) {
        self.loop_cache_dir(&self.cache_dir.clone(), is_get_size);
    }

    /// Depth-first cache walk. With `is_get_size` it only accumulates the
    /// byte counter; otherwise every file is replayed through the commit
    /// buffer, deleted, and subtracted from the counter. Emptied subdirs
    /// are removed.
    fn loop_cache_dir(&self, dir: &Path, is_get_size: bool) {
        let entries: Vec<_> = match fs::read_dir(dir) {
            Ok(entries) => entries.flatten().collect(),
            Err(err) => {
                error_output(&err.to_string());
                return;
            }
        };
        if entries.is_empty() {
            if dir != self.cache_dir {
                let _ = fs::remove_dir(dir);
            }
            return;
        }

        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                self.loop_cache_dir(&path, is_get_size);
                continue;
            }
            if is_get_size {
                match entry.metadata() {
                    Ok(meta) => {
                        self.cache_size
                            .fetch_add(meta.len() as i64, Ordering::AcqRel);
                    }
                    Err(err) => error_output(&err.to_string()),
                }
            } else {
                let content = match fs::read(&path) {
                    Ok(content) => content,
                    Err(err) => {
                        error_output(&err.to_string());
                        continue;
                    }
                };
                if !content.is_empty() {
                    self.write_buffer(&content);
                    self.cache_size
                        .fetch_sub(content.len() as i64, Ordering::AcqRel);
                }
                let _ = fs::remove_file(&path);
            }
        }
    }

    fn sync_all(&self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.write_buffer(&msg);
        }
        self.flush_buffer();
    }

    fn close(&self) {
        self.daemon.store(0, Ordering::Release);
        // The pump drops its stop guard on exit; a disconnect here means
        // it is gone.
        let _ = self.stop_rx.recv();
        self.sync_all();
        let wg = std::mem::replace(&mut *self.wg.lock(), WaitGroup::new());
        wg.wait();
        self.pool.close();
    }
}

#[cfg(unix)]
fn open_cache_file(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .append(true)
        .custom_flags(libc::O_ASYNC)
        .open(path)
}

#[cfg(not(unix))]
fn open_cache_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .append(true)
        .open(path)
}

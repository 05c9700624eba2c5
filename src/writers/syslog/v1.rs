//! v1 pipeline: string queue, count-based batches, pooled TCP emit

use super::conn::ConnPool;
use super::{
    default_dial, env_i64, env_millis, env_path, env_usize, priority_prefix, Priority,
    SyslogOptions,
};
use crate::buffer;
use crate::core::error::{LoggerError, Result};
use crate::writers::{error_output, spawn_guarded};
use crossbeam_channel::{after, bounded, Receiver, Sender};
use crossbeam_utils::sync::WaitGroup;
use parking_lot::Mutex;
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const QUEUE_CAPACITY: usize = 100_000;
const OP_TIMEOUT: Duration = Duration::from_millis(10);

pub(crate) struct V1Inner {
    priority_prefix: String,
    daemon: AtomicI32,
    pool: ConnPool,
    queue_tx: Sender<String>,
    queue_rx: Receiver<String>,
    limit_tx: Sender<()>,
    limit_rx: Receiver<()>,
    large_tx: Sender<()>,
    large_rx: Receiver<()>,
    wg: Mutex<WaitGroup>,
    cache_dir: PathBuf,
    batch_size: usize,
    /// Retained from the env surface; the scan loop is tick-driven now.
    #[allow(dead_code)]
    linger: i64,
    timeout: Duration,
}

/// Queue -> batch -> pooled TCP emit with per-emission disk fallback.
#[derive(Clone)]
pub struct SyslogWriter {
    inner: Arc<V1Inner>,
}

impl SyslogWriter {
    pub fn new(raddr: &str, priority: Priority, opts: SyslogOptions) -> Result<SyslogWriter> {
        let cache_dir = opts
            .cache_dir
            .clone()
            .unwrap_or_else(|| env_path("SYSLOG_BUFFER", "/data/syslog_buffer"));
        fs::create_dir_all(&cache_dir)?;

        let timeout = env_millis("SYSLOG_TIMEOUT", 3000);
        let life_time = env_millis("SYSLOG_CONN_LIFE_TIME", 100);
        let dial = opts.dial_fn.clone().unwrap_or_else(default_dial);

        let (queue_tx, queue_rx) = bounded(QUEUE_CAPACITY);
        let (limit_tx, limit_rx) = bounded(30);
        let (large_tx, large_rx) = bounded(20);

        let inner = Arc::new(V1Inner {
            priority_prefix: priority_prefix(priority),
            daemon: AtomicI32::new(1),
            pool: ConnPool::new(raddr, dial, life_time, timeout),
            queue_tx,
            queue_rx,
            limit_tx,
            limit_rx,
            large_tx,
            large_rx,
            wg: Mutex::new(WaitGroup::new()),
            cache_dir,
            batch_size: env_usize("BATCH_SIZE", 1000),
            linger: env_i64("Linger", 3),
            timeout,
        });

        // An unreachable collector is an outage to ride out, not a
        // construction failure; the write path falls back to disk.
        let _ = inner.pool.create_conn();

        let pump = Arc::clone(&inner);
        spawn_guarded("syslog-v1-scan", move || pump.scan_buffer());

        Ok(SyslogWriter { inner })
    }

    pub fn write_str(&self, msg: &str) -> Result<usize> {
        self.inner.write_string(msg)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.inner.write_string(&String::from_utf8_lossy(buf))
    }

    /// Drain the queue and emit everything buffered.
    pub fn sync(&self) -> Result<()> {
        self.inner.sync_all();
        Ok(())
    }

    /// Stop the pump, drain, wait for in-flight emissions and close the
    /// pool.
    pub fn close(&self) -> Result<()> {
        self.inner.close();
        Ok(())
    }
}

impl V1Inner {
    fn write_string(&self, msg: &str) -> Result<usize> {
        if self.daemon.load(Ordering::Acquire) == 0 {
            return Err(LoggerError::LoggerStopped);
        }

        let mut framed = String::with_capacity(self.priority_prefix.len() + msg.len() + 1);
        framed.push_str(&self.priority_prefix);
        framed.push_str(msg);
        if !msg.ends_with('\n') {
            framed.push('\n');
        }

        if self
            .queue_tx
            .send_timeout(framed, OP_TIMEOUT)
            .is_err()
        {
            return Err(LoggerError::queue_full(self.queue_rx.len(), QUEUE_CAPACITY));
        }

        if self.large_rx.is_empty() && self.queue_rx.len() > self.batch_size {
            let _ = self.large_tx.try_send(());
        }
        Ok(msg.len())
    }

    fn scan_buffer(&self) {
        while self.daemon.load(Ordering::Acquire) > 0 {
            let timeout = after(self.timeout);
            crossbeam_channel::select! {
                recv(timeout) -> _ => {
                    self.write_data();
                    // A quiet tick means spare capacity; use it to replay
                    // the disk cache.
                    self.scan_file();
                }
                recv(self.large_rx) -> _ => self.sync_all(),
            }
        }
    }

    fn sync_all(&self) {
        while !self.queue_rx.is_empty() {
            self.clear_large_signal();
            self.write_data();
        }
    }

    fn clear_large_signal(&self) {
        while self.large_rx.try_recv().is_ok() {}
    }

    /// Pull up to one batch into a pooled buffer and emit it.
    fn write_data(&self) {
        let mut remaining = self.queue_rx.len();
        if remaining == 0 {
            return;
        }
        if remaining > self.batch_size {
            remaining = self.batch_size;
        }

        let mut batch = buffer::get();
        for _ in 0..remaining {
            match self.queue_rx.recv_timeout(OP_TIMEOUT) {
                Ok(record) => batch.extend_from_slice(record.as_bytes()),
                Err(_) => break,
            }
        }
        if batch.is_empty() {
            return;
        }

        let _in_flight = self.wg.lock().clone();
        self.emit(&batch);
    }

    /// One emission under the concurrency cap; every failure path lands
    /// the bytes in the disk cache.
    fn emit(&self, b: &[u8]) {
        match self.limit_tx.send_timeout((), OP_TIMEOUT) {
            Ok(()) => {
                match self.pool.get() {
                    None => self.write_file(b),
                    Some(mut conn) => {
                        conn.set_timeout();
                        match conn.write_all(b) {
                            Ok(()) => self.pool.put(conn),
                            Err(err) => {
                                error_output(&format!(
                                    "syslog send fail and write file:{}",
                                    err
                                ));
                                drop(conn);
                                self.write_file(b);
                            }
                        }
                    }
                }
                let _ = self.limit_rx.try_recv();
            }
            Err(_) => {
                error_output("flow control write file");
                self.write_file(b);
            }
        }
    }

    /// Flat cache layout: one `<unix-nanos>` file per emission.
    fn write_file(&self, data: &[u8]) {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let path = self.cache_dir.join(nanos.to_string());
        if let Err(err) = fs::write(&path, data) {
            error_output(&err.to_string());
        }
    }

    /// Replay one randomly-picked cache file.
    fn scan_file(&self) {
        let entries: Vec<_> = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries.flatten().filter(|e| e.path().is_file()).collect(),
            Err(err) => {
                error_output(&err.to_string());
                return;
            }
        };
        if entries.is_empty() {
            return;
        }

        let pick = rand::thread_rng().gen_range(0..entries.len());
        let path = entries[pick].path();
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) => {
                error_output(&err.to_string());
                Vec::new()
            }
        };
        if !content.is_empty() {
            let _in_flight = self.wg.lock().clone();
            self.emit(&content);
        }
        let _ = fs::remove_file(&path);
    }

    fn close(&self) {
        self.daemon.store(0, Ordering::Release);
        self.sync_all();
        let wg = std::mem::replace(&mut *self.wg.lock(), WaitGroup::new());
        wg.wait();
        self.pool.close();
    }
}

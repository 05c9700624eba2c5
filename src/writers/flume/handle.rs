//! Spooler state machine and background workers

use super::atomic_file;
use super::{Selector, SendMode};
use crate::buffer;
use crate::core::entry::TimeZone;
use crate::core::error::{aggregate, LoggerError, Result};
use crate::writers::{error_output, spawn_guarded};
use crossbeam_channel::{after, bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

pub(crate) struct WriteHandle {
    pub(crate) tz: TimeZone,
    pub(crate) record_tx: Sender<Vec<u8>>,
    pub(crate) record_rx: Receiver<Vec<u8>>,
    pub(crate) large_tx: Sender<()>,
    pub(crate) large_rx: Receiver<()>,
    pub(crate) done_rx: Receiver<()>,
    /// Dropping the sender disconnects every `done_rx` clone at once.
    pub(crate) done_tx: Mutex<Option<Sender<()>>>,
    pub(crate) rr_index: AtomicU64,
    pub(crate) shard_count: AtomicU64,

    pub(crate) root_path: PathBuf,
    pub(crate) temp_path: PathBuf,

    pub(crate) table: String,
    pub(crate) send_mode: SendMode,
    pub(crate) selector: Selector,
    pub(crate) durable_channel: bool,
    pub(crate) json_payload: bool,

    pub(crate) write_file_interval: Duration,
    pub(crate) flash_dir_interval: Duration,
    pub(crate) move_temp_interval: Duration,
    pub(crate) max_file_count: usize,
    pub(crate) max_log_count: usize,
    pub(crate) move_temp_enabled: bool,

    pub(crate) closed: AtomicBool,
}

impl WriteHandle {
    /// Enqueue one record, newline-terminating it when needed.
    ///
    /// Blocks on a full channel: a producer that outruns the spooler this
    /// far is throttled on purpose.
    pub(crate) fn enqueue(&self, data: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LoggerError::LoggerStopped);
        }
        let mut msg = data.to_vec();
        if !msg.ends_with(b"\n") {
            msg.push(b'\n');
        }
        let len = msg.len();
        self.record_tx
            .send(msg)
            .map_err(|_| LoggerError::LoggerStopped)?;

        if self.large_rx.is_empty() && self.record_rx.len() > self.max_log_count {
            let _ = self.large_tx.try_send(());
        }
        Ok(len)
    }

    pub(crate) fn start_workers(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        spawn_guarded("flume-monitor-buffer", move || monitor.monitor_buffer());

        let refresher = Arc::clone(self);
        spawn_guarded("flume-shard-refresh", move || refresher.flash_slice_dir());

        if self.move_temp_enabled {
            let mover = Arc::clone(self);
            spawn_guarded("flume-temp-monitor", move || mover.monitor_temp());
        }

        // Reconcile leftovers from earlier runs off the construction path.
        let reconciler = Arc::clone(self);
        spawn_guarded("flume-reconcile", move || {
            reconciler.reconcile_tmp_files();
        });
    }

    fn monitor_buffer(&self) {
        loop {
            let timeout = after(self.write_file_interval);
            crossbeam_channel::select! {
                recv(timeout) -> _ => self.write_batch(),
                recv(self.large_rx) -> _ => {
                    if self.record_rx.len() >= self.max_log_count {
                        self.large_to_flush();
                    }
                }
                recv(self.done_rx) -> _ => return,
            }
        }
    }

    fn flash_slice_dir(&self) {
        loop {
            let timeout = after(self.flash_dir_interval);
            crossbeam_channel::select! {
                recv(timeout) -> _ => {
                    if let Err(err) = self.fresh_dir() {
                        error_output(&err.to_string());
                    }
                }
                recv(self.done_rx) -> _ => return,
            }
        }
    }

    fn monitor_temp(&self) {
        loop {
            let timeout = after(self.move_temp_interval);
            crossbeam_channel::select! {
                recv(timeout) -> _ => self.move_temp_file(),
                recv(self.done_rx) -> _ => return,
            }
        }
    }

    /// Drain the queue while it stays over half the batch size.
    pub(crate) fn large_to_flush(&self) {
        while self.record_rx.len() > self.max_log_count / 2 {
            self.clear_large_signal();
            self.write_batch();
        }
    }

    /// Drain the queue to empty; the graceful-shutdown flush.
    pub(crate) fn end_to_flush(&self) {
        while !self.record_rx.is_empty() {
            self.clear_large_signal();
            self.write_batch();
        }
    }

    fn clear_large_signal(&self) {
        while self.large_rx.try_recv().is_ok() {}
    }

    /// Pull up to one batch of records and write them as a single shard
    /// file.
    pub(crate) fn write_batch(&self) {
        if self.record_rx.is_empty() {
            return;
        }

        let mut batch = buffer::get();
        let mut record_count = 0usize;
        for _ in 0..self.max_log_count {
            match self.record_rx.try_recv() {
                Ok(msg) => {
                    batch.extend_from_slice(&msg);
                    record_count += 1;
                }
                Err(_) => break,
            }
        }
        if batch.is_empty() {
            return;
        }

        let mut errs: Vec<LoggerError> = Vec::new();
        let retries = self.shard_count.load(Ordering::Acquire) as usize;
        let mut written = false;
        for _ in 0..retries.max(1) {
            let (dir, _overflow) = self.pick_dir();
            let name = format!("{}.{}", self.format_log_file_name(), record_count);
            match atomic_file::write_file_atomic(&dir.join(name), &batch) {
                Ok(_) => {
                    written = true;
                    break;
                }
                Err(err) => {
                    if matches!(
                        &err,
                        LoggerError::IoOperation { source, .. }
                            if source.kind() == std::io::ErrorKind::NotFound
                    ) {
                        // A shard vanished; re-count before the next try.
                        if let Err(fresh_err) = self.fresh_dir() {
                            errs.push(LoggerError::other(format!(
                                "freshDir: {}: {}",
                                fresh_err, err
                            )));
                            break;
                        }
                    }
                    errs.push(err);
                }
            }
        }

        if !written {
            if let Some(err) = aggregate(errs) {
                error_output(&format!("WriteFile: {}", err));
            }
            self.write_to_sys_temp(&batch, record_count);
        }
    }

    /// Last-resort spool under the OS temp dir, then the error output.
    fn write_to_sys_temp(&self, data: &[u8], record_count: usize) {
        let dir = std::env::temp_dir().join("shiplog.spool");
        if fs::create_dir_all(&dir).is_err() {
            error_output(&String::from_utf8_lossy(data));
            return;
        }
        let name = format!("{}.{}", self.format_log_file_name(), record_count);
        if atomic_file::write_file_atomic(&dir.join(name), data).is_err() {
            error_output(&String::from_utf8_lossy(data));
        }
    }

    /// `<table>.<selector>.<date>.<channel>.<payload>.<uuid>`; the caller
    /// appends the record count. The name carries enough metadata for the
    /// downstream picker to route without opening the file.
    pub(crate) fn format_log_file_name(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}.{}",
            self.table,
            self.selector as i32,
            self.tz.now().format("%Y-%m-%d"),
            i32::from(self.durable_channel),
            i32::from(self.json_payload),
            Uuid::new_v4()
        )
    }

    /// Round-robin shard pick; shard names are contiguous digits `1..N`.
    fn next_shard(&self) -> String {
        let count = self.shard_count.load(Ordering::Acquire);
        if count == 0 {
            return "1".to_string();
        }
        let index = self.rr_index.fetch_add(1, Ordering::AcqRel);
        ((index % count) + 1).to_string()
    }

    /// A send-mode directory with room, or the temp area when every shard
    /// is full.
    pub(crate) fn pick_dir(&self) -> (PathBuf, bool) {
        let retries = self.shard_count.load(Ordering::Acquire) as usize;
        for _ in 0..retries {
            let shard = self.next_shard();
            let dir = self
                .root_path
                .join(&shard)
                .join(self.send_mode.as_str());
            if !self.shard_is_full(&dir) {
                return (dir, false);
            }
        }
        (self.temp_path.join(self.send_mode.as_str()), true)
    }

    fn shard_is_full(&self, dir: &Path) -> bool {
        match fs::read_dir(dir) {
            Ok(entries) => entries.count() >= self.max_file_count,
            Err(err) => {
                error_output(&err.to_string());
                true
            }
        }
    }

    /// Re-count shard directories under the root (the `temp` entry is
    /// excluded).
    pub(crate) fn fresh_dir(&self) -> Result<()> {
        let entries = fs::read_dir(&self.root_path)?.count();
        if entries == 0 {
            return Err(LoggerError::other("root path is an empty directory"));
        }
        self.shard_count
            .store(entries.saturating_sub(1) as u64, Ordering::Release);
        Ok(())
    }

    /// Validate the on-disk tree: a non-empty root whose every non-temp
    /// shard carries the send-mode directory, plus a temp area carrying it
    /// too.
    pub(crate) fn check_init_dir(&self) -> Result<()> {
        let shards: Vec<_> = fs::read_dir(&self.root_path)?.flatten().collect();
        if shards.is_empty() {
            return Err(LoggerError::other("root path is an empty directory"));
        }
        for entry in &shards {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with("temp") {
                continue;
            }
            if !entry.path().join(self.send_mode.as_str()).is_dir() {
                return Err(LoggerError::other(format!(
                    "shard '{}' has no '{}' directory",
                    name,
                    self.send_mode.as_str()
                )));
            }
        }
        self.shard_count
            .store(shards.len().saturating_sub(1) as u64, Ordering::Release);

        let temp_entries = fs::read_dir(&self.temp_path)?.count();
        if temp_entries == 0 {
            return Err(LoggerError::other("temp path is an empty directory"));
        }
        if !self.temp_path.join(self.send_mode.as_str()).is_dir() {
            return Err(LoggerError::other(format!(
                "temp path has no '{}' directory",
                self.send_mode.as_str()
            )));
        }
        Ok(())
    }

    fn is_my_file(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.table)
    }

    /// Send-mode directories of every shard under the root.
    fn all_log_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        let Ok(shards) = fs::read_dir(&self.root_path) else {
            return dirs;
        };
        for shard in shards.flatten() {
            let candidate = shard.path().join(self.send_mode.as_str());
            if candidate.is_dir() {
                dirs.push(candidate);
            }
        }
        dirs
    }

    /// Migrate temp-area files back into shards.
    pub(crate) fn move_temp_file(&self) {
        if !self.move_temp_enabled {
            return;
        }
        let temp_dir = self.temp_path.join(self.send_mode.as_str());
        if let Err(err) = self.rename_temp_files(&temp_dir) {
            error_output(&format!("moveTempFile: {}", err));
        }
    }

    /// Strip in-flight suffixes older than twice the flush interval and
    /// move temp-area files to a shard. Files of other writers are left
    /// alone; rename races with the downstream picker are ignored.
    pub(crate) fn rename_temp_files(&self, current_dir: &Path) -> Result<()> {
        let entries = fs::read_dir(current_dir)?;
        let moving = current_dir.starts_with(&self.temp_path);
        let now = SystemTime::now();

        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !self.is_my_file(&file_name) {
                continue;
            }

            let mut target_name = file_name.clone();
            if atomic_file::is_writer_tmp_file(&file_name) {
                let age = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|mtime| now.duration_since(mtime).ok())
                    .unwrap_or_default();
                if age > self.write_file_interval * 2 {
                    target_name = atomic_file::tmp_to_final_name(&file_name);
                } else {
                    continue;
                }
            }

            if !moving && target_name == file_name {
                continue;
            }

            let old_path = current_dir.join(&file_name);
            let new_path = if moving {
                let (dir, overflow) = self.pick_dir();
                if overflow {
                    break;
                }
                dir.join(&target_name)
            } else {
                current_dir.join(&target_name)
            };

            let _ = fs::rename(&old_path, &new_path);
        }
        Ok(())
    }

    /// Walk every shard and reconcile leftover in-flight files. Returns
    /// the number of directories handled without error.
    pub(crate) fn reconcile_tmp_files(&self) -> usize {
        let mut handled = 0;
        for dir in self.all_log_dirs() {
            if self.rename_temp_files(&dir).is_ok() {
                handled += 1;
            }
        }
        handled
    }
}

pub(crate) fn make_channels(
    capacity: usize,
) -> (
    Sender<Vec<u8>>,
    Receiver<Vec<u8>>,
    Sender<()>,
    Receiver<()>,
    Sender<()>,
    Receiver<()>,
) {
    let (record_tx, record_rx) = bounded(capacity);
    let (large_tx, large_rx) = bounded(20);
    let (done_tx, done_rx) = bounded(1);
    (record_tx, record_rx, large_tx, large_rx, done_tx, done_rx)
}

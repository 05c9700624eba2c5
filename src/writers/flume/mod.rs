//! Flume directory writer
//!
//! Accepts records synchronously, buffers them in a bounded channel, and
//! flushes batches as files into a round-robin-chosen shard directory
//! under the root, spilling to the temp area when every shard is full.
//! Files appear under their final name only after a complete write (see
//! [`atomic_file`]); the name itself carries the routing metadata the
//! downstream picker needs.
//!
//! On-disk layout: `root/<shard>/<send-mode>/<file>` plus
//! `temp/<send-mode>/<file>`, with file names
//! `<table>.<selector>.<date>.<channel>.<payload>.<uuid>.<count>`.

pub mod atomic_file;
mod handle;

pub use atomic_file::{disable_fadvise, enable_fadvise};

use crate::core::entry::TimeZone;
use crate::core::error::Result;
use crate::writers::WriteSyncer;
use handle::{make_channels, WriteHandle};
use parking_lot::Mutex;
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Routing tag consumed by the downstream picker, encoded as a
/// subdirectory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    #[default]
    Multiplexing,
    Replicating,
}

impl SendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendMode::Multiplexing => "multiplexing",
            SendMode::Replicating => "replicating",
        }
    }
}

/// Destination cluster/partition tag in the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selector {
    #[default]
    Es = 0,
    Hdfs1 = 1,
    Hdfs2 = 2,
}

/// Builder for [`FlumeWriter`]; `root`, `temp` and `table` are required.
pub struct FlumeWriterBuilder {
    root_path: PathBuf,
    temp_path: PathBuf,
    table: String,
    send_mode: SendMode,
    selector: Selector,
    durable_channel: bool,
    json_payload: bool,
    write_file_interval: Duration,
    flash_dir_interval: Duration,
    move_temp_interval: Duration,
    max_file_count: usize,
    max_log_count: usize,
    buffer_capacity: usize,
    move_temp_enabled: bool,
    tz: TimeZone,
}

impl FlumeWriterBuilder {
    /// Flume channel kind is durable (`file`) and payload JSON unless
    /// overridden.
    pub fn new(
        root_path: impl Into<PathBuf>,
        temp_path: impl Into<PathBuf>,
        table: impl Into<String>,
    ) -> Self {
        FlumeWriterBuilder {
            root_path: root_path.into(),
            temp_path: temp_path.into(),
            table: table.into(),
            send_mode: SendMode::Multiplexing,
            selector: Selector::Es,
            durable_channel: true,
            json_payload: true,
            write_file_interval: Duration::from_secs(5 * 60),
            flash_dir_interval: Duration::from_secs(8 * 60),
            move_temp_interval: Duration::from_secs(8 * 60),
            max_file_count: 1000,
            max_log_count: 10_000,
            buffer_capacity: 100_000,
            move_temp_enabled: false,
            tz: TimeZone::Local,
        }
    }

    pub fn send_mode(mut self, mode: SendMode) -> Self {
        self.send_mode = mode;
        self
    }

    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    /// Flume channel kind: durable (`file`) keeps records across picker
    /// restarts, non-durable (`memory`) may drop them.
    pub fn durable_channel(mut self, durable: bool) -> Self {
        self.durable_channel = durable;
        self
    }

    /// Payload kind: JSON (semi-structured) or delimited text.
    pub fn json_payload(mut self, json: bool) -> Self {
        self.json_payload = json;
        self
    }

    /// Flush tick; also scales the in-flight-file reconciliation age.
    pub fn write_file_interval(mut self, interval: Duration) -> Self {
        self.write_file_interval = interval;
        self
    }

    /// Shard-count refresh tick. Keep it a bit below
    /// `write_file_interval * shard count` under high load.
    pub fn flash_dir_interval(mut self, interval: Duration) -> Self {
        self.flash_dir_interval = interval;
        self
    }

    pub fn move_temp_interval(mut self, interval: Duration) -> Self {
        self.move_temp_interval = interval;
        self
    }

    /// Cap on files per shard directory before the writer spills over.
    pub fn max_file_count(mut self, count: usize) -> Self {
        self.max_file_count = count;
        self
    }

    /// Cap on records per output file.
    pub fn max_log_count(mut self, count: usize) -> Self {
        self.max_log_count = count;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Periodically migrate temp-area files back into shards.
    pub fn move_temp_file(mut self) -> Self {
        self.move_temp_enabled = true;
        self
    }

    /// Time zone for the date segment of file names.
    pub fn location(mut self, tz: TimeZone) -> Self {
        self.tz = tz;
        self
    }

    /// Validate the on-disk tree and start the background workers.
    pub fn build(self) -> Result<FlumeWriter> {
        let (record_tx, record_rx, large_tx, large_rx, done_tx, done_rx) =
            make_channels(self.buffer_capacity);

        let handle = Arc::new(WriteHandle {
            tz: self.tz,
            record_tx,
            record_rx,
            large_tx,
            large_rx,
            done_rx,
            done_tx: Mutex::new(Some(done_tx)),
            rr_index: AtomicU64::new(0),
            shard_count: AtomicU64::new(0),
            root_path: self.root_path,
            temp_path: self.temp_path,
            table: self.table,
            send_mode: self.send_mode,
            selector: self.selector,
            durable_channel: self.durable_channel,
            json_payload: self.json_payload,
            write_file_interval: self.write_file_interval,
            flash_dir_interval: self.flash_dir_interval,
            move_temp_interval: self.move_temp_interval,
            max_file_count: self.max_file_count,
            max_log_count: self.max_log_count,
            move_temp_enabled: self.move_temp_enabled,
            closed: AtomicBool::new(false),
        });

        handle.check_init_dir()?;

        // Start round-robin at a random shard so parallel writers spread
        // out.
        let count = handle.shard_count.load(Ordering::Acquire);
        if count > 0 {
            handle
                .rr_index
                .store(rand::thread_rng().gen::<u64>() % count, Ordering::Release);
        }

        handle.start_workers();
        Ok(FlumeWriter { handle })
    }
}

/// The sharded-directory async spooler.
///
/// Cloning shares the spooler; `close` on any clone stops it for all.
#[derive(Clone)]
pub struct FlumeWriter {
    handle: Arc<WriteHandle>,
}

impl FlumeWriter {
    pub fn builder(
        root_path: impl Into<PathBuf>,
        temp_path: impl Into<PathBuf>,
        table: impl Into<String>,
    ) -> FlumeWriterBuilder {
        FlumeWriterBuilder::new(root_path, temp_path, table)
    }

    /// Stop the workers, drain the buffer to disk and migrate temp files.
    /// Later writes fail with `LoggerStopped`.
    pub fn close(&self) -> Result<()> {
        if !self.handle.closed.swap(true, Ordering::AcqRel) {
            // Broadcast shutdown by dropping the done sender.
            self.handle.done_tx.lock().take();
        }
        self.sync()
    }

    /// Walk the shard tree and strip in-flight suffixes old enough to be
    /// abandoned. Returns the number of directories handled.
    pub fn reconcile_tmp_files(&self) -> usize {
        self.handle.reconcile_tmp_files()
    }
}

impl WriteSyncer for FlumeWriter {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.handle.enqueue(buf)
    }

    fn sync(&self) -> Result<()> {
        self.handle.end_to_flush();
        self.handle.move_temp_file();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn make_tree(shards: usize) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let base = tempdir().expect("tempdir");
        let root = base.path().join("flume");
        let temp = root.join("temp");
        for shard in 1..=shards {
            fs::create_dir_all(root.join(shard.to_string()).join("multiplexing"))
                .expect("shard dir");
        }
        fs::create_dir_all(temp.join("multiplexing")).expect("temp dir");
        (base, root, temp)
    }

    fn shard_files(root: &PathBuf, shards: usize) -> Vec<(String, PathBuf)> {
        let mut files = Vec::new();
        for shard in 1..=shards {
            let dir = root.join(shard.to_string()).join("multiplexing");
            for entry in fs::read_dir(&dir).expect("read shard").flatten() {
                files.push((
                    entry.file_name().to_string_lossy().into_owned(),
                    entry.path(),
                ));
            }
        }
        files
    }

    #[test]
    fn test_records_distributed_across_shards() {
        let (_base, root, temp) = make_tree(2);
        let writer = FlumeWriter::builder(&root, &temp, "svc")
            .max_file_count(2)
            .max_log_count(3)
            .build()
            .expect("build");

        for i in 0..7 {
            writer
                .write(format!("record-{}", i).as_bytes())
                .expect("write");
        }
        writer.sync().expect("sync");

        let files = shard_files(&root, 2);
        assert!(!files.is_empty());

        let mut total_records = 0usize;
        for (name, path) in &files {
            // Name schema: table.selector.date.channel.payload.uuid.count
            assert!(name.starts_with("svc.0."), "unexpected name {}", name);
            assert!(!name.ends_with(".tmp"), "tmp file visible: {}", name);
            let segments: Vec<&str> = name.split('.').collect();
            assert_eq!(segments.len(), 7, "schema mismatch: {}", name);
            assert_eq!(segments[3], "1");
            assert_eq!(segments[4], "1");

            let declared: usize = segments[6].parse().expect("count suffix");
            let content = fs::read_to_string(path).expect("read file");
            let actual = content.lines().count();
            assert_eq!(declared, actual, "count suffix wrong for {}", name);
            assert!(declared <= 3);
            total_records += actual;
        }
        assert_eq!(total_records, 7);

        writer.close().expect("close");
    }

    #[test]
    fn test_write_appends_newline_once() {
        let (_base, root, temp) = make_tree(1);
        let writer = FlumeWriter::builder(&root, &temp, "svc")
            .build()
            .expect("build");

        assert_eq!(writer.write(b"plain").unwrap(), 6);
        assert_eq!(writer.write(b"terminated\n").unwrap(), 11);
        writer.sync().unwrap();

        let files = shard_files(&root, 1);
        let content: String = files
            .iter()
            .map(|(_, p)| fs::read_to_string(p).unwrap())
            .collect();
        assert!(content.contains("plain\n"));
        assert!(!content.contains("terminated\n\n"));
        writer.close().unwrap();
    }

    #[test]
    fn test_write_after_close_fails() {
        let (_base, root, temp) = make_tree(1);
        let writer = FlumeWriter::builder(&root, &temp, "svc")
            .build()
            .expect("build");
        writer.close().expect("close");
        assert!(writer.write(b"late").is_err());
    }

    #[test]
    fn test_build_rejects_bad_tree() {
        let base = tempdir().expect("tempdir");
        let root = base.path().join("empty-root");
        fs::create_dir_all(&root).unwrap();
        let temp = base.path().join("temp");
        fs::create_dir_all(temp.join("multiplexing")).unwrap();

        // Empty root.
        assert!(FlumeWriter::builder(&root, &temp, "svc").build().is_err());

        // Shard without the send-mode directory.
        fs::create_dir_all(root.join("1")).unwrap();
        assert!(FlumeWriter::builder(&root, &temp, "svc").build().is_err());
    }

    #[test]
    fn test_overflow_spills_to_temp() {
        let (_base, root, temp) = make_tree(1);
        let writer = FlumeWriter::builder(&root, &temp, "svc")
            .max_file_count(0) // every shard is immediately full
            .max_log_count(10)
            .build()
            .expect("build");

        writer.write(b"spilled").expect("write");
        writer.sync().expect("sync");

        let spilled: Vec<_> = fs::read_dir(temp.join("multiplexing"))
            .expect("read temp")
            .flatten()
            .collect();
        assert_eq!(spilled.len(), 1);
        writer.close().unwrap();
    }

    #[test]
    fn test_tmp_reconciliation() {
        let (_base, root, temp) = make_tree(1);
        let writer = FlumeWriter::builder(&root, &temp, "svc")
            .write_file_interval(Duration::from_millis(1))
            .build()
            .expect("build");

        // A stale in-flight file owned by this writer, plus a foreign one.
        let shard_dir = root.join("1").join("multiplexing");
        let stale = shard_dir.join("svc.0.2024-01-02.1.1.u.5__Ab12.tmp");
        let foreign = shard_dir.join("other.0.2024-01-02.1.1.u.5__Ab12.tmp");
        fs::write(&stale, b"data\n").unwrap();
        fs::write(&foreign, b"data\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        writer.reconcile_tmp_files();

        assert!(!stale.exists(), "stale tmp file not renamed");
        assert!(shard_dir.join("svc.0.2024-01-02.1.1.u.5").exists());
        assert!(foreign.exists(), "foreign file must be left alone");
        writer.close().unwrap();
    }
}

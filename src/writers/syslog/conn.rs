//! Short-lived TCP connection pool

use super::DialFn;
use crate::core::error::{LoggerError, Result};
use crate::writers::error_output;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::Write;
use std::net::TcpStream;
use std::time::{Duration, Instant};

pub(crate) struct SysConn {
    stream: TcpStream,
    created: Instant,
    life_time: Duration,
    timeout: Duration,
}

impl SysConn {
    /// Arm the per-write deadline.
    pub(crate) fn set_timeout(&self) {
        let _ = self.stream.set_write_timeout(Some(self.timeout));
    }

    /// Connections are rotated after a short life so a dead collector is
    /// noticed quickly and load spreads across its replicas.
    fn is_old(&self) -> bool {
        self.created.elapsed() > self.life_time
    }

    pub(crate) fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(buf)
    }
}

/// Bounded FIFO of up to 30 connections. A failed dial leaves an empty
/// sentinel so getters skip it instead of blocking.
pub(crate) struct ConnPool {
    queue_tx: Sender<Option<SysConn>>,
    queue_rx: Receiver<Option<SysConn>>,
    op_timeout: Duration,
    dial: DialFn,
    raddr: String,
    life_time: Duration,
    timeout: Duration,
}

impl ConnPool {
    pub(crate) fn new(
        raddr: impl Into<String>,
        dial: DialFn,
        life_time: Duration,
        timeout: Duration,
    ) -> ConnPool {
        let (queue_tx, queue_rx) = bounded(30);
        ConnPool {
            queue_tx,
            queue_rx,
            op_timeout: Duration::from_millis(10),
            dial,
            raddr: raddr.into(),
            life_time,
            timeout,
        }
    }

    pub(crate) fn create_conn(&self) -> Result<()> {
        match (self.dial)(&self.raddr, self.timeout) {
            Ok(stream) => {
                self.put_entry(Some(SysConn {
                    stream,
                    created: Instant::now(),
                    life_time: self.life_time,
                    timeout: self.timeout,
                }));
                Ok(())
            }
            Err(err) => {
                error_output(&err.to_string());
                self.put_entry(None);
                Err(LoggerError::from(err))
            }
        }
    }

    fn put_entry(&self, entry: Option<SysConn>) {
        let _ = self.queue_tx.send_timeout(entry, self.op_timeout);
    }

    /// Pop entries until a live connection turns up, discarding expired
    /// ones and skipping sentinels. Dials synchronously when the pool is
    /// empty.
    pub(crate) fn get(&self) -> Option<SysConn> {
        let mut len = self.queue_rx.len();
        if len == 0 {
            let _ = self.create_conn();
            len = 1;
        }
        for _ in 0..len {
            match self.queue_rx.recv_timeout(self.op_timeout) {
                Ok(Some(conn)) => {
                    if conn.is_old() {
                        continue;
                    }
                    return Some(conn);
                }
                Ok(None) => continue,
                Err(_) => continue,
            }
        }
        None
    }

    pub(crate) fn put(&self, conn: SysConn) {
        self.put_entry(Some(conn));
    }

    pub(crate) fn close(&self) {
        while let Ok(entry) = self.queue_rx.try_recv() {
            drop(entry);
        }
    }
}

//! Reusable byte buffers
//!
//! Two pools: a line-buffer pool handing out 1 KiB append-only buffers for
//! encoders and flush batches, and a [`BytePool`] with power-of-two capacity
//! classes for larger transfer buffers.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};

const LINE_BUFFER_SIZE: usize = 1024;
const MAX_FREE_PER_CLASS: usize = 32;

static LINE_POOL: Lazy<Mutex<Vec<Vec<u8>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Get a pooled line buffer; storage returns to the pool on drop.
pub fn get() -> PooledBuffer {
    let buf = LINE_POOL
        .lock()
        .pop()
        .unwrap_or_else(|| Vec::with_capacity(LINE_BUFFER_SIZE));
    PooledBuffer { buf }
}

fn put_line(mut buf: Vec<u8>) {
    if buf.capacity() == 0 {
        return;
    }
    buf.clear();
    let mut free = LINE_POOL.lock();
    if free.len() < MAX_FREE_PER_CLASS {
        free.push(buf);
    }
}

/// An append-only byte buffer borrowed from the line pool.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
}

impl PooledBuffer {
    /// Detach the storage from the pool guard.
    pub fn take(mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Adopt storage into the pool guard; it returns to the pool on drop.
    pub fn from_vec(buf: Vec<u8>) -> PooledBuffer {
        PooledBuffer { buf }
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        put_line(std::mem::take(&mut self.buf));
    }
}

/// Byte pool with capacity classes stepping by a fixed factor.
///
/// `get` serves from the smallest class that fits; `put` demotes the buffer
/// to the largest class whose size does not exceed its capacity, so a grown
/// buffer re-enters the pool where it now belongs. Zero-length puts are
/// ignored, oversized requests fall through to plain allocation.
pub struct BytePool {
    classes: Vec<Mutex<Vec<Vec<u8>>>>,
    sizes: Vec<usize>,
    min_size: usize,
    max_size: usize,
}

pub const BYTE_1: usize = 1;
pub const BYTE_4K: usize = 4 * 1024;
pub const BYTE_64K: usize = 64 * 1024;
pub const BYTE_1M: usize = 1024 * 1024;
pub const BYTE_4M: usize = 4 * 1024 * 1024;

impl BytePool {
    pub fn new(min_size: usize, max_size: usize, factor: usize) -> BytePool {
        assert!(min_size >= 1 && factor >= 2 && max_size >= min_size);
        let mut sizes = Vec::new();
        let mut chunk = min_size;
        while chunk <= max_size {
            sizes.push(chunk);
            chunk *= factor;
        }
        let classes = sizes.iter().map(|_| Mutex::new(Vec::new())).collect();
        BytePool {
            classes,
            sizes,
            min_size,
            max_size,
        }
    }

    /// Index of the smallest class whose size is >= `size`.
    fn class_index(&self, size: usize) -> usize {
        self.sizes.partition_point(|&s| s < size)
    }

    pub fn get(&self, size: usize) -> Vec<u8> {
        if size == 0 {
            return Vec::new();
        }
        if size <= self.max_size {
            let idx = self.class_index(size);
            if let Some(mut buf) = self.classes[idx].lock().pop() {
                buf.resize(size, 0);
                return buf;
            }
            let mut buf = Vec::with_capacity(self.sizes[idx]);
            buf.resize(size, 0);
            return buf;
        }
        vec![0; size]
    }

    pub fn put(&self, mem: Vec<u8>) {
        if mem.capacity() == 0 {
            return;
        }
        let cap = mem.capacity();
        if cap > self.max_size {
            return;
        }
        let mut idx = self.class_index(cap);
        if idx >= self.sizes.len() || cap < self.sizes[idx] {
            // Demote to the largest class the capacity can actually serve.
            if idx == 0 {
                return;
            }
            idx -= 1;
        }
        let mut free = self.classes[idx].lock();
        if free.len() < MAX_FREE_PER_CLASS {
            free.push(mem);
        }
    }

    pub fn class_count(&self) -> usize {
        self.sizes.len()
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// Process-default byte pool, disabled by setting the
/// `GO_ENABLE_DEFAULT_BYTE_POOL` environment variable to a false value.
pub static DEFAULT_BYTE_POOL: Lazy<Option<BytePool>> = Lazy::new(|| {
    let flag = std::env::var("GO_ENABLE_DEFAULT_BYTE_POOL").unwrap_or_default();
    if flag.is_empty() || flag.parse::<bool>().unwrap_or(false) {
        Some(BytePool::new(BYTE_1, BYTE_4M, 2))
    } else {
        None
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pooled_buffer_roundtrip() {
        let mut buf = get();
        buf.extend_from_slice(b"hello");
        assert_eq!(&buf[..], b"hello");
        drop(buf);

        let again = get();
        assert!(again.is_empty());
    }

    #[test]
    fn test_byte_pool_class_sizes() {
        let pool = BytePool::new(1, 1024, 2);
        assert_eq!(pool.class_count(), 11);
        assert_eq!(pool.min_size(), 1);
        assert_eq!(pool.max_size(), 1024);
    }

    #[test]
    fn test_byte_pool_get_len() {
        let pool = BytePool::new(1, 4096, 2);
        let buf = pool.get(100);
        assert_eq!(buf.len(), 100);
        assert!(buf.capacity() >= 128);

        // Oversized requests are plain allocations.
        let big = pool.get(1 << 20);
        assert_eq!(big.len(), 1 << 20);
    }

    #[test]
    fn test_byte_pool_put_demotes() {
        let pool = BytePool::new(1, 4096, 2);
        // Capacity 100 sits between the 64 and 128 classes; it must land
        // in the 64 class so later gets never see a short buffer.
        let mut buf = Vec::with_capacity(100);
        buf.push(1u8);
        pool.put(buf);

        let got = pool.get(64);
        assert!(got.capacity() >= 64);
    }

    #[test]
    fn test_byte_pool_ignores_empty() {
        let pool = BytePool::new(1, 4096, 2);
        pool.put(Vec::new());
        let got = pool.get(8);
        assert_eq!(got.len(), 8);
    }
}

//! Bounded pool of small encoding buffers.
//!
//! Encoders are created and destroyed in short order but each may use many
//! small chunks while building a message. The pool caps the number of
//! retained buffers; an empty pool allocates fresh and a full pool lets
//! returned buffers drop.

use crossbeam::queue::ArrayQueue;

/// Default size of one pooled buffer.
pub const DEFAULT_BUF_SIZE: usize = 64;

/// Bounded lock-free free list of encoding buffers.
pub struct BufferPool {
    free: ArrayQueue<Vec<u8>>,
    buf_size: usize,
}

impl BufferPool {
    /// Create a pool retaining at most `capacity` buffers of `buf_size` bytes.
    pub fn new(capacity: usize, buf_size: usize) -> Self {
        Self {
            free: ArrayQueue::new(capacity.max(1)),
            buf_size,
        }
    }

    /// Create a pool sized for this host: `cores * 2` concurrent encoders
    /// at up to 200 chunks each.
    pub fn for_host() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(cores * 2 * 200, DEFAULT_BUF_SIZE)
    }

    /// Take a buffer, allocating when the free list is empty.
    pub(crate) fn get(&self) -> Vec<u8> {
        self.free
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.buf_size))
    }

    /// Return a buffer. Dropped when the free list is full.
    pub(crate) fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        if self.free.push(buf).is_err() {
            tracing::trace!(target: "snmp_engine::ber", "buffer pool full, dropping buffer");
        }
    }

    /// Number of buffers currently retained.
    pub fn retained(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_from_empty_pool_allocates() {
        let pool = BufferPool::new(2, 64);
        let buf = pool.get();
        assert_eq!(buf.len(), 0);
        assert!(buf.capacity() >= 64);
    }

    #[test]
    fn test_put_then_get_reuses() {
        let pool = BufferPool::new(2, 64);
        let mut buf = pool.get();
        buf.extend_from_slice(b"data");
        pool.put(buf);
        assert_eq!(pool.retained(), 1);

        // Returned buffer comes back cleared
        let buf = pool.get();
        assert!(buf.is_empty());
        assert_eq!(pool.retained(), 0);
    }

    #[test]
    fn test_full_pool_drops_returns() {
        let pool = BufferPool::new(1, 64);
        pool.put(Vec::new());
        pool.put(Vec::new());
        assert_eq!(pool.retained(), 1);
    }
}

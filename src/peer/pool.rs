use crossbeam::queue::ArrayQueue;
use std::sync::Arc;

/// Standard block size (16 KB)
pub const BLOCK_SIZE: usize = 16 * 1024;
pub const DEFAULT_POOL_BUFFERS: usize = 256;

/// Fixed-capacity buffers for piece payloads, shared between connections.
///
/// The decoder takes a buffer for every Piece message it reads and hands it to
/// the caller inside the message. Giving it back with [`put`](Self::put) once
/// the data has been consumed is up to the caller.
pub struct PieceBufferPool {
    buffers: ArrayQueue<Vec<u8>>,
    buffer_capacity: usize,
}

impl PieceBufferPool {
    pub fn new(buffer_capacity: usize, max_buffers: usize) -> Arc<Self> {
        Arc::new(Self {
            buffers: ArrayQueue::new(max_buffers.max(1)),
            buffer_capacity,
        })
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    pub fn get(&self) -> Vec<u8> {
        self.buffers
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_capacity))
    }

    /// Buffers smaller than the pool's capacity, or returned to a full pool,
    /// are dropped.
    pub fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() < self.buffer_capacity {
            return;
        }
        buf.clear();
        let _ = self.buffers.push(buf);
    }

    pub fn available(&self) -> usize {
        self.buffers.len()
    }
}

impl Default for PieceBufferPool {
    fn default() -> Self {
        Self {
            buffers: ArrayQueue::new(DEFAULT_POOL_BUFFERS),
            buffer_capacity: BLOCK_SIZE,
        }
    }
}

//! Reusable part buffers.
//!
//! Every buffer is exactly one part long. A part task holds a
//! [`PooledBuffer`] for the duration of its read and upload; dropping the
//! guard puts the buffer back, so release happens on every exit path
//! including errors, cancellation and panics.
//!
//! Buffers are not zeroed on reuse. Callers only look at the prefix they
//! just filled.
//!
//! The free list keeps at most `max_idle` buffers; anything released past
//! that is dropped, so a burst of unbounded parallelism does not pin a
//! file's worth of memory for the pool's lifetime.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Thread-safe free list of fixed-size byte buffers.
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_idle: usize,
    allocated: AtomicUsize,
    outstanding: AtomicUsize,
}

impl BufferPool {
    /// Create an empty pool handing out buffers of `buffer_size` bytes and
    /// keeping every released buffer.
    pub fn new(buffer_size: usize) -> Arc<Self> {
        Self::with_max_idle(buffer_size, usize::MAX)
    }

    /// Create an empty pool that keeps at most `max_idle` free buffers.
    ///
    /// # Arguments
    /// * `buffer_size` - Size of every buffer in bytes
    /// * `max_idle` - Free buffers retained after release; extras are freed
    pub fn with_max_idle(buffer_size: usize, max_idle: usize) -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::new()),
            buffer_size,
            max_idle,
            allocated: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
        })
    }

    /// Take a buffer from the pool, allocating one if none is free.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let pooled: Option<Vec<u8>> = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let data: Vec<u8> = pooled.unwrap_or_else(|| {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            vec![0u8; self.buffer_size]
        });
        self.outstanding.fetch_add(1, Ordering::AcqRel);

        PooledBuffer {
            data: Some(data),
            pool: Arc::clone(self),
        }
    }

    /// Return a buffer to the pool, or free it if the pool is full.
    fn release(&self, buffer: Vec<u8>) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(buffer);
        }
    }

    /// Size of every buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Maximum number of free buffers kept.
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    /// Buffers currently sitting in the free list.
    pub fn available(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Buffers acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Total buffers allocated over the pool's lifetime.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.buffer_size)
            .field("max_idle", &self.max_idle)
            .field("available", &self.available())
            .field("outstanding", &self.outstanding())
            .field("allocated", &self.allocated())
            .finish()
    }
}

/// A buffer on loan from a [`BufferPool`]; released on drop.
pub struct PooledBuffer {
    data: Option<Vec<u8>>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.release(data);
        }
    }
}

// BufferPool - lock-free pool of timestamped microphone buffers
//
// Two SPSC ring buffers move pre-allocated buffers between the input callback
// and the practice worker without touching the allocator on the audio thread.
//
// Architecture:
// - DATA_QUEUE: input callback pushes filled buffers, practice worker consumes
// - POOL_QUEUE: practice worker returns drained buffers, input callback recycles
//
// Every filled buffer carries the AudioClock time of its first sample so the
// worker can timestamp analysis frames exactly, even when it drains several
// buffers in one loop iteration.

use rtrb::{Consumer, Producer};

/// Configuration constants for buffer pool
pub const DEFAULT_BUFFER_COUNT: usize = 64;
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Mono microphone samples stamped with the AudioClock time of the first sample
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub time: f64,
}

impl AudioBuffer {
    /// Empty buffer with room for `capacity` samples
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            time: 0.0,
        }
    }

    /// Replace contents with `samples`, truncated to the pre-allocated capacity
    ///
    /// Never reallocates, so it is safe to call from the input callback.
    pub fn fill_from(&mut self, samples: impl Iterator<Item = f32>, time: f64) {
        let capacity = self.samples.capacity();
        self.samples.clear();
        self.samples.extend(samples.take(capacity));
        self.time = time;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Both ends of both queues, as created by [`BufferPool::new`]
pub struct BufferPoolChannels {
    pub data_producer: Producer<AudioBuffer>,
    pub data_consumer: Consumer<AudioBuffer>,
    pub pool_producer: Producer<AudioBuffer>,
    pub pool_consumer: Consumer<AudioBuffer>,
}

/// Queue ends owned by the input callback
pub struct AudioThreadChannels {
    /// Drained buffers ready to be filled
    pub pool_consumer: Consumer<AudioBuffer>,
    /// Filled buffers handed to the worker
    pub data_producer: Producer<AudioBuffer>,
}

/// Queue ends owned by the practice worker
pub struct AnalysisThreadChannels {
    /// Filled buffers from the input callback
    pub data_consumer: Consumer<AudioBuffer>,
    /// Drained buffers going back to the pool
    pub pool_producer: Producer<AudioBuffer>,
}

impl BufferPoolChannels {
    /// Split into the halves owned by each thread
    pub fn split_for_threads(self) -> (AudioThreadChannels, AnalysisThreadChannels) {
        (
            AudioThreadChannels {
                pool_consumer: self.pool_consumer,
                data_producer: self.data_producer,
            },
            AnalysisThreadChannels {
                data_consumer: self.data_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

impl AnalysisThreadChannels {
    /// Pop the next filled buffer, if any
    pub fn pop(&mut self) -> Option<AudioBuffer> {
        self.data_consumer.pop().ok()
    }

    /// Return a drained buffer to the pool
    pub fn recycle(&mut self, buffer: AudioBuffer) {
        if self.pool_producer.push(buffer).is_err() {
            tracing::warn!("[BufferPool] Pool queue full, dropping buffer");
        }
    }
}

/// Lock-free buffer pool using dual SPSC ring buffers
///
/// All heap allocations happen here; afterwards buffers only circulate.
///
/// # Example
/// ```ignore
/// let (mut audio, mut analysis) = BufferPool::new(16, 2048).split_for_threads();
///
/// // In the input callback:
/// if let Ok(mut buffer) = audio.pool_consumer.pop() {
///     buffer.fill_from(data.iter().copied(), capture_time);
///     audio.data_producer.push(buffer).ok();
/// }
///
/// // In the practice worker:
/// if let Some(buffer) = analysis.pop() {
///     // analyse buffer.samples stamped at buffer.time
///     analysis.recycle(buffer);
/// }
/// ```
pub struct BufferPool;

impl BufferPool {
    /// Create a pool of `buffer_count` buffers holding up to `buffer_size` samples each
    ///
    /// # Panics
    /// Panics if buffer_count is 0 or buffer_size is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> BufferPoolChannels {
        assert!(buffer_count > 0, "buffer_count must be greater than 0");
        assert!(buffer_size > 0, "buffer_size must be greater than 0");

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        for _ in 0..buffer_count {
            // Capacity equals buffer_count, so this cannot fail
            let _ = pool_producer.push(AudioBuffer::with_capacity(buffer_size));
        }

        BufferPoolChannels {
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
        }
    }
}

//! AudioClock - monotonic time tied to the audio device
//!
//! All scheduling and matching happens in these seconds rather than wall-clock
//! time: the clock only advances while the output device consumes frames, so
//! a stalled worker thread or a system sleep never shifts the beat grid.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic, non-decreasing audio time source
pub trait AudioClock: Send + Sync {
    /// Current audio time in seconds
    fn now(&self) -> f64;
}

/// Clock derived from the frame counter of a running output stream
///
/// The output callback advances the counter by the number of frames it
/// renders, so `now()` is exactly the playback position of the device.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame_counter: Arc<AtomicU64>,
    sample_rate: u32,
}

impl FrameClock {
    pub fn new(frame_counter: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self {
            frame_counter,
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frame index corresponding to an audio time
    pub fn frame_at(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }
}

impl AudioClock for FrameClock {
    fn now(&self) -> f64 {
        self.frame_counter.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }
}

/// Manually driven clock for tests, stubs and offline replay
///
/// Time is stored in nanoseconds and can only move forward.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock to `seconds`; earlier values are ignored
    pub fn set(&self, seconds: f64) {
        let nanos = (seconds.max(0.0) * 1e9).round() as u64;
        self.nanos.fetch_max(nanos, Ordering::AcqRel);
    }

    /// Advance the clock by `seconds`
    pub fn advance(&self, seconds: f64) {
        let delta = (seconds.max(0.0) * 1e9).round() as u64;
        self.nanos.fetch_add(delta, Ordering::AcqRel);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.nanos.load(Ordering::Acquire) as f64 / 1e9
    }
}

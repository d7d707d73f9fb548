use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::audio::buffer_pool::{AudioThreadChannels, BufferPool};
use crate::audio::click::ClickLog;
use crate::audio::clock::ManualClock;
use crate::error::AudioError;

use super::{AudioBackend, AudioSession, EngineStartContext};

/// Capture rate reported by the stub
pub const STUB_SAMPLE_RATE: u32 = 48_000;

struct StubCapture {
    channels: AudioThreadChannels,
    buffer_size: usize,
    input_errors: mpsc::UnboundedSender<String>,
}

/// Stub backend used for deterministic testing and CLI tooling.
///
/// No devices are touched. Time comes from a [`ManualClock`] the caller
/// advances, clicks land in a shared [`ClickLog`], and microphone audio is
/// injected with [`push_samples`](Self::push_samples).
pub struct StubBackend {
    clock: Arc<ManualClock>,
    clicks: ClickLog,
    deny_microphone: AtomicBool,
    capture: Mutex<Option<StubCapture>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new()),
            clicks: ClickLog::new(),
            deny_microphone: AtomicBool::new(false),
            capture: Mutex::new(None),
        }
    }

    /// Clock handed to every session opened on this backend
    pub fn clock(&self) -> Arc<ManualClock> {
        Arc::clone(&self.clock)
    }

    /// Shared log of scheduled clicks
    pub fn click_log(&self) -> ClickLog {
        self.clicks.clone()
    }

    /// Make subsequent `open` calls fail as if the microphone were refused
    pub fn deny_microphone(&self, deny: bool) {
        self.deny_microphone.store(deny, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.capture.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Inject mono microphone samples whose first sample was captured at `time`
    ///
    /// Samples are split across pool buffers. Returns the number of samples
    /// queued; fewer than given when the pool is exhausted or nothing is open.
    pub fn push_samples(&self, samples: &[f32], time: f64) -> usize {
        let mut guard = match self.capture.lock() {
            Ok(guard) => guard,
            Err(_) => return 0,
        };
        let Some(capture) = guard.as_mut() else {
            return 0;
        };

        let mut queued = 0;
        for chunk in samples.chunks(capture.buffer_size.max(1)) {
            let Ok(mut buffer) = capture.channels.pool_consumer.pop() else {
                log::warn!("[StubBackend] Buffer pool exhausted, dropping samples");
                break;
            };
            let chunk_time = time + queued as f64 / STUB_SAMPLE_RATE as f64;
            buffer.fill_from(chunk.iter().copied(), chunk_time);
            if capture.channels.data_producer.push(buffer).is_err() {
                break;
            }
            queued += chunk.len();
        }
        queued
    }

    /// Simulate the microphone failing on an open session
    pub fn inject_mic_error(&self, details: &str) -> bool {
        self.capture
            .lock()
            .ok()
            .and_then(|guard| {
                guard
                    .as_ref()
                    .map(|c| c.input_errors.send(details.to_string()).is_ok())
            })
            .unwrap_or(false)
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for StubBackend {
    fn open(&self, ctx: EngineStartContext) -> Result<AudioSession, AudioError> {
        let mut guard = self.capture.lock().map_err(|_| AudioError::LockPoisoned {
            component: "stub_capture".to_string(),
        })?;
        if guard.is_some() {
            return Err(AudioError::AlreadyRunning);
        }
        if self.deny_microphone.load(Ordering::SeqCst) {
            return Err(AudioError::PermissionDenied);
        }

        let buffer_size = ctx.audio.buffer_size.max(1);
        let (channels, analysis) =
            BufferPool::new(ctx.audio.buffer_pool_size.max(1), buffer_size).split_for_threads();
        *guard = Some(StubCapture {
            channels,
            buffer_size,
            input_errors: ctx.input_errors,
        });

        Ok(AudioSession {
            clock: self.clock.clone(),
            capture: analysis,
            capture_sample_rate: STUB_SAMPLE_RATE,
            click_sink: Box::new(self.clicks.clone()),
        })
    }

    fn close(&self) -> Result<(), AudioError> {
        let mut guard = self.capture.lock().map_err(|_| AudioError::LockPoisoned {
            component: "stub_capture".to_string(),
        })?;
        guard.take().map(|_| ()).ok_or(AudioError::NotRunning)
    }
}

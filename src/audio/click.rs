//! ClickTrack - look-ahead metronome scheduling on the beat grid
//!
//! The track never fires clicks itself. A periodic driver calls [`ClickTrack::pump`],
//! which queues every pulse falling inside the look-ahead window into a
//! [`ClickSink`] with its exact AudioClock timestamp. The sink (the output
//! callback, in production) renders each pulse on the right frame, so the
//! driver's own polling jitter never reaches the audible timing.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::{ClickConfig, SessionConfig};

/// Tolerance used when comparing grid positions
const GRID_EPSILON: f64 = 1e-6;

/// One metronome pulse with its exact audio-clock start time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickPulse {
    pub time: f64,
    /// First beat of the bar
    pub accent: bool,
    pub volume: f32,
}

/// Destination for scheduled pulses
///
/// Implementations must tolerate `cancel_all` on an already empty queue.
pub trait ClickSink: Send {
    fn schedule(&mut self, pulse: ClickPulse);
    fn cancel_all(&mut self);
}

#[derive(Debug, Default)]
struct ClickLogState {
    pending: Vec<ClickPulse>,
    cancelled: usize,
}

/// Sink that records pulses instead of playing them
///
/// Cloning shares the underlying log, so a test can keep one handle while
/// the session owns another.
#[derive(Debug, Clone, Default)]
pub struct ClickLog {
    inner: Arc<Mutex<ClickLogState>>,
}

impl ClickLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulses scheduled since the last cancel
    pub fn pending(&self) -> Vec<ClickPulse> {
        self.inner
            .lock()
            .map(|state| state.pending.clone())
            .unwrap_or_default()
    }

    /// Number of pulses dropped by `cancel_all`
    pub fn cancelled(&self) -> usize {
        self.inner.lock().map(|state| state.cancelled).unwrap_or(0)
    }
}

impl ClickSink for ClickLog {
    fn schedule(&mut self, pulse: ClickPulse) {
        if let Ok(mut state) = self.inner.lock() {
            state.pending.push(pulse);
        }
    }

    fn cancel_all(&mut self) {
        if let Ok(mut state) = self.inner.lock() {
            state.cancelled += state.pending.len();
            state.pending.clear();
        }
    }
}

/// Look-ahead scheduler for metronome pulses
#[derive(Debug, Clone)]
pub struct ClickTrack {
    look_ahead: f64,
    scheduler_period: f64,
    beat_length: f64,
    time_signature: u64,
    volume: f32,
    enabled: bool,
    /// Time of beat 0 of the grid; `None` while stopped
    origin: Option<f64>,
    /// Beat index of the next pulse to queue
    beat_count: u64,
    last_pump: Option<f64>,
}

impl ClickTrack {
    pub fn new(click: &ClickConfig, session: &SessionConfig) -> Self {
        Self {
            look_ahead: click.look_ahead_ms as f64 / 1000.0,
            scheduler_period: click.scheduler_period_ms as f64 / 1000.0,
            beat_length: session.beat_length(),
            time_signature: session.time_signature.max(1) as u64,
            volume: session.click_volume,
            enabled: session.click_enabled,
            origin: None,
            beat_count: 0,
            last_pump: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn origin(&self) -> Option<f64> {
        self.origin
    }

    /// Audio time of the next pulse the track will queue
    pub fn next_pulse_time(&self) -> Option<f64> {
        self.origin
            .map(|origin| origin + self.beat_count as f64 * self.beat_length)
    }

    /// Start a fresh grid whose beat 0 falls at `origin`
    pub fn start(&mut self, origin: f64, now: f64, sink: &mut dyn ClickSink) {
        sink.cancel_all();
        self.origin = Some(origin);
        self.beat_count = self.first_beat_at_or_after(origin, now);
        self.last_pump = None;
        tracing::debug!(
            "[ClickTrack] Grid started at {:.3}s (enabled: {})",
            origin,
            self.enabled
        );
        self.pump(now, sink);
    }

    /// Keep the running grid if `anchor` already lies on it, otherwise restart from `anchor`
    pub fn align(&mut self, anchor: f64, now: f64, sink: &mut dyn ClickSink) {
        if let Some(origin) = self.origin {
            let beats = ((anchor - origin) / self.beat_length).round();
            let on_grid = (origin + beats * self.beat_length - anchor).abs() < GRID_EPSILON;
            let on_downbeat = beats >= 0.0 && (beats as u64) % self.time_signature == 0;
            if on_grid && on_downbeat {
                return;
            }
            tracing::debug!(
                "[ClickTrack] Anchor {:.3}s is off the running grid, realigning",
                anchor
            );
        }
        self.start(anchor, now, sink);
    }

    /// Toggle the click mid-session
    ///
    /// Disabling cancels queued pulses. Re-enabling resumes on the existing
    /// grid at the first beat not yet in the past.
    pub fn set_enabled(&mut self, enabled: bool, now: f64, sink: &mut dyn ClickSink) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;

        if !enabled {
            sink.cancel_all();
            return;
        }

        if let Some(origin) = self.origin {
            self.beat_count = self.first_beat_at_or_after(origin, now);
            self.last_pump = None;
            self.pump(now, sink);
        }
    }

    /// Queue every pulse inside the look-ahead window
    ///
    /// Calls closer together than the scheduler period are ignored.
    /// Returns the number of pulses queued.
    pub fn pump(&mut self, now: f64, sink: &mut dyn ClickSink) -> usize {
        let Some(origin) = self.origin else {
            return 0;
        };
        if !self.enabled {
            return 0;
        }
        if let Some(last) = self.last_pump {
            if now - last < self.scheduler_period {
                return 0;
            }
        }
        self.last_pump = Some(now);

        let horizon = now + self.look_ahead;
        let mut queued = 0;
        loop {
            let time = origin + self.beat_count as f64 * self.beat_length;
            if time >= horizon {
                break;
            }
            sink.schedule(ClickPulse {
                time,
                accent: self.beat_count % self.time_signature == 0,
                volume: self.volume,
            });
            self.beat_count += 1;
            queued += 1;
        }
        queued
    }

    /// Cancel everything queued and drop the grid
    pub fn stop(&mut self, sink: &mut dyn ClickSink) {
        sink.cancel_all();
        self.origin = None;
        self.beat_count = 0;
        self.last_pump = None;
    }

    fn first_beat_at_or_after(&self, origin: f64, now: f64) -> u64 {
        if now <= origin {
            return 0;
        }
        ((now - origin) / self.beat_length - GRID_EPSILON).ceil().max(0.0) as u64
    }
}

/// Render one pulse as a decaying sine burst
///
/// Accented pulses use `accent_freq_hz`, the others `beat_freq_hz`.
/// Output is deterministic with unit peak amplitude; pulse volume is applied
/// when the burst is mixed into the output.
pub fn synthesize_click(config: &ClickConfig, accent: bool, sample_rate: u32) -> Vec<f32> {
    let frequency = if accent {
        config.accent_freq_hz
    } else {
        config.beat_freq_hz
    };
    let num_samples = (sample_rate as f32 * config.pulse_duration_ms as f32 / 1000.0) as usize;
    let decay = 5.0 / num_samples.max(1) as f32;

    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let envelope = (-(i as f32) * decay).exp();
            (2.0 * std::f32::consts::PI * frequency * t).sin() * envelope
        })
        .collect()
}

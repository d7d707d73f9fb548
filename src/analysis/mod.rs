// Analysis module - practice worker loop and onset detection
//
// The practice worker is the single writer of session state. Each iteration:
// 1. applies queued commands (click toggle, stop)
// 2. drains microphone buffers, slicing them into RMS frames for the OnsetDetector
// 3. ticks the SessionController at the current AudioClock time
// 4. publishes events and (throttled) HUD snapshots
//
// Everything else only ever sees the published snapshots.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, watch};

use crate::audio::buffer_pool::{AnalysisThreadChannels, AudioBuffer};
use crate::audio::click::ClickSink;
use crate::audio::clock::AudioClock;
use crate::practice::{HudSnapshot, PracticeEvent, SessionController, SessionState, SessionSummary};

pub mod onset;

pub use onset::{rms, OnsetDetector, OnsetEvent};

/// Commands accepted by a running practice worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    SetClickEnabled(bool),
    Stop,
}

/// Slices timestamped buffers into fixed-size analysis frames
///
/// Samples left over at the end of a buffer are carried into the next one;
/// each frame is stamped with the capture time of its first sample.
#[derive(Debug, Clone)]
pub struct FrameChunker {
    frame_size: usize,
    sample_period: f64,
    pending: Vec<f32>,
    pending_time: f64,
}

impl FrameChunker {
    pub fn new(frame_size: usize, sample_rate: u32) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            sample_period: 1.0 / sample_rate.max(1) as f64,
            pending: Vec::with_capacity(frame_size),
            pending_time: 0.0,
        }
    }

    /// Feed one buffer, calling `on_frame(frame, time)` for every completed frame
    pub fn push(&mut self, buffer: &AudioBuffer, mut on_frame: impl FnMut(&[f32], f64)) {
        for (index, &sample) in buffer.samples.iter().enumerate() {
            if self.pending.is_empty() {
                self.pending_time = buffer.time + index as f64 * self.sample_period;
            }
            self.pending.push(sample);
            if self.pending.len() == self.frame_size {
                on_frame(&self.pending, self.pending_time);
                self.pending.clear();
            }
        }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

/// Everything the practice worker needs, moved onto its thread
pub struct PracticeWorkerContext {
    pub session: SessionController,
    pub clock: Arc<dyn AudioClock>,
    pub capture: AnalysisThreadChannels,
    pub capture_sample_rate: u32,
    pub click_sink: Box<dyn ClickSink>,
    pub commands: mpsc::Receiver<WorkerCommand>,
    pub input_errors: mpsc::UnboundedReceiver<String>,
    pub hud_tx: watch::Sender<HudSnapshot>,
    pub events_tx: broadcast::Sender<PracticeEvent>,
    pub frame_size: usize,
    pub poll_interval: Duration,
    pub hud_interval: Duration,
}

struct PracticeWorker {
    session: SessionController,
    clock: Arc<dyn AudioClock>,
    capture: AnalysisThreadChannels,
    click_sink: Box<dyn ClickSink>,
    commands: mpsc::Receiver<WorkerCommand>,
    input_errors: mpsc::UnboundedReceiver<String>,
    hud_tx: watch::Sender<HudSnapshot>,
    events_tx: broadcast::Sender<PracticeEvent>,
    chunker: FrameChunker,
    poll_interval: Duration,
    hud_interval: f64,
    last_hud: Option<f64>,
}

impl PracticeWorker {
    fn new(ctx: PracticeWorkerContext) -> Self {
        Self {
            chunker: FrameChunker::new(ctx.frame_size, ctx.capture_sample_rate),
            session: ctx.session,
            clock: ctx.clock,
            capture: ctx.capture,
            click_sink: ctx.click_sink,
            commands: ctx.commands,
            input_errors: ctx.input_errors,
            hud_tx: ctx.hud_tx,
            events_tx: ctx.events_tx,
            poll_interval: ctx.poll_interval,
            hud_interval: ctx.hud_interval.as_secs_f64(),
            last_hud: None,
        }
    }

    fn publish(&self, events: Vec<PracticeEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }
    }

    fn publish_hud(&mut self, now: f64, force: bool) {
        let due = self
            .last_hud
            .map(|last| now - last >= self.hud_interval)
            .unwrap_or(true);
        if force || due {
            self.hud_tx.send_replace(self.session.hud(now));
            self.last_hud = Some(now);
        }
    }

    /// Returns true when the worker was asked to stop
    fn apply_commands(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(WorkerCommand::SetClickEnabled(enabled)) => {
                    let now = self.clock.now();
                    self.session
                        .set_click_enabled(enabled, now, self.click_sink.as_mut());
                }
                Ok(WorkerCommand::Stop) | Err(TryRecvError::Disconnected) => return true,
                Err(TryRecvError::Empty) => return false,
            }
        }
    }

    fn drain_capture(&mut self) {
        while let Some(buffer) = self.capture.pop() {
            let session = &mut self.session;
            self.chunker.push(&buffer, |frame, time| {
                if let Some(onset) = session.feed_energy(rms(frame), time) {
                    tracing::debug!(
                        "[PracticeWorker] Onset at {:.3}s (rms {:.3})",
                        onset.time,
                        onset.energy
                    );
                }
            });
            self.capture.recycle(buffer);
        }
    }

    fn shutdown(&mut self) {
        let now = self.clock.now();
        let events = self.session.stop(now, self.click_sink.as_mut());
        self.publish(events);
        self.chunker.reset();
        self.publish_hud(now, true);
    }

    fn run(mut self) -> Option<SessionSummary> {
        tracing::info!("[PracticeWorker] Starting practice loop");

        loop {
            if self.apply_commands() {
                tracing::info!("[PracticeWorker] Stop requested");
                self.shutdown();
                break;
            }

            if let Ok(details) = self.input_errors.try_recv() {
                tracing::error!("[PracticeWorker] Microphone failed: {}", details);
                let _ = self.events_tx.send(PracticeEvent::MicError { details });
                self.shutdown();
                break;
            }

            self.drain_capture();

            let now = self.clock.now();
            let events = self.session.tick(now, self.click_sink.as_mut());
            self.publish(events);

            if self.session.state() == SessionState::Finalized {
                tracing::info!("[PracticeWorker] Cycle finalized, exiting");
                self.shutdown();
                break;
            }

            self.publish_hud(now, false);
            thread::sleep(self.poll_interval);
        }

        self.session.summary().cloned()
    }
}

/// Spawn the single-writer practice worker
///
/// The thread exits when the cycle finalizes, the microphone fails, a
/// `Stop` command arrives or the command sender is dropped. It returns the
/// summary of the cycle, if one was produced.
pub fn spawn_practice_thread(ctx: PracticeWorkerContext) -> JoinHandle<Option<SessionSummary>> {
    thread::spawn(move || PracticeWorker::new(ctx).run())
}

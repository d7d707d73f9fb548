//! SessionController - lifecycle of one practice cycle
//!
//! ```text
//! Idle --start--> CountingDown --count-in elapsed--> Running --all slots counted--> Finalized
//!   ^                  |                                |                               |
//!   +------stop--------+--------------stop--------------+--------------stop-------------+
//! ```
//!
//! The controller is a plain state machine driven with explicit audio-clock
//! times. It owns the detector, scheduler, click track and match state, and
//! is meant to be mutated by exactly one thread (the practice worker), which
//! publishes [`HudSnapshot`]s for everyone else.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::chords::ChordCatalog;
use super::hud::{HudSnapshot, PracticeEvent, SessionSummary};
use super::matcher::{MatchCounters, MatchEngine};
use super::progress::{PassNotice, ProgressLedger};
use super::scheduler::{BeatScheduler, ScheduledSlot};
use crate::analysis::onset::{OnsetDetector, OnsetEvent};
use crate::audio::click::{ClickSink, ClickTrack};
use crate::config::{AppConfig, SessionConfig};
use crate::error::{log_progress_error, log_session_error, SessionError};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    CountingDown,
    Running,
    Finalized,
}

pub struct SessionController {
    config: SessionConfig,
    scheduler: BeatScheduler,
    detector: OnsetDetector,
    click: ClickTrack,
    matcher: Option<MatchEngine>,
    ledger: Arc<Mutex<ProgressLedger>>,
    state: SessionState,

    tolerance: f64,
    finalize_grace: f64,
    start_epsilon: f64,

    count_in_start: f64,
    count_in_end: f64,
    start_at: f64,
    finalized: bool,
    summary: Option<SessionSummary>,
}

impl SessionController {
    /// Validate the session config and resolve its progression
    ///
    /// Nothing is scheduled yet; call [`start`](Self::start) once audio is up.
    pub fn new(
        mut config: SessionConfig,
        app: &AppConfig,
        catalog: &ChordCatalog,
        ledger: Arc<Mutex<ProgressLedger>>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let scheduler =
            BeatScheduler::new(&config, catalog, app.matching.allow_unknown_numerals)?;
        let click = ClickTrack::new(&app.click, &config);

        Ok(Self {
            detector: OnsetDetector::with_config(&app.onset_detection),
            click,
            scheduler,
            matcher: None,
            ledger,
            state: SessionState::Idle,
            tolerance: app.matching.tolerance_ms as f64 / 1000.0,
            finalize_grace: app.matching.finalize_grace_ms as f64 / 1000.0,
            start_epsilon: app.matching.start_epsilon_ms as f64 / 1000.0,
            count_in_start: 0.0,
            count_in_end: 0.0,
            start_at: 0.0,
            finalized: false,
            summary: None,
            config,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Resolved chord labels of one progression pass
    pub fn chords(&self) -> &[String] {
        self.scheduler.chords()
    }

    /// Time of slot 0, once the count-in has been scheduled
    pub fn start_at(&self) -> Option<f64> {
        (self.state != SessionState::Idle || self.matcher.is_some()).then_some(self.start_at)
    }

    pub fn slots(&self) -> &[ScheduledSlot] {
        self.matcher.as_ref().map(|m| m.slots()).unwrap_or(&[])
    }

    pub fn counters(&self) -> MatchCounters {
        self.matcher
            .as_ref()
            .map(|m| m.counters())
            .unwrap_or_default()
    }

    /// Summary of the last finished or stopped cycle
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    pub fn is_click_enabled(&self) -> bool {
        self.click.is_enabled()
    }

    /// Begin the one-bar count-in at `now`
    ///
    /// The click grid starts `start_epsilon` after `now` so the count-in
    /// clicks and slot 0 share one grid.
    pub fn start(&mut self, now: f64, sink: &mut dyn ClickSink) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyActive);
        }

        let bar_length = self.scheduler.bar_length();
        self.detector.reset();
        self.matcher = None;
        self.summary = None;
        self.finalized = false;
        self.count_in_start = now;
        self.count_in_end = now + bar_length;
        self.start_at = self.count_in_end + self.start_epsilon;
        self.state = SessionState::CountingDown;

        self.click.start(now + self.start_epsilon, now, sink);

        tracing::info!(
            "[SessionController] Count-in {:.3}s..{:.3}s, {} slots of {:.3}s, chords {:?}",
            self.count_in_start,
            self.count_in_end,
            self.scheduler.chord_target(),
            bar_length,
            self.scheduler.chords()
        );
        Ok(())
    }

    /// Feed one analysis frame's RMS energy captured at `time`
    ///
    /// Returns the onset, if the detector fired. Onsets only score while
    /// Running; during the count-in they just keep the detector state honest.
    pub fn feed_energy(&mut self, rms: f32, time: f64) -> Option<OnsetEvent> {
        if !matches!(
            self.state,
            SessionState::CountingDown | SessionState::Running
        ) {
            return None;
        }
        let onset = self.detector.process(rms, time)?;
        self.handle_onset(&onset);
        Some(onset)
    }

    /// Score an onset against the open slots
    ///
    /// Returns the index of the slot credited, if any.
    pub fn handle_onset(&mut self, onset: &OnsetEvent) -> Option<usize> {
        if self.state != SessionState::Running {
            return None;
        }
        let matcher = self.matcher.as_mut()?;
        let matched = matcher.on_onset(onset);
        if let Some(index) = matched {
            tracing::debug!(
                "[SessionController] Onset at {:.3}s matched slot {} ({})",
                onset.time,
                index,
                matcher.slots()[index].chord
            );
        }
        matched
    }

    /// Advance the session to `now`
    ///
    /// Pumps the click track, ends the count-in, runs the timeout sweep and
    /// finalizes the cycle once every slot is counted or the grace period
    /// after the last deadline has passed.
    pub fn tick(&mut self, now: f64, sink: &mut dyn ClickSink) -> Vec<PracticeEvent> {
        let mut events = Vec::new();

        if self.state == SessionState::CountingDown {
            self.click.pump(now, sink);
            if now < self.count_in_end {
                return events;
            }
            self.begin_running(now, sink);
        }

        if self.state != SessionState::Running {
            return events;
        }

        self.click.pump(now, sink);

        let Some(matcher) = self.matcher.as_mut() else {
            return events;
        };
        let newly_counted = matcher.sweep(now);
        if newly_counted > 1 {
            let err = SessionError::ScheduleOverrun {
                overdue: newly_counted,
            };
            tracing::warn!("[SessionController] {}", err);
        }

        let past_grace = matcher
            .last_deadline()
            .map(|deadline| now > deadline + self.finalize_grace)
            .unwrap_or(true);
        if matcher.is_complete() || past_grace {
            self.finalize(sink, &mut events);
        }
        events
    }

    /// Toggle the metronome without disturbing the beat grid
    pub fn set_click_enabled(&mut self, enabled: bool, now: f64, sink: &mut dyn ClickSink) {
        self.click.set_enabled(enabled, now, sink);
        tracing::info!("[SessionController] Click enabled: {}", enabled);
    }

    /// Tear the session down from any state
    ///
    /// Cancels queued clicks and resets the detector. A running session that
    /// has counted slots beyond the credited first one gets partial credit in
    /// the ledger.
    pub fn stop(&mut self, now: f64, sink: &mut dyn ClickSink) -> Vec<PracticeEvent> {
        let mut events = Vec::new();
        self.click.stop(sink);
        self.detector.reset();

        if self.state == SessionState::Running && !self.finalized {
            if let Some(matcher) = self.matcher.as_mut() {
                matcher.sweep(now);
                // Slot 0 is credited automatically, so one attempt is not a play
                if matcher.counters().attempts > 1 {
                    let summary = self.build_summary(false);
                    if let Some(notice) = self.write_progress(summary.accuracy_percent) {
                        events.push(PracticeEvent::PassNotice(notice));
                    }
                    tracing::info!(
                        "[SessionController] Stopped early with {}/{} correct",
                        summary.correct,
                        summary.attempts
                    );
                    self.summary = Some(summary.clone());
                    events.push(PracticeEvent::SessionFinished(summary));
                }
            }
        }

        if self.state != SessionState::Idle {
            tracing::info!("[SessionController] {:?} -> Idle", self.state);
        }
        self.state = SessionState::Idle;
        events
    }

    /// HUD fields as of `now`
    pub fn hud(&self, now: f64) -> HudSnapshot {
        let hud = HudSnapshot::default().with_counters(self.counters());
        let beat_length = self.scheduler.beat_length();
        let beats_per_bar = self.config.time_signature.max(1);

        match self.state {
            SessionState::Idle | SessionState::Finalized => hud,
            SessionState::CountingDown => {
                let elapsed = (now - (self.count_in_start + self.start_epsilon)).max(0.0);
                let left = (self.count_in_end - now).max(0.0);
                HudSnapshot {
                    is_counting_down: true,
                    countdown_ms_left: (left * 1000.0).ceil() as u64,
                    next_chord: Some(self.scheduler.chord_at(0).to_string()),
                    current_beat_index: ((elapsed / beat_length).floor() as u32)
                        .min(beats_per_bar - 1),
                    ..hud
                }
            }
            SessionState::Running => {
                let slots = self.slots();
                let elapsed = (now - self.start_at).max(0.0);
                let bar_length = self.scheduler.bar_length();
                let bar = ((elapsed / bar_length).floor() as usize).min(slots.len().saturating_sub(1));
                let within_bar = elapsed - bar as f64 * bar_length;
                let beat = ((within_bar / beat_length).floor() as u32).min(beats_per_bar - 1);
                HudSnapshot {
                    is_running: true,
                    current_chord: slots.get(bar).map(|slot| slot.chord.clone()),
                    next_chord: slots.get(bar + 1).map(|slot| slot.chord.clone()),
                    current_bar_index: bar as u32,
                    current_beat_index: beat,
                    ..hud
                }
            }
        }
    }

    fn begin_running(&mut self, now: f64, sink: &mut dyn ClickSink) {
        let slots = self.scheduler.schedule(self.start_at);
        self.matcher = Some(MatchEngine::new(
            slots,
            self.scheduler.bar_length(),
            self.tolerance,
        ));
        self.state = SessionState::Running;
        self.click.align(self.start_at, now, sink);
        tracing::info!(
            "[SessionController] Count-in complete, first slot at {:.3}s",
            self.start_at
        );
    }

    fn finalize(&mut self, sink: &mut dyn ClickSink, events: &mut Vec<PracticeEvent>) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        if let Some(matcher) = self.matcher.as_mut() {
            let forced = matcher.force_count_all();
            if forced > 0 {
                tracing::debug!(
                    "[SessionController] Force-counted {} slot(s) at finalization",
                    forced
                );
            }
        }
        self.click.stop(sink);

        let summary = self.build_summary(true);
        if let Some(notice) = self.write_progress(summary.accuracy_percent) {
            events.push(PracticeEvent::PassNotice(notice));
        }
        tracing::info!(
            "[SessionController] Finalized: {}/{} correct, {} miss, {}%",
            summary.correct,
            summary.attempts,
            summary.miss,
            summary.accuracy_percent
        );
        self.summary = Some(summary.clone());
        self.state = SessionState::Finalized;
        events.push(PracticeEvent::SessionFinished(summary));
    }

    fn build_summary(&self, completed: bool) -> SessionSummary {
        let counters = self.counters();
        SessionSummary {
            tone: self.config.tone.clone(),
            progression: self.config.progression_preset.clone(),
            attempts: counters.attempts,
            correct: counters.correct,
            miss: counters.miss,
            accuracy_percent: counters.accuracy_percent(),
            hits_total: counters.hits_total,
            completed,
            slots: self
                .matcher
                .as_ref()
                .map(|m| m.outcomes())
                .unwrap_or_default(),
        }
    }

    /// Best-effort ledger write; failures are logged, never propagated
    fn write_progress(&self, accuracy_percent: u32) -> Option<PassNotice> {
        let mut ledger = match self.ledger.lock() {
            Ok(ledger) => ledger,
            Err(_) => {
                log_session_error(&SessionError::StatePoisoned, "write_progress");
                return None;
            }
        };
        match ledger.record_accuracy(
            &self.config.tone,
            &self.config.progression_preset,
            accuracy_percent,
        ) {
            Ok(notice) => notice,
            Err(err) => {
                log_progress_error(&err, "write_progress");
                None
            }
        }
    }
}

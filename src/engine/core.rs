//! PracticeEngine: orchestration layer shared by the CLI and tests.
//!
//! The engine owns the audio backend, the progress ledger and the outbound
//! channels. Each session runs on its own practice worker thread, which is
//! the only writer of session state; the engine just sends it commands and
//! hands out HUD and event subscriptions.

use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};

use crate::analysis::{spawn_practice_thread, PracticeWorkerContext, WorkerCommand};
use crate::config::{AppConfig, SessionConfig};
use crate::engine::backend::{AudioBackend, CpalBackend, EngineStartContext};
use crate::error::{log_audio_error, log_progress_error, AudioError, EngineError, SessionError};
use crate::practice::{
    ChordCatalog, HudSnapshot, JsonFileStore, MemoryStore, PracticeEvent, ProgressLedger,
    ProgressRecord, SessionController, SessionSummary,
};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const COMMAND_CHANNEL_CAPACITY: usize = 16;

struct ActiveSession {
    command_tx: mpsc::Sender<WorkerCommand>,
    worker: JoinHandle<Option<SessionSummary>>,
}

/// PracticeEngine orchestrates the audio backend and the practice worker.
pub struct PracticeEngine {
    config: Arc<RwLock<AppConfig>>,
    catalog: ChordCatalog,
    backend: Arc<dyn AudioBackend>,
    ledger: Arc<Mutex<ProgressLedger>>,
    hud_tx: watch::Sender<HudSnapshot>,
    events_tx: broadcast::Sender<PracticeEvent>,
    active: Mutex<Option<ActiveSession>>,
}

impl PracticeEngine {
    /// Create an engine on the default audio devices with the persisted ledger.
    pub fn new() -> Self {
        Self::from_config(AppConfig::load())
    }

    /// Create an engine on the default audio devices from an explicit config.
    pub fn from_config(config: AppConfig) -> Self {
        let ledger = Self::open_ledger(&config);
        Self::with_backend(config, Arc::new(CpalBackend::new()), ledger)
    }

    /// Create an engine over an explicit backend and ledger.
    pub fn with_backend(
        config: AppConfig,
        backend: Arc<dyn AudioBackend>,
        ledger: ProgressLedger,
    ) -> Self {
        let (hud_tx, _) = watch::channel(HudSnapshot::default());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config: Arc::new(RwLock::new(config)),
            catalog: ChordCatalog::builtin().clone(),
            backend,
            ledger: Arc::new(Mutex::new(ledger)),
            hud_tx,
            events_tx,
            active: Mutex::new(None),
        }
    }

    /// Replace the built-in chord catalog.
    pub fn with_catalog(mut self, catalog: ChordCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Ledger backed by `progress.store_path`, or an in-memory one if that file is unusable
    pub fn open_ledger(config: &AppConfig) -> ProgressLedger {
        let threshold = config.progress.pass_threshold;
        match ProgressLedger::open(
            Box::new(JsonFileStore::new(&config.progress.store_path)),
            threshold,
        ) {
            Ok(ledger) => ledger,
            Err(err) => {
                log_progress_error(&err, "open_ledger");
                log::warn!("[PracticeEngine] Progress will not be persisted this run");
                ProgressLedger::open(Box::new(MemoryStore::new()), threshold)
                    .unwrap_or_else(|_| ProgressLedger::in_memory())
            }
        }
    }

    // ========================================================================
    // SESSION METHODS
    // ========================================================================

    /// Start a practice cycle.
    ///
    /// Validates the config, opens audio and begins the count-in. Returns
    /// once the session is CountingDown.
    ///
    /// # Errors
    /// - `Session(AlreadyActive)` while a cycle is counting down or running
    /// - `Session(..)` for invalid configs, before any device is touched
    /// - `Audio(..)` when the devices cannot be opened; a microphone failure
    ///   also broadcasts `PracticeEvent::MicError` and leaves the engine idle
    pub fn start_session(&self, session_config: SessionConfig) -> Result<(), EngineError> {
        let mut active = self.active.lock().map_err(|_| SessionError::StatePoisoned)?;
        if let Some(previous) = active.take() {
            if !previous.worker.is_finished() {
                *active = Some(previous);
                return Err(SessionError::AlreadyActive.into());
            }
            self.reap(previous);
        }

        let app = self.config_snapshot();
        let mut session =
            SessionController::new(session_config, &app, &self.catalog, Arc::clone(&self.ledger))?;

        let (input_errors_tx, input_errors) = mpsc::unbounded_channel();
        let opened = self.backend.open(EngineStartContext {
            audio: app.audio.clone(),
            click: app.click.clone(),
            input_errors: input_errors_tx,
        });
        let mut audio = match opened {
            Ok(audio) => audio,
            Err(err) => {
                log_audio_error(&err, "start_session");
                if err.is_microphone_failure() {
                    let _ = self.events_tx.send(PracticeEvent::MicError {
                        details: err.to_string(),
                    });
                }
                return Err(err.into());
            }
        };

        let now = audio.clock.now();
        if let Err(err) = session.start(now, audio.click_sink.as_mut()) {
            self.close_backend();
            return Err(err.into());
        }
        self.hud_tx.send_replace(session.hud(now));

        let (command_tx, commands) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let worker = spawn_practice_thread(PracticeWorkerContext {
            session,
            clock: audio.clock,
            capture: audio.capture,
            capture_sample_rate: audio.capture_sample_rate,
            click_sink: audio.click_sink,
            commands,
            input_errors,
            hud_tx: self.hud_tx.clone(),
            events_tx: self.events_tx.clone(),
            frame_size: app.onset_detection.frame_size,
            poll_interval: Duration::from_millis(app.audio.poll_interval_ms),
            hud_interval: Duration::from_millis(app.audio.hud_interval_ms),
        });

        *active = Some(ActiveSession { command_tx, worker });
        tracing::info!("[PracticeEngine] Session started at {:.3}s", now);
        Ok(())
    }

    /// Stop the current cycle and close audio.
    ///
    /// Safe in any state. Returns the summary of the cycle if it finalized
    /// or earned partial credit.
    pub fn stop_session(&self) -> Result<Option<SessionSummary>, EngineError> {
        let previous = self
            .active
            .lock()
            .map_err(|_| SessionError::StatePoisoned)?
            .take();

        match previous {
            Some(previous) => {
                let summary = self.reap(previous);
                tracing::info!("[PracticeEngine] Session stopped");
                Ok(summary)
            }
            None => Ok(None),
        }
    }

    /// Toggle the metronome of the running cycle
    pub fn set_click_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        let active = self.active.lock().map_err(|_| SessionError::StatePoisoned)?;
        match active.as_ref() {
            Some(session) if !session.worker.is_finished() => session
                .command_tx
                .try_send(WorkerCommand::SetClickEnabled(enabled))
                .map_err(|_| SessionError::NotActive),
            _ => Err(SessionError::NotActive),
        }
    }

    /// True while a cycle is counting down or running
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .map(|active| {
                active
                    .as_ref()
                    .map(|session| !session.worker.is_finished())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Signal the worker, join it and release the devices
    fn reap(&self, session: ActiveSession) -> Option<SessionSummary> {
        let ActiveSession { command_tx, worker } = session;
        // A full queue is fine: dropping the sender also stops the worker
        let _ = command_tx.try_send(WorkerCommand::Stop);
        drop(command_tx);

        let summary = match worker.join() {
            Ok(summary) => summary,
            Err(_) => {
                tracing::error!("[PracticeEngine] Practice worker panicked");
                None
            }
        };
        self.close_backend();
        summary
    }

    fn close_backend(&self) {
        match self.backend.close() {
            Ok(()) | Err(AudioError::NotRunning) => {}
            Err(err) => log_audio_error(&err, "close_backend"),
        }
    }

    // ========================================================================
    // STATE ACCESS
    // ========================================================================

    pub fn catalog(&self) -> &ChordCatalog {
        &self.catalog
    }

    /// Shared ledger handle
    pub fn ledger(&self) -> Arc<Mutex<ProgressLedger>> {
        Arc::clone(&self.ledger)
    }

    /// Copy of every stored best accuracy
    pub fn progress_snapshot(&self) -> ProgressRecord {
        self.ledger
            .lock()
            .map(|ledger| ledger.record().clone())
            .unwrap_or_default()
    }

    /// Snapshot the current app configuration
    pub fn config_snapshot(&self) -> AppConfig {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .unwrap_or_else(|err| err.into_inner().clone())
    }
}

impl Default for PracticeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PracticeEngine {
    fn drop(&mut self) {
        let _ = self.stop_session();
    }
}

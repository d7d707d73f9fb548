//! PracticeEngine lifecycle against the stub backend
//!
//! The stub's manual clock stands in for the audio device and microphone
//! samples are injected directly, so these run without audio hardware.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use strum_trainer::audio::ManualClock;
use strum_trainer::practice::ProgressLedger;
use strum_trainer::{
    AppConfig, PracticeEngine, PracticeEvent, SessionConfig, SessionError, StubBackend,
};
use tokio::sync::broadcast;

fn stub_engine() -> (PracticeEngine, Arc<StubBackend>, Arc<ManualClock>) {
    let backend = Arc::new(StubBackend::new());
    let clock = backend.clock();
    let engine = PracticeEngine::with_backend(
        AppConfig::default(),
        backend.clone(),
        ProgressLedger::in_memory(),
    );
    (engine, backend, clock)
}

/// 240 bpm in 4/4: one-second bars, slots at 1.02 s and 2.02 s
fn two_bar_session() -> SessionConfig {
    SessionConfig {
        bpm: 240,
        chord_target: 2,
        ..SessionConfig::default()
    }
}

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn drain(events: &mut broadcast::Receiver<PracticeEvent>) -> Vec<PracticeEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[test]
fn test_full_cycle_with_injected_strum() {
    let (engine, backend, clock) = stub_engine();
    let mut events = engine.subscribe_events();
    engine.start_session(two_bar_session()).unwrap();
    assert!(engine.hud_snapshot().is_counting_down);

    clock.set(1.5);
    assert!(wait_for(|| engine.hud_snapshot().is_running));

    // One loud analysis frame at slot 1, then silence to re-arm the detector
    backend.push_samples(&[0.5; 512], 2.0);
    backend.push_samples(&[0.0; 512], 2.0 + 512.0 / 48_000.0);
    clock.set(2.1);
    assert!(wait_for(|| engine.hud_snapshot().hits_total == 1));

    clock.set(5.0);
    assert!(wait_for(|| !engine.is_active()));

    let summary = engine.stop_session().unwrap().expect("cycle finalized");
    assert!(summary.completed);
    assert_eq!((summary.attempts, summary.correct, summary.miss), (2, 2, 0));
    assert_eq!(summary.accuracy_percent, 100);

    let received = drain(&mut events);
    assert!(matches!(received[0], PracticeEvent::PassNotice(_)));
    assert!(matches!(
        received.last(),
        Some(PracticeEvent::SessionFinished(_))
    ));
    assert_eq!(
        engine.progress_snapshot()["C / Am"]["I-V-vi-IV"],
        100
    );
    assert!(!backend.is_open());
}

#[test]
fn test_denied_microphone_leaves_engine_idle() {
    let (engine, backend, _clock) = stub_engine();
    backend.deny_microphone(true);
    let mut events = engine.subscribe_events();

    let err = engine.start_session(two_bar_session()).unwrap_err();
    assert!(err.is_microphone_failure());
    assert!(!engine.is_active());
    assert!(!engine.hud_snapshot().is_counting_down);
    assert!(matches!(
        drain(&mut events).as_slice(),
        [PracticeEvent::MicError { .. }]
    ));

    // Permission granted later: a fresh start works
    backend.deny_microphone(false);
    engine.start_session(two_bar_session()).unwrap();
    engine.stop_session().unwrap();
}

#[test]
fn test_microphone_failure_mid_session_stops_worker() {
    let (engine, backend, clock) = stub_engine();
    let mut events = engine.subscribe_events();
    engine.start_session(two_bar_session()).unwrap();

    clock.set(1.5);
    assert!(wait_for(|| engine.hud_snapshot().is_running));
    assert!(backend.inject_mic_error("device unplugged"));
    assert!(wait_for(|| !engine.is_active()));

    let received = drain(&mut events);
    assert!(received
        .iter()
        .any(|event| matches!(event, PracticeEvent::MicError { details } if details == "device unplugged")));
    let hud = engine.hud_snapshot();
    assert!(!hud.is_running && !hud.is_counting_down);

    engine.stop_session().unwrap();
    assert!(!backend.is_open());
}

#[test]
fn test_stop_during_count_in_returns_no_summary() {
    let (engine, backend, _clock) = stub_engine();
    engine.start_session(two_bar_session()).unwrap();
    assert_eq!(engine.stop_session().unwrap(), None);
    assert!(!engine.is_active());
    assert!(!backend.is_open());
    assert!(backend.click_log().pending().is_empty());
    assert_eq!(
        engine.set_click_enabled(true),
        Err(SessionError::NotActive)
    );
}

#[test]
fn test_restart_after_finalize() {
    let (engine, _backend, clock) = stub_engine();
    engine.start_session(two_bar_session()).unwrap();
    clock.set(10.0);
    assert!(wait_for(|| !engine.is_active()));

    // The finished worker is reaped by the next start
    engine.start_session(two_bar_session()).unwrap();
    assert!(engine.is_active());
    let summary = engine.stop_session().unwrap();
    assert!(summary.is_none());
}

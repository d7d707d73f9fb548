//! End-to-end practice cycles driven through `SessionController`
//!
//! Time is advanced by hand so every scenario is deterministic:
//! - strumming on every slot scores full marks and passes
//! - silence scores only the credited first slot
//! - stopping part way records partial credit

use std::sync::{Arc, Mutex};

use strum_trainer::audio::ClickLog;
use strum_trainer::practice::{ChordCatalog, PracticeEvent, ProgressLedger};
use strum_trainer::{AppConfig, SessionConfig, SessionController, SessionState};

fn pop_config() -> SessionConfig {
    SessionConfig {
        bpm: 90,
        time_signature: 4,
        chord_target: 4,
        tone: "C / Am".to_string(),
        progression_preset: "I-V-vi-IV".to_string(),
        ..SessionConfig::default()
    }
}

fn new_session(
    config: SessionConfig,
) -> (SessionController, Arc<Mutex<ProgressLedger>>, ClickLog) {
    let ledger = Arc::new(Mutex::new(ProgressLedger::in_memory()));
    let session = SessionController::new(
        config,
        &AppConfig::default(),
        ChordCatalog::builtin(),
        Arc::clone(&ledger),
    )
    .unwrap();
    (session, ledger, ClickLog::new())
}

/// Tick in 10 ms steps until `until` or finalization, collecting events
fn run_until(
    session: &mut SessionController,
    clicks: &mut ClickLog,
    from: f64,
    until: f64,
) -> Vec<PracticeEvent> {
    let mut events = Vec::new();
    let mut now = from;
    while now <= until && session.state() != SessionState::Finalized {
        events.extend(session.tick(now, clicks));
        now += 0.01;
    }
    events
}

#[test]
fn test_strum_on_every_slot_scores_full_marks() {
    let (mut session, ledger, mut clicks) = new_session(pop_config());
    session.start(0.0, &mut clicks).unwrap();
    assert_eq!(session.chords(), ["C", "G", "Am", "F"]);

    // 90 bpm in 4/4: one bar is 2.666.. s
    let bar = 4.0 * 60.0 / 90.0;
    session.tick(bar + 0.001, &mut clicks);
    assert_eq!(session.state(), SessionState::Running);

    let slot_times: Vec<f64> = session.slots().iter().map(|slot| slot.time).collect();
    assert_eq!(slot_times.len(), 4);

    // One strum on every slot. Slot 0 is already credited, so its strum
    // finds no open slot and changes nothing.
    let mut events = Vec::new();
    for &time in &slot_times {
        events.extend(session.tick(time, &mut clicks));
        assert!(session.feed_energy(0.5, time).is_some());
        session.feed_energy(0.0, time + 0.01);
    }
    let last = *slot_times.last().unwrap();
    events.extend(run_until(&mut session, &mut clicks, last, last + 2.0 * bar));

    assert_eq!(session.state(), SessionState::Finalized);
    let summary = session.summary().unwrap();
    assert_eq!(summary.attempts, 4);
    assert_eq!(summary.correct, 4);
    assert_eq!(summary.miss, 0);
    assert_eq!(summary.accuracy_percent, 100);
    assert_eq!(summary.hits_total, 4);
    assert!(summary.slots.iter().all(|slot| slot.matched));
    assert_eq!(summary.slots[0].offset_ms, None);

    assert!(matches!(events[0], PracticeEvent::PassNotice(ref n) if n.accuracy == 100));
    assert!(matches!(events.last(), Some(PracticeEvent::SessionFinished(_))));
    assert_eq!(
        ledger.lock().unwrap().best("C / Am", "I-V-vi-IV"),
        Some(100)
    );
}

#[test]
fn test_silence_scores_only_first_slot() {
    let (mut session, ledger, mut clicks) = new_session(pop_config());
    session.start(0.0, &mut clicks).unwrap();

    let events = run_until(&mut session, &mut clicks, 0.0, 30.0);

    assert_eq!(session.state(), SessionState::Finalized);
    let summary = session.summary().unwrap();
    assert_eq!(
        (summary.correct, summary.miss, summary.accuracy_percent),
        (1, 3, 25)
    );
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], PracticeEvent::SessionFinished(_)));
    assert_eq!(ledger.lock().unwrap().best("C / Am", "I-V-vi-IV"), Some(25));
    // Finalization cancels the metronome
    assert!(clicks.pending().is_empty());
}

#[test]
fn test_off_beat_strums_are_misses() {
    let (mut session, _ledger, mut clicks) = new_session(pop_config());
    session.start(0.0, &mut clicks).unwrap();
    let bar = 4.0 * 60.0 / 90.0;
    session.tick(bar + 0.001, &mut clicks);

    // Half a bar after each slot, far outside the tolerance window
    let slot_times: Vec<f64> = session.slots().iter().map(|slot| slot.time).collect();
    for &time in &slot_times[1..] {
        let strum = time + bar / 2.0;
        session.tick(strum, &mut clicks);
        assert!(session.feed_energy(0.5, strum).is_some());
        session.feed_energy(0.0, strum + 0.01);
    }
    let last = *slot_times.last().unwrap();
    run_until(&mut session, &mut clicks, last + bar / 2.0, last + 3.0 * bar);

    let summary = session.summary().unwrap();
    assert_eq!(summary.hits_total, 3);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.accuracy_percent, 25);
}

#[test]
fn test_stop_mid_cycle_records_partial_credit() {
    let (mut session, ledger, mut clicks) = new_session(pop_config());
    session.start(0.0, &mut clicks).unwrap();
    let bar = 4.0 * 60.0 / 90.0;
    session.tick(bar + 0.001, &mut clicks);

    let slot_one = session.slots()[1].time;
    session.tick(slot_one, &mut clicks);
    session.feed_energy(0.5, slot_one);

    // Slots 0 and 1 are due once slot 1's bar has elapsed
    let stop_at = slot_one + bar + 0.01;
    let events = session.stop(stop_at, &mut clicks);

    assert_eq!(session.state(), SessionState::Idle);
    let summary = session.summary().unwrap();
    assert!(!summary.completed);
    assert_eq!((summary.attempts, summary.correct), (2, 2));
    assert!(events
        .iter()
        .any(|event| matches!(event, PracticeEvent::SessionFinished(_))));
    assert_eq!(ledger.lock().unwrap().best("C / Am", "I-V-vi-IV"), Some(100));
}

#[test]
fn test_stop_during_count_in_records_nothing() {
    let (mut session, ledger, mut clicks) = new_session(pop_config());
    session.start(0.0, &mut clicks).unwrap();
    assert!(session.stop(1.0, &mut clicks).is_empty());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(ledger.lock().unwrap().record().is_empty());
    assert!(clicks.pending().is_empty());
}

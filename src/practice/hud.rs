// HUD snapshot and one-shot events published by the practice worker

use serde::{Deserialize, Serialize};

use super::matcher::{MatchCounters, SlotOutcome};
use super::progress::PassNotice;

/// Read-only view of a session for the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HudSnapshot {
    pub is_running: bool,
    pub is_counting_down: bool,
    pub countdown_ms_left: u64,
    pub current_chord: Option<String>,
    pub next_chord: Option<String>,
    pub current_bar_index: u32,
    pub current_beat_index: u32,
    pub hits_total: u32,
    pub attempts_count: u32,
    pub correct_count: u32,
    pub miss_count: u32,
    pub accuracy_percent: u32,
}

impl HudSnapshot {
    pub(crate) fn with_counters(mut self, counters: MatchCounters) -> Self {
        self.hits_total = counters.hits_total;
        self.attempts_count = counters.attempts;
        self.correct_count = counters.correct;
        self.miss_count = counters.miss;
        self.accuracy_percent = counters.accuracy_percent();
        self
    }
}

/// Result of one practice cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub tone: String,
    pub progression: String,
    pub attempts: u32,
    pub correct: u32,
    pub miss: u32,
    pub accuracy_percent: u32,
    pub hits_total: u32,
    /// False when the session was stopped before finalization
    pub completed: bool,
    pub slots: Vec<SlotOutcome>,
}

/// One-shot notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PracticeEvent {
    PassNotice(PassNotice),
    MicError { details: String },
    SessionFinished(SessionSummary),
}

//! BeatScheduler - one chord slot per bar on the audio clock
//!
//! The scheduler grants a full bar to every chord change regardless of the
//! time signature. Slots are generated once per cycle and never move.

use serde::{Deserialize, Serialize};

use super::chords::ChordCatalog;
use crate::config::{SessionConfig, StrumDirection};
use crate::error::SessionError;

/// A point on the audio clock where a chord should be strummed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledSlot {
    pub id: u64,
    /// Absolute AudioClock seconds
    pub time: f64,
    pub bar_index: u32,
    pub chord: String,
    /// Always true for chord slots
    pub required: bool,
    pub direction: StrumDirection,
}

/// Resolved progression plus the timing needed to lay it out
#[derive(Debug, Clone)]
pub struct BeatScheduler {
    chords: Vec<String>,
    bar_length: f64,
    beat_length: f64,
    chord_target: usize,
}

impl BeatScheduler {
    /// Resolve the session's progression against its tone
    ///
    /// # Errors
    /// `UnknownTone`, `UnknownNumeral` (unless `allow_unknown`) or
    /// `EmptyProgression` from the catalog.
    pub fn new(
        config: &SessionConfig,
        catalog: &ChordCatalog,
        allow_unknown: bool,
    ) -> Result<Self, SessionError> {
        let chords = catalog.resolve(&config.tone, &config.progression_preset, allow_unknown)?;
        Ok(Self::from_chords(chords, config))
    }

    /// Build from already resolved chord labels
    pub fn from_chords(chords: Vec<String>, config: &SessionConfig) -> Self {
        Self {
            chords,
            bar_length: config.bar_length(),
            beat_length: config.beat_length(),
            chord_target: config.chord_target,
        }
    }

    pub fn chords(&self) -> &[String] {
        &self.chords
    }

    pub fn bar_length(&self) -> f64 {
        self.bar_length
    }

    pub fn beat_length(&self) -> f64 {
        self.beat_length
    }

    pub fn chord_target(&self) -> usize {
        self.chord_target
    }

    /// Chord label for slot `index`, cycling through the progression
    pub fn chord_at(&self, index: usize) -> &str {
        if self.chords.is_empty() {
            return "";
        }
        &self.chords[index % self.chords.len()]
    }

    /// Lay out `chord_target` slots, slot i at `start_at + i * bar_length`
    pub fn schedule(&self, start_at: f64) -> Vec<ScheduledSlot> {
        (0..self.chord_target)
            .map(|i| ScheduledSlot {
                id: i as u64,
                time: start_at + i as f64 * self.bar_length,
                bar_index: i as u32,
                chord: self.chord_at(i).to_string(),
                required: true,
                direction: StrumDirection::Down,
            })
            .collect()
    }
}

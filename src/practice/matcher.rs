// MatchEngine - nearest-slot onset matching and timeout accounting
//
// Two independent paths update the counters:
// - an onset marks the nearest open slot correct when it lies within the
//   tolerance window; onsets outside the window are ignored
// - the timeout sweep counts a slot as attempted once its bar has elapsed,
//   matched or not
//
// Misses are derived from attempts minus correct, never from onsets, so an
// early strum for the next bar is not penalised twice.

use serde::{Deserialize, Serialize};

use crate::analysis::onset::OnsetEvent;

use super::scheduler::ScheduledSlot;

/// Live counters exposed to the HUD
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCounters {
    /// Onsets observed while running
    pub hits_total: u32,
    pub attempts: u32,
    pub correct: u32,
    pub miss: u32,
}

impl MatchCounters {
    /// `round(correct / attempts * 100)`, 0 before the first attempt
    pub fn accuracy_percent(&self) -> u32 {
        if self.attempts == 0 {
            return 0;
        }
        let ratio = self.correct as f64 / self.attempts as f64;
        ((ratio * 100.0).round() as u32).min(100)
    }
}

/// Final state of one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotOutcome {
    pub id: u64,
    pub bar_index: u32,
    pub chord: String,
    pub time: f64,
    pub matched: bool,
    /// Signed onset offset in milliseconds; `None` for misses and the
    /// automatically credited first slot
    pub offset_ms: Option<f64>,
    pub counted: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct SlotMark {
    matched: bool,
    counted: bool,
    offset: Option<f64>,
}

/// Per-cycle match state
#[derive(Debug, Clone)]
pub struct MatchEngine {
    slots: Vec<ScheduledSlot>,
    marks: Vec<SlotMark>,
    bar_length: f64,
    tolerance: f64,
    counters: MatchCounters,
}

impl MatchEngine {
    /// Create match state for a freshly scheduled cycle
    ///
    /// Slot 0 fires the instant the count-in ends, before the player can
    /// react, so it is credited as matched and counted up front.
    pub fn new(slots: Vec<ScheduledSlot>, bar_length: f64, tolerance: f64) -> Self {
        let mut marks = vec![SlotMark::default(); slots.len()];
        let mut counters = MatchCounters::default();
        if let Some(first) = marks.first_mut() {
            first.matched = true;
            first.counted = true;
            counters.attempts = 1;
            counters.correct = 1;
        }

        Self {
            slots,
            marks,
            bar_length,
            tolerance,
            counters,
        }
    }

    pub fn slots(&self) -> &[ScheduledSlot] {
        &self.slots
    }

    pub fn counters(&self) -> MatchCounters {
        self.counters
    }

    pub fn is_matched(&self, index: usize) -> bool {
        self.marks.get(index).map(|m| m.matched).unwrap_or(false)
    }

    pub fn is_counted(&self, index: usize) -> bool {
        self.marks.get(index).map(|m| m.counted).unwrap_or(false)
    }

    /// Every slot has been counted
    pub fn is_complete(&self) -> bool {
        self.counters.attempts as usize >= self.slots.len()
    }

    /// Deadline of the last slot (`time + bar_length`)
    pub fn last_deadline(&self) -> Option<f64> {
        self.slots.last().map(|slot| slot.time + self.bar_length)
    }

    /// Match an onset against the nearest open slot
    ///
    /// Returns the index of the slot credited, if any. Exact distance ties go
    /// to the earlier slot.
    pub fn on_onset(&mut self, onset: &OnsetEvent) -> Option<usize> {
        self.counters.hits_total = self.counters.hits_total.saturating_add(1);

        let mut best: Option<(usize, f64)> = None;
        for (index, (slot, mark)) in self.slots.iter().zip(&self.marks).enumerate() {
            if !slot.required || mark.matched || mark.counted {
                continue;
            }
            let distance = (onset.time - slot.time).abs();
            if best.map(|(_, d)| distance < d).unwrap_or(true) {
                best = Some((index, distance));
            }
        }

        let (index, distance) = best?;
        if distance > self.tolerance {
            tracing::trace!(
                "[MatchEngine] Onset at {:.3}s is {:.0} ms from nearest slot, ignored",
                onset.time,
                distance * 1000.0
            );
            return None;
        }

        let mark = &mut self.marks[index];
        mark.matched = true;
        mark.offset = Some(onset.time - self.slots[index].time);
        self.counters.correct += 1;
        self.recompute_miss();
        Some(index)
    }

    /// Count every slot whose bar has elapsed by `now`
    ///
    /// Returns how many slots were newly counted.
    pub fn sweep(&mut self, now: f64) -> usize {
        let bar_length = self.bar_length;
        let mut newly_counted = 0;
        for (slot, mark) in self.slots.iter().zip(self.marks.iter_mut()) {
            if !slot.required || mark.counted {
                continue;
            }
            if now >= slot.time + bar_length {
                mark.counted = true;
                newly_counted += 1;
            }
        }
        self.counters.attempts += newly_counted as u32;
        self.recompute_miss();
        newly_counted
    }

    /// Count every remaining slot regardless of its deadline
    pub fn force_count_all(&mut self) -> usize {
        let mut newly_counted = 0;
        for (slot, mark) in self.slots.iter().zip(self.marks.iter_mut()) {
            if slot.required && !mark.counted {
                mark.counted = true;
                newly_counted += 1;
            }
        }
        self.counters.attempts += newly_counted as u32;
        self.recompute_miss();
        newly_counted
    }

    fn recompute_miss(&mut self) {
        self.counters.miss = self.counters.attempts.saturating_sub(self.counters.correct);
    }

    pub fn outcomes(&self) -> Vec<SlotOutcome> {
        self.slots
            .iter()
            .zip(&self.marks)
            .map(|(slot, mark)| SlotOutcome {
                id: slot.id,
                bar_index: slot.bar_index,
                chord: slot.chord.clone(),
                time: slot.time,
                matched: mark.matched,
                offset_ms: mark.offset.map(|offset| offset * 1000.0),
                counted: mark.counted,
            })
            .collect()
    }
}

// Practice module - chord scheduling, onset matching and session lifecycle
//
// Pipeline (single writer, driven by the practice worker):
//   OnsetDetector → SessionController → MatchEngine → HudSnapshot / PracticeEvent
//                         ↑
//                   BeatScheduler ← ChordCatalog

pub mod chords;
pub mod hud;
pub mod matcher;
pub mod progress;
pub mod scheduler;
pub mod session;

pub use chords::ChordCatalog;
pub use hud::{HudSnapshot, PracticeEvent, SessionSummary};
pub use matcher::{MatchCounters, MatchEngine, SlotOutcome};
pub use progress::{
    JsonFileStore, MemoryStore, PassNotice, ProgressLedger, ProgressRecord, ProgressStore,
};
pub use scheduler::{BeatScheduler, ScheduledSlot};
pub use session::{SessionController, SessionState};

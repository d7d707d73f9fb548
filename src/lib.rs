// Strum Trainer Core - Rust rhythm practice engine
// Audio-clock driven chord scheduling, strum onset detection and scoring

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod practice;
pub mod replay;

// Re-exports for convenience
pub use config::{AppConfig, SessionConfig, StrumDirection};
pub use engine::{AudioBackend, CpalBackend, PracticeEngine, StubBackend};
pub use error::{AudioError, EngineError, ErrorCode, ProgressError, ReplayError, SessionError};
pub use practice::{
    ChordCatalog, HudSnapshot, PassNotice, PracticeEvent, ProgressLedger, SessionController,
    SessionState, SessionSummary,
};
pub use replay::{replay_samples, replay_wav, ReplayReport};

// Error types for the strum trainer engine
//
// This module defines custom error types for audio, session, progress,
// replay and engine operations, providing structured error handling with stable error codes
// that front-ends can match on.

mod audio;
mod engine;
mod progress;
mod replay;
mod session;

pub use audio::{log_audio_error, AudioError};
pub use engine::EngineError;
pub use progress::{log_progress_error, ProgressError};
pub use replay::ReplayError;
pub use session::{log_session_error, SessionError};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

// Offline replay error types

use crate::error::{ErrorCode, SessionError};
use std::fmt;

/// Errors from replaying a recording through a session
///
/// Error code range: 4001-4004
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayError {
    /// The WAV file could not be opened or decoded
    Wav { reason: String },

    /// Channel count or sample format is not supported
    UnsupportedFormat { reason: String },

    /// Session config was rejected
    Session(SessionError),

    /// The recording ended without the cycle finalizing
    Incomplete,
}

impl ErrorCode for ReplayError {
    fn code(&self) -> i32 {
        match self {
            ReplayError::Wav { .. } => 4001,
            ReplayError::UnsupportedFormat { .. } => 4002,
            ReplayError::Session(_) => 4003,
            ReplayError::Incomplete => 4004,
        }
    }

    fn message(&self) -> String {
        match self {
            ReplayError::Wav { reason } => format!("WAV read failed: {}", reason),
            ReplayError::UnsupportedFormat { reason } => {
                format!("Unsupported recording: {}", reason)
            }
            ReplayError::Session(err) => err.message(),
            ReplayError::Incomplete => "Replay ended before the cycle finalized".to_string(),
        }
    }
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReplayError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ReplayError {}

impl From<SessionError> for ReplayError {
    fn from(err: SessionError) -> Self {
        ReplayError::Session(err)
    }
}

impl From<hound::Error> for ReplayError {
    fn from(err: hound::Error) -> Self {
        ReplayError::Wav {
            reason: err.to_string(),
        }
    }
}

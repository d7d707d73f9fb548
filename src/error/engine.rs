// Engine-level error types

use crate::error::{AudioError, ErrorCode, SessionError};
use std::fmt;

/// Failure while starting or controlling a practice session
///
/// Wraps the component error unchanged so callers can still match on the
/// original code.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Session configuration or lifecycle error
    Session(SessionError),

    /// Audio device, clock or microphone error
    Audio(AudioError),
}

impl EngineError {
    /// True when the microphone could not be acquired
    pub fn is_microphone_failure(&self) -> bool {
        matches!(self, EngineError::Audio(err) if err.is_microphone_failure())
    }
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::Session(err) => err.code(),
            EngineError::Audio(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::Session(err) => err.message(),
            EngineError::Audio(err) => err.message(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Session(err) => err.fmt(f),
            EngineError::Audio(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Session(err) => Some(err),
            EngineError::Audio(err) => Some(err),
        }
    }
}

impl From<SessionError> for EngineError {
    fn from(err: SessionError) -> Self {
        EngineError::Session(err)
    }
}

impl From<AudioError> for EngineError {
    fn from(err: AudioError) -> Self {
        EngineError::Audio(err)
    }
}

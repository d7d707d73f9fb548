// Audio error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioBackend, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover the audio clock, microphone capture and click output.
/// None of them is retried automatically.
///
/// Error code range: 1001-1008
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Audio backend is already open
    AlreadyRunning,

    /// Audio backend is not open
    NotRunning,

    /// Output device (and therefore the audio clock) could not be created
    DeviceUnavailable { details: String },

    /// Microphone permission was refused by the platform
    PermissionDenied,

    /// Microphone could not be acquired
    MicrophoneUnavailable { details: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred on a running stream
    HardwareError { details: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl AudioError {
    /// Whether this error means the microphone is not usable
    pub fn is_microphone_failure(&self) -> bool {
        matches!(
            self,
            AudioError::PermissionDenied | AudioError::MicrophoneUnavailable { .. }
        )
    }
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::AlreadyRunning => 1001,
            AudioError::NotRunning => 1002,
            AudioError::DeviceUnavailable { .. } => 1003,
            AudioError::PermissionDenied => 1004,
            AudioError::MicrophoneUnavailable { .. } => 1005,
            AudioError::StreamOpenFailed { .. } => 1006,
            AudioError::HardwareError { .. } => 1007,
            AudioError::LockPoisoned { .. } => 1008,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::AlreadyRunning => {
                "Audio backend already running. Stop the session first.".to_string()
            }
            AudioError::NotRunning => "Audio backend not running".to_string(),
            AudioError::DeviceUnavailable { details } => {
                format!("Audio device unavailable: {}", details)
            }
            AudioError::PermissionDenied => "Microphone permission denied".to_string(),
            AudioError::MicrophoneUnavailable { details } => {
                format!("Microphone unavailable: {}", details)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

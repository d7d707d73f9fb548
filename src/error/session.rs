// Session error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=SessionController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Practice-session errors
///
/// Configuration problems are reported before any audio is opened.
/// `ScheduleOverrun` is internal: the controller logs it and recovers by
/// force-counting the overdue slots.
///
/// Error code range: 2001-2008
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Session configuration failed validation
    InvalidConfig { reason: String },

    /// Tone is not present in the chord catalog
    UnknownTone { tone: String },

    /// Progression contains a token that is not a roman numeral
    UnknownNumeral { token: String, progression: String },

    /// Progression resolved to no chords
    EmptyProgression { progression: String },

    /// A session is already counting down or running
    AlreadyActive,

    /// No session is active
    NotActive,

    /// A loop tick found more than one bar of unprocessed slots
    ScheduleOverrun { overdue: usize },

    /// Shared session state lock was poisoned
    StatePoisoned,
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::InvalidConfig { .. } => 2001,
            SessionError::UnknownTone { .. } => 2002,
            SessionError::UnknownNumeral { .. } => 2003,
            SessionError::EmptyProgression { .. } => 2004,
            SessionError::AlreadyActive => 2005,
            SessionError::NotActive => 2006,
            SessionError::ScheduleOverrun { .. } => 2007,
            SessionError::StatePoisoned => 2008,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::InvalidConfig { reason } => {
                format!("Invalid session config: {}", reason)
            }
            SessionError::UnknownTone { tone } => format!("Unknown tone '{}'", tone),
            SessionError::UnknownNumeral { token, progression } => {
                format!(
                    "Unknown roman numeral '{}' in progression '{}'",
                    token, progression
                )
            }
            SessionError::EmptyProgression { progression } => {
                format!("Progression '{}' has no chords", progression)
            }
            SessionError::AlreadyActive => "A practice session is already active".to_string(),
            SessionError::NotActive => "No practice session is active".to_string(),
            SessionError::ScheduleOverrun { overdue } => {
                format!("Detection loop stalled: {} overdue slots force-counted", overdue)
            }
            SessionError::StatePoisoned => "Session state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_codes() {
        assert_eq!(
            SessionError::InvalidConfig {
                reason: "x".to_string()
            }
            .code(),
            2001
        );
        assert_eq!(SessionError::AlreadyActive.code(), 2005);
        assert_eq!(SessionError::ScheduleOverrun { overdue: 3 }.code(), 2007);
    }

    #[test]
    fn test_unknown_numeral_message() {
        let err = SessionError::UnknownNumeral {
            token: "IIV".to_string(),
            progression: "I-IIV-V".to_string(),
        };
        assert!(err.message().contains("'IIV'"));
        assert!(err.message().contains("I-IIV-V"));
    }
}

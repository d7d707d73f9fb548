// Progress ledger error types

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Log a progress ledger error with structured context
pub fn log_progress_error(err: &ProgressError, context: &str) {
    error!(
        "Progress error in {}: code={}, component=ProgressLedger, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Progress persistence errors
///
/// Error code range: 3001-3002
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressError {
    /// Reading or writing the backing store failed
    Io { details: String },

    /// Stored data could not be parsed
    Corrupt { details: String },
}

impl ErrorCode for ProgressError {
    fn code(&self) -> i32 {
        match self {
            ProgressError::Io { .. } => 3001,
            ProgressError::Corrupt { .. } => 3002,
        }
    }

    fn message(&self) -> String {
        match self {
            ProgressError::Io { details } => format!("Progress store I/O failed: {}", details),
            ProgressError::Corrupt { details } => {
                format!("Progress store is corrupt: {}", details)
            }
        }
    }
}

impl fmt::Display for ProgressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProgressError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ProgressError {}

impl From<std::io::Error> for ProgressError {
    fn from(err: std::io::Error) -> Self {
        ProgressError::Io {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ProgressError {
    fn from(err: serde_json::Error) -> Self {
        ProgressError::Corrupt {
            details: err.to_string(),
        }
    }
}

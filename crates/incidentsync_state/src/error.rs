//! Error types for state operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StateError {
    /// An I/O error occurred (permission, disk full, missing directory).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The state file holds content that cannot be interpreted.
    #[error("state file {path} is corrupted: {message}")]
    Corrupted {
        /// The offending file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// A cursor save would move the cursor backwards.
    #[error("cursor cannot move backwards: current {current}, attempted {attempted}")]
    CursorRegression {
        /// The cursor currently persisted.
        current: u64,
        /// The rejected value.
        attempted: u64,
    },

    /// The advisory lock on a state file could not be acquired.
    #[error("state file {0} is locked by another process")]
    Locked(PathBuf),
}

impl StateError {
    /// Creates a corruption error for the given path.
    pub fn corrupted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupted {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StateError::CursorRegression {
            current: 10,
            attempted: 4,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("4"));

        let err = StateError::corrupted("/tmp/cursor", "not a number");
        assert_eq!(
            err.to_string(),
            "state file /tmp/cursor is corrupted: not a number"
        );
    }
}

//! Error types for the sync engine.

use incidentsync_protocol::ProtocolError;
use incidentsync_state::StateError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The incident source failed (network, non-2xx, bad body).
    #[error("incident source error: {message}")]
    Source {
        /// Error message.
        message: String,
        /// Whether the request can be retried.
        retryable: bool,
    },

    /// The ticket sink failed (network, validation, non-2xx).
    #[error("ticket sink error: {message}")]
    Sink {
        /// Error message.
        message: String,
        /// Whether the request can be retried.
        retryable: bool,
    },

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A request exceeded its timeout.
    #[error("request timed out")]
    Timeout,

    /// No cursor has been seeded.
    #[error("no cursor found; seed a minimum incident id before starting")]
    MissingCursor,

    /// Persisted state could not be read or written.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// The incident could not be turned into a ticket.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A cycle was started while another was still running.
    #[error("a cycle is already in progress")]
    CycleInProgress,
}

impl SyncError {
    /// Creates a retryable source error.
    pub fn source_retryable(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable source error.
    pub fn source_fatal(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a retryable sink error.
    pub fn sink_retryable(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable sink error.
    pub fn sink_fatal(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the transport layer may retry the request.
    ///
    /// This only governs the bounded backoff around a single call. Failed
    /// deliveries are retried by the reconciliation loop regardless.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Source { retryable, .. } | SyncError::Sink { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::source_retryable("connection reset").is_retryable());
        assert!(!SyncError::source_fatal("400 bad filter").is_retryable());
        assert!(SyncError::sink_retryable("503").is_retryable());
        assert!(!SyncError::sink_fatal("project does not exist").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(!SyncError::AuthenticationFailed("401".into()).is_retryable());
        assert!(!SyncError::MissingCursor.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::MissingCursor;
        assert!(err.to_string().contains("seed"));

        let err: SyncError = StateError::CursorRegression {
            current: 2,
            attempted: 1,
        }
        .into();
        assert!(err.to_string().starts_with("state error"));
    }
}

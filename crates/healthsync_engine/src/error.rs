//! Error types for the sync engine.

use healthsync_protocol::ProtocolError;
use healthsync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// None of these cross the engine's public entry points: every cycle
/// resolves to a [`crate::SyncOutcome`].
#[derive(Error, Debug)]
pub enum SyncError {
    /// The health store is not installed, initialized or authorized.
    #[error("health source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source no longer recognizes the change token.
    #[error("change token expired")]
    TokenExpired,

    /// The backend host could not be reached.
    #[error("cannot reach server: {0}")]
    NetworkUnreachable(String),

    /// The request to the backend timed out.
    #[error("connection timed out")]
    NetworkTimeout,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered but did not accept the batch.
    #[error("server rejected sync (status {status})")]
    ServerRejected {
        /// HTTP status code.
        status: u16,
        /// Message from the response body, if any.
        message: Option<String>,
    },

    /// A full sync found nothing to send and there is no earlier result.
    #[error("no health data available")]
    NoDataAvailable,

    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Encoding or validation failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Returns true if a submission that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::NetworkUnreachable(_) | SyncError::NetworkTimeout | SyncError::Transport(_)
        )
    }

    /// Returns the message shown to the user for a failed cycle.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::NetworkUnreachable(_) => "Network error: Cannot reach server".to_string(),
            SyncError::NetworkTimeout => "Network error: Connection timed out".to_string(),
            SyncError::ServerRejected { status, message } => message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("Server error: {status}")),
            SyncError::NoDataAvailable => "No health data found".to_string(),
            SyncError::SourceUnavailable(detail) | SyncError::Transport(detail) => {
                format!("Error: {detail}")
            }
            other => format!("Error: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::NetworkUnreachable("dns".into()).is_retryable());
        assert!(SyncError::NetworkTimeout.is_retryable());
        assert!(SyncError::Transport("reset".into()).is_retryable());
        assert!(!SyncError::TokenExpired.is_retryable());
        assert!(!SyncError::ServerRejected {
            status: 500,
            message: None
        }
        .is_retryable());
        assert!(!SyncError::SourceUnavailable("not installed".into()).is_retryable());
    }

    #[test]
    fn categorized_user_messages() {
        assert_eq!(
            SyncError::NetworkUnreachable("dns".into()).user_message(),
            "Network error: Cannot reach server"
        );
        assert_eq!(
            SyncError::NetworkTimeout.user_message(),
            "Network error: Connection timed out"
        );
        assert_eq!(
            SyncError::Transport("connection reset".into()).user_message(),
            "Error: connection reset"
        );
    }

    #[test]
    fn server_rejection_message() {
        let with_message = SyncError::ServerRejected {
            status: 400,
            message: Some("Invalid payload".into()),
        };
        assert_eq!(with_message.user_message(), "Invalid payload");

        let without = SyncError::ServerRejected {
            status: 503,
            message: None,
        };
        assert_eq!(without.user_message(), "Server error: 503");

        let blank = SyncError::ServerRejected {
            status: 502,
            message: Some(String::new()),
        };
        assert_eq!(blank.user_message(), "Server error: 502");
    }

    #[test]
    fn error_display() {
        assert_eq!(SyncError::TokenExpired.to_string(), "change token expired");
        assert!(SyncError::ServerRejected {
            status: 418,
            message: None
        }
        .to_string()
        .contains("418"));
    }
}

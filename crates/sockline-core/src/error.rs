use std::io;

use thiserror::Error;

use crate::types::ConnectionState;

/// Errors that can occur during TCP client operations
#[derive(Error, Debug)]
pub enum ClientError {
    // Precondition violations
    #[error("Already connected to server")]
    AlreadyConnected,

    #[error("Not connected to server")]
    NotConnected,

    #[error("Connection is {0}, another transition is in progress")]
    TransitionInProgress(ConnectionState),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Not running inside a Tokio runtime")]
    RuntimeUnavailable,

    // Transport failures
    #[error("Failed to connect to {endpoint}: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Whether the error was raised by a precondition check.
    ///
    /// Precondition errors are returned before anything touches the
    /// transport, so the connection is left exactly as it was.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ClientError::AlreadyConnected
                | ClientError::NotConnected
                | ClientError::TransitionInProgress(_)
                | ClientError::InvalidArgument(_)
                | ClientError::RuntimeUnavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(ClientError::AlreadyConnected.is_precondition());
        assert!(ClientError::NotConnected.is_precondition());
        assert!(ClientError::InvalidArgument("data").is_precondition());
        assert!(ClientError::TransitionInProgress(ConnectionState::Connecting).is_precondition());
        assert!(ClientError::RuntimeUnavailable.is_precondition());

        let io = ClientError::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(!io.is_precondition());
        assert!(!ClientError::ConnectionLost("peer".into()).is_precondition());
    }

    #[test]
    fn test_connect_failed_display() {
        let err = ClientError::ConnectFailed {
            endpoint: "127.0.0.1:1".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to connect to 127.0.0.1:1"));
    }

    #[test]
    fn test_transition_in_progress_display() {
        let err = ClientError::TransitionInProgress(ConnectionState::Disconnecting);
        assert_eq!(
            err.to_string(),
            "Connection is Disconnecting, another transition is in progress"
        );
    }
}

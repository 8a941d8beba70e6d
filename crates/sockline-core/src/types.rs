//! Shared vocabulary for the client: lifecycle states, operation kinds and
//! the event payload handed to observers.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──► Disconnecting ──► Disconnected
//!                      │                                              ▲
//!                      └──────────────── (connect failed) ────────────┘
//! ```
//!
//! `Disconnected` is both the initial state and the state every failure
//! converges on, so a client can go through any number of connect cycles.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No duplex stream exists.
    #[default]
    Disconnected,

    /// A connect is in flight.
    Connecting,

    /// The duplex stream is up and the receive loop is running.
    Connected,

    /// Teardown is in flight; the stream still exists.
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Disconnecting => "Disconnecting",
        };
        write!(f, "{}", state_str)
    }
}

impl ConnectionState {
    /// Check if transition to target state is valid from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use sockline_core::ConnectionState;
    ///
    /// assert!(ConnectionState::Disconnected.can_transition_to(&ConnectionState::Connecting));
    /// assert!(!ConnectionState::Disconnected.can_transition_to(&ConnectionState::Connected));
    /// ```
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        matches!(
            (self, target),
            (ConnectionState::Disconnected, ConnectionState::Connecting)
                // connect succeeded or failed
                | (ConnectionState::Connecting, ConnectionState::Connected | ConnectionState::Disconnected)
                | (ConnectionState::Connected, ConnectionState::Disconnecting)
                | (ConnectionState::Disconnecting, ConnectionState::Disconnected)
        )
    }

    /// Whether a duplex stream exists in this state.
    pub fn has_stream(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::Disconnecting
        )
    }
}

/// Operation a [`SocketEvent`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketOperation {
    Connect,
    Disconnect,
    Send,
    Receive,
}

impl fmt::Display for SocketOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "Connect"),
            Self::Disconnect => write!(f, "Disconnect"),
            Self::Send => write!(f, "Send"),
            Self::Receive => write!(f, "Receive"),
        }
    }
}

/// Notification delivered to observers when an operation completes.
///
/// Events are immutable and cheap to clone: the payload is a shared
/// [`Bytes`] buffer and the failure, if any, sits behind an [`Arc`].
#[derive(Debug, Clone)]
pub struct SocketEvent {
    operation: SocketOperation,
    data: Option<Bytes>,
    error: Option<Arc<ClientError>>,
    timestamp: DateTime<Utc>,
}

impl SocketEvent {
    /// Successful completion with no payload (connect, disconnect).
    pub fn new(operation: SocketOperation) -> Self {
        Self {
            operation,
            data: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Successful completion carrying bytes (send, receive).
    pub fn with_data(operation: SocketOperation, data: Bytes) -> Self {
        Self {
            data: Some(data),
            ..Self::new(operation)
        }
    }

    /// Completion that failed, or a disconnect caused by a failure.
    pub fn failed(operation: SocketOperation, error: ClientError) -> Self {
        Self {
            error: Some(Arc::new(error)),
            ..Self::new(operation)
        }
    }

    pub fn operation(&self) -> SocketOperation {
        self.operation
    }

    /// Bytes sent or received, if the operation carries any.
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// When the event was produced.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

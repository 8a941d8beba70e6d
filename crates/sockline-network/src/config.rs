use std::time::Duration;

use serde::{Deserialize, Serialize};
use sockline_core::constants::{
    DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_KEEPALIVE, DEFAULT_NODELAY,
    DEFAULT_SHUTDOWN_TIMEOUT_MS, MIN_EVENT_QUEUE_CAPACITY,
};

/// Configuration for TCP client
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use sockline_network::TcpClientConfig;
///
/// let config: TcpClientConfig = serde_json::from_str(r#"{ "nodelay": false }"#).unwrap();
/// assert!(!config.nodelay);
/// assert_eq!(config.shutdown_timeout_ms, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpClientConfig {
    /// Disable Nagle's algorithm on the duplex stream.
    pub nodelay: bool,

    /// Enable SO_KEEPALIVE on the socket.
    pub keepalive: bool,

    /// SO_RCVBUF hint, left to the OS when `None`.
    pub recv_buffer_size: Option<u32>,

    /// SO_SNDBUF hint, left to the OS when `None`.
    pub send_buffer_size: Option<u32>,

    /// Number of events that may wait for observers before producers
    /// (the receive loop included) have to wait.
    pub event_queue_capacity: usize,

    /// Limit for each flush/shutdown step of a graceful disconnect.
    pub shutdown_timeout_ms: u64,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            nodelay: DEFAULT_NODELAY,
            keepalive: DEFAULT_KEEPALIVE,
            recv_buffer_size: None,
            send_buffer_size: None,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl TcpClientConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Queue bound actually used; a zero capacity is raised to the minimum.
    pub(crate) fn queue_capacity(&self) -> usize {
        self.event_queue_capacity.max(MIN_EVENT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = TcpClientConfig::default();
        assert!(config.nodelay);
        assert!(!config.keepalive);
        assert_eq!(config.recv_buffer_size, None);
        assert_eq!(config.event_queue_capacity, DEFAULT_EVENT_QUEUE_CAPACITY);
        assert_eq!(config.shutdown_timeout().as_millis(), 500);
    }

    #[test]
    fn test_zero_queue_capacity_is_raised() {
        let config = TcpClientConfig {
            event_queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.queue_capacity(), MIN_EVENT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = TcpClientConfig {
            keepalive: true,
            recv_buffer_size: Some(65536),
            ..Default::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: TcpClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}

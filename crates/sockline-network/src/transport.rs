//! Transport handle: socket options and the raw TCP connect.
//!
//! The handle lives as long as the client. Each connect attempt builds a
//! fresh [`TcpSocket`] from the stored options, because a tokio socket is
//! consumed by `connect` and cannot be reused after a disconnect.

use std::io;
use std::net::SocketAddr;

use sockline_core::ClientError;
use tokio::net::{TcpSocket, TcpStream, lookup_host};
use tracing::{debug, warn};

use crate::config::TcpClientConfig;

#[derive(Debug, Clone)]
pub(crate) struct TransportHandle {
    nodelay: bool,
    keepalive: bool,
    recv_buffer_size: Option<u32>,
    send_buffer_size: Option<u32>,
}

impl TransportHandle {
    pub(crate) fn new(config: &TcpClientConfig) -> Self {
        Self {
            nodelay: config.nodelay,
            keepalive: config.keepalive,
            recv_buffer_size: config.recv_buffer_size,
            send_buffer_size: config.send_buffer_size,
        }
    }

    /// Resolve `endpoint` and connect to the first address that accepts.
    pub(crate) async fn open(&self, endpoint: &str) -> Result<TcpStream, ClientError> {
        let connect_failed = |source: io::Error| ClientError::ConnectFailed {
            endpoint: endpoint.to_string(),
            source,
        };

        let addrs = lookup_host(endpoint).await.map_err(connect_failed)?;

        let mut last_error = None;
        for addr in addrs {
            match self.connect_addr(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(%addr, error = %e, "Connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(connect_failed(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "endpoint resolved to no addresses",
            )
        })))
    }

    async fn connect_addr(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };

        socket.set_keepalive(self.keepalive)?;
        if let Some(size) = self.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(size) = self.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }

        let stream = socket.connect(addr).await?;

        if let Err(e) = stream.set_nodelay(self.nodelay) {
            warn!("Failed to set TCP_NODELAY: {} - latency may be impacted", e);
        }

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_applies_nodelay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = TransportHandle::new(&TcpClientConfig::default());
        let stream = transport.open(&addr.to_string()).await.unwrap();

        assert!(stream.nodelay().unwrap());
        assert_eq!(stream.peer_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn test_open_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = TransportHandle::new(&TcpClientConfig::default());
        let result = transport.open(&addr.to_string()).await;

        assert!(matches!(result, Err(ClientError::ConnectFailed { .. })));
    }

    #[tokio::test]
    async fn test_open_unresolvable_endpoint() {
        let transport = TransportHandle::new(&TcpClientConfig::default());
        let result = transport.open("not an endpoint").await;

        match result {
            Err(ClientError::ConnectFailed { endpoint, .. }) => {
                assert_eq!(endpoint, "not an endpoint")
            }
            other => panic!("expected ConnectFailed, got {:?}", other),
        }
    }
}

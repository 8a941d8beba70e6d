//! Network layer for Sockline
//!
//! This crate provides an event-driven TCP client. It owns one duplex
//! byte-stream session at a time, keeps a receive loop running for as long
//! as that session lives, and reports completions and inbound data to
//! subscribers as [`SocketEvent`]s.
//!
//! # Components
//!
//! - **TcpClient**: the public façade (connect, send, disconnect, subscribe)
//! - **Lifecycle**: the Disconnected/Connecting/Connected/Disconnecting state machine
//! - **Session**: send pipeline and receive loop tasks over a framed stream
//! - **EventDispatcher**: bounded event queue drained by one pump task
//!
//! # Example
//!
//! ```no_run
//! use sockline_network::{TcpClient, TcpClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TcpClient::new(TcpClientConfig::default());
//! client.on_receive(|event| println!("{:?}", event.data()));
//!
//! client.connect("127.0.0.1:3000").await?;
//! client.send(vec![0x01, 0x02, 0x03]).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod dispatcher;
mod lifecycle;
mod operation;
mod receiver;
mod sender;
mod session;
mod transport;

pub use client::TcpClient;
pub use config::TcpClientConfig;
pub use dispatcher::SubscriptionId;
pub use sockline_core::{ClientError, ConnectionState, SocketEvent, SocketOperation};

//! Event-driven TCP client.
//!
//! [`TcpClient`] manages one duplex byte-stream session with one server.
//! Connect, send and disconnect each come in two variants:
//!
//! - **blocking** (`connect`, `send`, `disconnect`): `async fn`s that
//!   suspend the caller until the operation completes and return its result
//! - **detached** (`connect_async`, `send_async`, `disconnect_async`):
//!   plain `fn`s that check preconditions, start the operation and return at
//!   once; the outcome arrives as an event
//!
//! Once connected, inbound frames are delivered through Receive events
//! without the caller ever asking for them.
//!
//! # Architecture
//!
//! ```text
//! TcpClient
//!     │
//!     ├─> Lifecycle ──── state + live Session (one mutex)
//!     │       │
//!     │       └─> Session ──┬─> writer task (send pipeline)
//!     │                     └─> reader task (receive loop)
//!     │                               │
//!     ├─> TransportHandle             │ (Framed<TcpStream, C>)
//!     │                               ▼
//!     └─> EventDispatcher ◄──── bounded event queue ───► subscribers
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use sockline_network::{TcpClient, TcpClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TcpClient::new(TcpClientConfig::default());
//!
//! client.on_receive(|event| {
//!     if let Some(data) = event.data() {
//!         println!("received {} bytes", data.len());
//!     }
//! });
//! client.on_disconnect(|event| match event.error() {
//!     Some(e) => eprintln!("connection dropped: {e}"),
//!     None => println!("disconnected"),
//! });
//!
//! client.connect("127.0.0.1:3000").await?;
//! client.send(&b"hello"[..]).await?;
//! client.send_async(&b"world"[..])?;
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Failures
//!
//! Precondition violations (connecting twice, sending while disconnected,
//! empty payloads or endpoints) are returned synchronously and change
//! nothing. Transport failures that happen after a call has returned never
//! surface as errors: they force the session down, and observers get a
//! single Disconnect event carrying the cause.
//!
//! # Timeouts
//!
//! There are none built in. Wrap blocking calls in `tokio::time::timeout`
//! and disconnect when the deadline passes. A blocking connect or
//! disconnect runs on its own task, so abandoning the call does not abandon
//! the transition: it still completes in the background.

use std::sync::Arc;

use bytes::Bytes;
use sockline_codec::{FrameCodec, RawCodec};
use sockline_core::constants::READ_BUFFER_CAPACITY;
use sockline_core::{ClientError, ConnectionState, SocketEvent, SocketOperation};
use tokio::runtime::Handle;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::config::TcpClientConfig;
use crate::dispatcher::{EventDispatcher, SubscriptionId};
use crate::lifecycle::Lifecycle;
use crate::operation::{CallMode, Operation};
use crate::session::{DuplexStream, Session};
use crate::transport::TransportHandle;

/// TCP client delivering completions and inbound frames as events.
///
/// Cloning is cheap and every clone drives the same connection. The
/// connection is closed once the last clone is dropped.
///
/// # Runtime
///
/// Connect and disconnect spawn tasks on the current Tokio runtime. Called
/// outside one, they fail with [`ClientError::RuntimeUnavailable`] and leave
/// the client untouched.
///
/// # Example
///
/// ```no_run
/// use sockline_network::{TcpClient, TcpClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = TcpClient::new(TcpClientConfig::default());
/// assert!(!client.is_connected());
///
/// client.connect("127.0.0.1:3000").await?;
/// assert!(client.is_connected());
///
/// client.close().await?;
/// assert!(!client.is_connected());
/// # Ok(())
/// # }
/// ```
pub struct TcpClient<C: FrameCodec = RawCodec> {
    inner: Arc<ClientInner<C>>,
}

impl<C: FrameCodec> Clone for TcpClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<C: FrameCodec> {
    config: TcpClientConfig,
    transport: TransportHandle,
    codec: C,
    lifecycle: Arc<Lifecycle<C>>,
    events: EventDispatcher,
}

impl TcpClient<RawCodec> {
    /// Create a client that passes bytes through unframed.
    ///
    /// The client is not connected after creation.
    ///
    /// ```
    /// use sockline_network::{TcpClient, TcpClientConfig};
    ///
    /// let client = TcpClient::new(TcpClientConfig::default());
    /// assert!(!client.is_connected());
    /// ```
    pub fn new(config: TcpClientConfig) -> Self {
        Self::with_codec(config, RawCodec::new())
    }
}

impl<C: FrameCodec> TcpClient<C> {
    /// Create a client that frames the stream with `codec`.
    ///
    /// ```
    /// use sockline_codec::LengthDelimitedCodec;
    /// use sockline_network::{TcpClient, TcpClientConfig};
    ///
    /// let client = TcpClient::with_codec(TcpClientConfig::default(), LengthDelimitedCodec::new());
    /// assert!(!client.is_connected());
    /// ```
    pub fn with_codec(config: TcpClientConfig, codec: C) -> Self {
        debug!(?config, "Creating TCP client");

        Self {
            inner: Arc::new(ClientInner {
                transport: TransportHandle::new(&config),
                events: EventDispatcher::new(config.queue_capacity()),
                lifecycle: Arc::new(Lifecycle::new()),
                codec,
                config,
            }),
        }
    }

    pub fn config(&self) -> &TcpClientConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.state()
    }

    /// Check if client is connected to server
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Connect to `endpoint` (`host:port`) and wait for the outcome.
    ///
    /// On success the receive loop is running when this returns. No Connect
    /// event is raised; the return value is the notification.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AlreadyConnected`] if connected
    /// - [`ClientError::InvalidArgument`] if `endpoint` is empty
    /// - [`ClientError::TransitionInProgress`] if another connect or
    ///   disconnect is in flight
    /// - [`ClientError::RuntimeUnavailable`] outside a Tokio runtime
    /// - [`ClientError::ConnectFailed`] if resolution or the TCP connect
    ///   fails; the client is back in `Disconnected`
    pub async fn connect(&self, endpoint: &str) -> Result<(), ClientError> {
        let (op, completion) = Operation::blocking(SocketOperation::Connect, None);
        self.spawn_connect(endpoint, op)?;
        completion.wait().await
    }

    /// Start connecting to `endpoint` and return immediately.
    ///
    /// A Connect event reports the outcome, successful or not.
    ///
    /// # Errors
    ///
    /// Only precondition violations, as for [`connect`](Self::connect).
    pub fn connect_async(&self, endpoint: &str) -> Result<(), ClientError> {
        self.spawn_connect(endpoint, Operation::detached(SocketOperation::Connect, None))
    }

    /// Gracefully close the connection and wait for teardown to finish.
    ///
    /// No Disconnect event is raised.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if not connected
    /// - [`ClientError::TransitionInProgress`] if a connect or disconnect is
    ///   in flight
    /// - [`ClientError::RuntimeUnavailable`] outside a Tokio runtime
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let (op, completion) = Operation::blocking(SocketOperation::Disconnect, None);
        self.spawn_disconnect(op)?;
        completion.wait().await
    }

    /// Start a graceful disconnect and return immediately.
    ///
    /// A Disconnect event is raised once teardown finishes.
    pub fn disconnect_async(&self) -> Result<(), ClientError> {
        self.spawn_disconnect(Operation::detached(SocketOperation::Disconnect, None))
    }

    /// Send `data` and wait until it has been written to the socket.
    ///
    /// No Send event is raised.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if not connected
    /// - [`ClientError::InvalidArgument`] if `data` is empty
    /// - [`ClientError::Io`] if the write failed; the connection has been
    ///   forced down
    /// - [`ClientError::ConnectionLost`] if the connection went down before
    ///   the write happened
    pub async fn send(&self, data: impl Into<Bytes>) -> Result<(), ClientError> {
        let data = self.check_send(data.into())?;

        let (op, completion) = Operation::blocking(SocketOperation::Send, Some(data));
        self.inner.lifecycle.submit(op)?;
        completion.wait().await
    }

    /// Queue `data` for sending and return immediately.
    ///
    /// A Send event carrying `data` is raised once it is written. If the
    /// write fails, no Send event is raised; the Disconnect event of the
    /// forced disconnect reports the failure instead.
    ///
    /// # Errors
    ///
    /// Only precondition violations, as for [`send`](Self::send).
    pub fn send_async(&self, data: impl Into<Bytes>) -> Result<(), ClientError> {
        let data = self.check_send(data.into())?;

        self.inner
            .lifecycle
            .submit(Operation::detached(SocketOperation::Send, Some(data)))
    }

    /// Disconnect if connected. Calling this more than once is safe.
    pub async fn close(&self) -> Result<(), ClientError> {
        match self.disconnect().await {
            Ok(()) | Err(ClientError::NotConnected) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Register `handler` for events of `operation`.
    ///
    /// Handlers of one channel run in registration order, on the
    /// dispatcher's task. They must not block.
    pub fn subscribe<F>(&self, operation: SocketOperation, handler: F) -> SubscriptionId
    where
        F: Fn(SocketEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(operation, Arc::new(handler))
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub fn on_connect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(SocketEvent) + Send + Sync + 'static,
    {
        self.subscribe(SocketOperation::Connect, handler)
    }

    pub fn on_disconnect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(SocketEvent) + Send + Sync + 'static,
    {
        self.subscribe(SocketOperation::Disconnect, handler)
    }

    pub fn on_send<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(SocketEvent) + Send + Sync + 'static,
    {
        self.subscribe(SocketOperation::Send, handler)
    }

    pub fn on_receive<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(SocketEvent) + Send + Sync + 'static,
    {
        self.subscribe(SocketOperation::Receive, handler)
    }

    fn spawn_connect(&self, endpoint: &str, op: Operation) -> Result<(), ClientError> {
        let runtime = self.inner.begin_connect(endpoint)?;

        let inner = Arc::clone(&self.inner);
        let endpoint = endpoint.to_string();
        runtime.spawn(async move {
            inner.run_connect(&endpoint, op).await;
        });
        Ok(())
    }

    fn spawn_disconnect(&self, op: Operation) -> Result<(), ClientError> {
        let runtime = current_runtime()?;
        let session = self.inner.lifecycle.begin_disconnect()?;

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            inner.run_disconnect(session, op).await;
        });
        Ok(())
    }

    fn check_send(&self, data: Bytes) -> Result<Bytes, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        if data.is_empty() {
            return Err(ClientError::InvalidArgument("data must not be empty"));
        }
        Ok(data)
    }
}

fn current_runtime() -> Result<Handle, ClientError> {
    Handle::try_current().map_err(|_| ClientError::RuntimeUnavailable)
}

impl<C: FrameCodec> ClientInner<C> {
    /// Precondition checks, then Disconnected → Connecting.
    ///
    /// Returns the runtime the rest of the connect runs on.
    fn begin_connect(&self, endpoint: &str) -> Result<Handle, ClientError> {
        if self.lifecycle.state() == ConnectionState::Connected {
            return Err(ClientError::AlreadyConnected);
        }
        if endpoint.trim().is_empty() {
            return Err(ClientError::InvalidArgument("endpoint must not be empty"));
        }
        let runtime = current_runtime()?;

        self.lifecycle.begin_connect()?;
        self.events.start(&runtime);
        Ok(runtime)
    }

    /// Second half of connect, after `begin_connect` moved to Connecting.
    async fn run_connect(&self, endpoint: &str, op: Operation) {
        info!("Connecting to server at {}", endpoint);

        let stream = match self.transport.open(endpoint).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Connection failed: {}", e);
                self.lifecycle.abort_connect();
                if let Some(event) = op.complete(Err(e)) {
                    self.events.sink().emit(event).await;
                }
                return;
            }
        };

        let peer = stream.peer_addr().ok();
        let duplex: DuplexStream<C> =
            Framed::with_capacity(stream, self.codec.clone(), READ_BUFFER_CAPACITY);

        // The Connect event has to be queued before the reader task can
        // queue anything, so its slot is reserved up front.
        let permit = match op.mode() {
            CallMode::Detached => self.events.sink().reserve().await,
            CallMode::Blocking => None,
        };

        let sink = self.events.sink();
        let lifecycle = Arc::downgrade(&self.lifecycle);
        let session = self.lifecycle.complete_connect(move |id| {
            if let (Some(event), Some(permit)) = (op.complete(Ok(())), permit) {
                permit.send(event);
            }
            Session::start(id, duplex, sink, lifecycle)
        });

        info!(session, ?peer, "Successfully connected to {}", endpoint);
    }

    /// Second half of disconnect, after `begin_disconnect` handed over the session.
    async fn run_disconnect(&self, session: Session<C>, op: Operation) {
        let id = session.id();
        info!(session = id, "Closing connection");

        session.shutdown(self.config.shutdown_timeout()).await;
        self.lifecycle.finish_disconnect();

        debug!(session = id, "Connection closed");
        if let Some(event) = op.complete(Ok(())) {
            self.events.sink().emit(event).await;
        }
    }
}

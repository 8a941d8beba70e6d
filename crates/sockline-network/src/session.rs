//! One connected session: the duplex stream split between a writer task
//! (send pipeline) and a reader task (receive loop).
//!
//! ```text
//!                    ┌───────────────────────────────┐
//! send/send_async ──►│ outbound ──► writer task ──►  │
//!                    │                  (sink)       │── TcpStream ──► peer
//!   observers ◄──────│ events  ◄─── reader task ◄──  │
//!                    │                  (stream)     │
//!                    └───────────────────────────────┘
//! ```
//!
//! Both tasks stop on the session's cancellation token. A task stopped that
//! way returns its half of the stream so a graceful disconnect can put the
//! halves back together and shut the socket down cleanly. Dropping a
//! session cancels the token too, so its tasks never outlive it.

use std::sync::Weak;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use sockline_codec::FrameCodec;
use sockline_core::ClientError;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dispatcher::EventSink;
use crate::lifecycle::{Lifecycle, Teardown};
use crate::operation::Operation;
use crate::{receiver, sender};

pub(crate) type DuplexStream<C> = Framed<TcpStream, C>;
pub(crate) type FrameSink<C> = SplitSink<DuplexStream<C>, Bytes>;
pub(crate) type FrameStream<C> = SplitStream<DuplexStream<C>>;

pub(crate) struct Session<C: FrameCodec> {
    id: u64,
    outbound: mpsc::UnboundedSender<Operation>,
    cancel: CancellationToken,
    writer: Option<JoinHandle<Option<FrameSink<C>>>>,
    reader: Option<JoinHandle<Option<FrameStream<C>>>>,
}

impl<C: FrameCodec> Session<C> {
    /// Split `duplex` and spawn the send pipeline and receive loop on it.
    pub(crate) fn start(
        id: u64,
        duplex: DuplexStream<C>,
        events: EventSink,
        lifecycle: Weak<Lifecycle<C>>,
    ) -> Self {
        let (sink, stream): (FrameSink<C>, FrameStream<C>) = duplex.split();
        let (outbound, queue) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let teardown = Teardown::new(lifecycle, events.clone(), id);

        let writer = tokio::spawn(sender::send_loop(
            sink,
            queue,
            cancel.clone(),
            events.clone(),
            teardown.clone(),
        ));
        let reader = tokio::spawn(receiver::receive_loop(
            stream,
            cancel.clone(),
            events,
            teardown,
        ));

        Self {
            id,
            outbound,
            cancel,
            writer: Some(writer),
            reader: Some(reader),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn submit(&self, op: Operation) -> Result<(), ClientError> {
        self.outbound
            .send(op)
            .map_err(|_| ClientError::ConnectionLost("send pipeline stopped".into()))
    }

    /// Stop both tasks without waiting for them.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop both tasks, then flush and shut down the socket.
    ///
    /// Each step is bounded by `grace`. Failures are logged and otherwise
    /// ignored: the session is going away regardless.
    pub(crate) async fn shutdown(mut self, grace: Duration) {
        let id = self.id;
        self.cancel.cancel();

        let sink = join_half(id, self.writer.take()).await;
        let stream = join_half(id, self.reader.take()).await;
        let (Some(sink), Some(stream)) = (sink, stream) else {
            debug!(session = id, "Stream already released, skipping graceful shutdown");
            return;
        };

        let mut duplex = match stream.reunite(sink) {
            Ok(duplex) => duplex,
            Err(_) => {
                warn!(session = id, "Stream halves do not belong together");
                return;
            }
        };

        match tokio::time::timeout(grace, SinkExt::<Bytes>::flush(&mut duplex)).await {
            Ok(Ok(())) => debug!(session = id, "Flush completed successfully"),
            Ok(Err(e)) => warn!(session = id, "Error flushing during disconnect: {}", e),
            Err(_) => warn!(
                session = id,
                "Flush timeout during disconnect ({}ms)",
                grace.as_millis()
            ),
        }

        let mut stream = duplex.into_inner();
        match tokio::time::timeout(grace, stream.shutdown()).await {
            Ok(Ok(())) => debug!(session = id, "Shutdown completed successfully"),
            Ok(Err(e)) => warn!(session = id, "Error during shutdown: {}", e),
            Err(_) => warn!(
                session = id,
                "Shutdown timeout during disconnect ({}ms)",
                grace.as_millis()
            ),
        }
    }
}

impl<C: FrameCodec> Drop for Session<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn join_half<T>(session: u64, task: Option<JoinHandle<Option<T>>>) -> Option<T> {
    match task?.await {
        Ok(half) => half,
        Err(e) => {
            warn!(session, error = %e, "Session task ended abnormally");
            None
        }
    }
}

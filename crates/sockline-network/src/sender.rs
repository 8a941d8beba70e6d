//! Send pipeline: the writer task of a session.
//!
//! Operations are written in the order they were submitted. A write error
//! means the stream is unusable, so the session is forced down; the failed
//! operation raises no Send event and anything still queued is dropped,
//! which resolves blocked senders with `ConnectionLost`.

use futures::SinkExt;
use sockline_codec::FrameCodec;
use sockline_core::ClientError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::dispatcher::EventSink;
use crate::lifecycle::Teardown;
use crate::operation::Operation;
use crate::session::FrameSink;

pub(crate) async fn send_loop<C: FrameCodec>(
    mut sink: FrameSink<C>,
    mut outbound: mpsc::UnboundedReceiver<Operation>,
    cancel: CancellationToken,
    events: EventSink,
    teardown: Teardown<C>,
) -> Option<FrameSink<C>> {
    let session = teardown.session();

    loop {
        let op = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Some(sink),
            op = outbound.recv() => match op {
                Some(op) => op,
                None => return Some(sink),
            },
        };

        let payload = op.payload().cloned().unwrap_or_default();
        let len = payload.len();

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(session, bytes = len, "Send abandoned by disconnect");
                return Some(sink);
            }
            written = sink.send(payload) => written,
        };

        match written {
            Ok(()) => {
                trace!(session, bytes = len, "Frame sent");
                if let Some(event) = op.complete(Ok(())) {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Some(sink),
                        _ = events.emit(event) => {}
                    }
                }
            }
            Err(e) => {
                warn!(session, bytes = len, error = %e, "Send failed");
                let cause = ClientError::ConnectionLost(format!("send failed: {e}"));
                teardown.force(Some(cause)).await;
                op.complete(Err(ClientError::Io(e)));
                return None;
            }
        }
    }
}

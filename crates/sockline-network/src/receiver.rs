//! Receive loop: the reader task of a session.
//!
//! Reads one frame at a time for as long as the session lives. Each frame
//! is queued as a Receive event and the next read starts right away, so
//! observers never sit between two reads. End of stream (or an empty frame)
//! is the peer closing the connection; a read error is a transport failure.
//! Either way the session is forced down and the loop stops.

use futures::StreamExt;
use sockline_codec::FrameCodec;
use sockline_core::{ClientError, SocketEvent, SocketOperation};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::dispatcher::EventSink;
use crate::lifecycle::Teardown;
use crate::session::FrameStream;

pub(crate) async fn receive_loop<C: FrameCodec>(
    mut stream: FrameStream<C>,
    cancel: CancellationToken,
    events: EventSink,
    teardown: Teardown<C>,
) -> Option<FrameStream<C>> {
    let session = teardown.session();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Some(stream),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(frame)) if !frame.is_empty() => {
                trace!(session, bytes = frame.len(), "Frame received");
                let event = SocketEvent::with_data(SocketOperation::Receive, frame.freeze());
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Some(stream),
                    _ = events.emit(event) => {}
                }
            }
            Some(Ok(_)) | None => {
                teardown.force(None).await;
                return None;
            }
            Some(Err(e)) => {
                warn!(session, error = %e, "Receive failed");
                teardown.force(Some(ClientError::Io(e))).await;
                return None;
            }
        }
    }
}

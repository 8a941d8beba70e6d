//! Per-call operation state.
//!
//! Every connect, send and disconnect call creates one [`Operation`]. It
//! travels with the work to whichever task completes it and is consumed by
//! [`Operation::complete`] exactly once. A blocking call keeps the matching
//! [`Completion`] and suspends on it; a detached call keeps nothing and
//! learns the outcome from the event `complete` hands back.

use bytes::Bytes;
use sockline_core::{ClientError, SocketEvent, SocketOperation};
use tokio::sync::oneshot;

/// How the caller observes completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallMode {
    /// The caller waits on a [`Completion`]; no event is raised.
    Blocking,
    /// The caller returned immediately; completion is reported as an event.
    Detached,
}

#[derive(Debug)]
pub(crate) struct Operation {
    kind: SocketOperation,
    mode: CallMode,
    payload: Option<Bytes>,
    waiter: Option<oneshot::Sender<Result<(), ClientError>>>,
}

impl Operation {
    pub(crate) fn blocking(kind: SocketOperation, payload: Option<Bytes>) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        let op = Self {
            kind,
            mode: CallMode::Blocking,
            payload,
            waiter: Some(tx),
        };
        (op, Completion { kind, rx })
    }

    pub(crate) fn detached(kind: SocketOperation, payload: Option<Bytes>) -> Self {
        Self {
            kind,
            mode: CallMode::Detached,
            payload,
            waiter: None,
        }
    }

    pub(crate) fn mode(&self) -> CallMode {
        self.mode
    }

    pub(crate) fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Resolve the operation and return the event to raise, if any.
    ///
    /// A failed detached send yields no event: the forced disconnect that
    /// follows a write failure is the only report of it.
    pub(crate) fn complete(mut self, outcome: Result<(), ClientError>) -> Option<SocketEvent> {
        match self.mode {
            CallMode::Blocking => {
                if let Some(waiter) = self.waiter.take() {
                    // The caller may have stopped waiting (e.g. its own timeout)
                    let _ = waiter.send(outcome);
                }
                None
            }
            CallMode::Detached => match outcome {
                Ok(()) => Some(match self.payload.take() {
                    Some(data) => SocketEvent::with_data(self.kind, data),
                    None => SocketEvent::new(self.kind),
                }),
                Err(_) if self.kind == SocketOperation::Send => None,
                Err(e) => Some(SocketEvent::failed(self.kind, e)),
            },
        }
    }
}

/// Waiting side of a blocking [`Operation`].
#[derive(Debug)]
pub(crate) struct Completion {
    kind: SocketOperation,
    rx: oneshot::Receiver<Result<(), ClientError>>,
}

impl Completion {
    /// Suspend until the operation completes.
    ///
    /// An operation dropped without completing, because a forced disconnect
    /// discarded it, resolves to [`ClientError::ConnectionLost`].
    pub(crate) async fn wait(self) -> Result<(), ClientError> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::ConnectionLost(format!(
                "{} abandoned before completion",
                self.kind
            ))),
        }
    }
}

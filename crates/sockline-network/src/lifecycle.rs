//! Connection lifecycle manager.
//!
//! Holds the [`ConnectionState`] and the live [`Session`] behind one mutex.
//! Every transition is a check-and-set under that mutex, and the
//! intermediate `Connecting`/`Disconnecting` states reject competing
//! transitions, so at most one connect or disconnect is in flight at a time.
//! The mutex is never held across an await: sends and the receive loop only
//! take it briefly to observe the state or to hand over an operation.
//!
//! # Invariant
//!
//! A session exists if and only if the state is `Connected`. It is taken out
//! of the slot when `Disconnecting` begins and torn down outside the lock.

use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

use sockline_codec::FrameCodec;
use sockline_core::{ClientError, ConnectionState, SocketEvent, SocketOperation};
use tracing::{debug, info, trace};

use crate::dispatcher::EventSink;
use crate::operation::Operation;
use crate::session::Session;

struct Slot<C: FrameCodec> {
    state: ConnectionState,
    session: Option<Session<C>>,
    next_session: u64,
}

impl<C: FrameCodec> Slot<C> {
    fn transition(&mut self, to: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(&to),
            "invalid transition {} -> {}",
            self.state,
            to
        );
        debug!(from = %self.state, %to, "Connection state transition");
        self.state = to;
    }
}

pub(crate) struct Lifecycle<C: FrameCodec> {
    slot: Mutex<Slot<C>>,
}

impl<C: FrameCodec> Lifecycle<C> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: ConnectionState::Disconnected,
                session: None,
                next_session: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<C>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Disconnected → Connecting.
    pub(crate) fn begin_connect(&self) -> Result<(), ClientError> {
        let mut slot = self.lock();
        match slot.state {
            ConnectionState::Disconnected => {
                slot.transition(ConnectionState::Connecting);
                Ok(())
            }
            ConnectionState::Connected => Err(ClientError::AlreadyConnected),
            state => Err(ClientError::TransitionInProgress(state)),
        }
    }

    /// Connecting → Disconnected after a failed connect.
    pub(crate) fn abort_connect(&self) {
        self.lock().transition(ConnectionState::Disconnected);
    }

    /// Connecting → Connected.
    ///
    /// `start` runs under the lock with the new session id. Anything it does
    /// (raising the connect event, spawning the session tasks) happens before
    /// any other caller can observe the session.
    pub(crate) fn complete_connect<F>(&self, start: F) -> u64
    where
        F: FnOnce(u64) -> Session<C>,
    {
        let mut slot = self.lock();
        slot.next_session += 1;
        let id = slot.next_session;

        slot.transition(ConnectionState::Connected);
        slot.session = Some(start(id));
        id
    }

    /// Connected → Disconnecting, handing the session to the caller for teardown.
    pub(crate) fn begin_disconnect(&self) -> Result<Session<C>, ClientError> {
        let mut slot = self.lock();
        match slot.state {
            ConnectionState::Connected => {
                slot.transition(ConnectionState::Disconnecting);
                slot.session
                    .take()
                    .ok_or_else(|| ClientError::ConnectionLost("session already released".into()))
            }
            ConnectionState::Disconnected => Err(ClientError::NotConnected),
            state => Err(ClientError::TransitionInProgress(state)),
        }
    }

    /// Disconnecting → Disconnected.
    pub(crate) fn finish_disconnect(&self) {
        self.lock().transition(ConnectionState::Disconnected);
    }

    /// Tear down session `id` unconditionally, skipping the precondition
    /// checks of [`begin_disconnect`](Self::begin_disconnect).
    ///
    /// Returns `false` when the session is already gone, either torn down by
    /// an explicit disconnect or replaced by a newer connection.
    pub(crate) fn force_disconnect(&self, id: u64) -> bool {
        let mut slot = self.lock();
        let current = slot.session.as_ref().map(Session::id);
        if slot.state != ConnectionState::Connected || current != Some(id) {
            trace!(session = id, "Forced disconnect skipped, session no longer live");
            return false;
        }

        slot.transition(ConnectionState::Disconnecting);
        if let Some(session) = slot.session.take() {
            session.cancel();
        }
        slot.transition(ConnectionState::Disconnected);
        true
    }

    /// Hand an operation to the live session's send pipeline.
    pub(crate) fn submit(&self, op: Operation) -> Result<(), ClientError> {
        let slot = self.lock();
        match (&slot.state, &slot.session) {
            (ConnectionState::Connected, Some(session)) => session.submit(op),
            _ => Err(ClientError::NotConnected),
        }
    }
}

impl<C: FrameCodec> Drop for Lifecycle<C> {
    fn drop(&mut self) {
        let slot = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(session) = slot.session.take() {
            debug!(
                session = session.id(),
                "TcpClient dropped while connected - connection will be closed"
            );
            session.cancel();
        }
    }
}

/// Forced-disconnect handle given to a session's tasks.
///
/// Holds the lifecycle weakly so running tasks do not keep a dropped
/// client alive.
pub(crate) struct Teardown<C: FrameCodec> {
    lifecycle: Weak<Lifecycle<C>>,
    events: EventSink,
    session: u64,
}

impl<C: FrameCodec> Clone for Teardown<C> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Weak::clone(&self.lifecycle),
            events: self.events.clone(),
            session: self.session,
        }
    }
}

impl<C: FrameCodec> Teardown<C> {
    pub(crate) fn new(lifecycle: Weak<Lifecycle<C>>, events: EventSink, session: u64) -> Self {
        Self {
            lifecycle,
            events,
            session,
        }
    }

    pub(crate) fn session(&self) -> u64 {
        self.session
    }

    /// Force the session down and raise the single Disconnect event for it.
    ///
    /// `cause` is `None` for an orderly close by the peer.
    pub(crate) async fn force(&self, cause: Option<ClientError>) {
        let Some(lifecycle) = self.lifecycle.upgrade() else {
            return;
        };
        if !lifecycle.force_disconnect(self.session) {
            return;
        }
        drop(lifecycle);

        let event = match cause {
            Some(error) => {
                info!(session = self.session, %error, "Connection dropped");
                SocketEvent::failed(SocketOperation::Disconnect, error)
            }
            None => {
                info!(session = self.session, "Connection closed by peer");
                SocketEvent::new(SocketOperation::Disconnect)
            }
        };
        self.events.emit(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sockline_codec::RawCodec;

    fn lifecycle() -> Lifecycle<RawCodec> {
        Lifecycle::new()
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        assert_eq!(lifecycle().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_second_connect_is_rejected_while_connecting() {
        let lifecycle = lifecycle();
        lifecycle.begin_connect().unwrap();
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);

        let err = lifecycle.begin_connect().unwrap_err();
        assert!(matches!(
            err,
            ClientError::TransitionInProgress(ConnectionState::Connecting)
        ));
    }

    #[test]
    fn test_failed_connect_returns_to_disconnected() {
        let lifecycle = lifecycle();
        lifecycle.begin_connect().unwrap();
        lifecycle.abort_connect();
        assert_eq!(lifecycle.state(), ConnectionState::Disconnected);

        // and a new attempt is allowed
        assert!(lifecycle.begin_connect().is_ok());
    }

    #[test]
    fn test_disconnect_requires_connection() {
        let lifecycle = lifecycle();
        assert!(matches!(
            lifecycle.begin_disconnect(),
            Err(ClientError::NotConnected)
        ));

        lifecycle.begin_connect().unwrap();
        assert!(matches!(
            lifecycle.begin_disconnect(),
            Err(ClientError::TransitionInProgress(ConnectionState::Connecting))
        ));
    }

    #[test]
    fn test_submit_requires_connection() {
        let lifecycle = lifecycle();
        let op = Operation::detached(SocketOperation::Send, Some(Bytes::from_static(b"x")));
        assert!(matches!(lifecycle.submit(op), Err(ClientError::NotConnected)));
    }

    #[test]
    fn test_force_without_session_is_noop() {
        let lifecycle = lifecycle();
        assert!(!lifecycle.force_disconnect(1));

        lifecycle.begin_connect().unwrap();
        assert!(!lifecycle.force_disconnect(1));
        assert_eq!(lifecycle.state(), ConnectionState::Connecting);
    }
}

//! Event dispatcher.
//!
//! Producers (the lifecycle, the send pipeline and the receive loop) push
//! events into one bounded queue and carry on. A single pump task drains the
//! queue and calls the subscribers of the event's channel in registration
//! order.
//!
//! ```text
//! ┌──────────────┐
//! │ Receive loop │──┐
//! └──────────────┘  │    ┌──────────────────┐     ┌───────────┐
//! ┌──────────────┐  ├───►│  Event queue     │────►│ Pump task │──► subscribers
//! │ Send pipeline│──┤    │  (bounded mpsc)  │     └───────────┘
//! └──────────────┘  │    └──────────────────┘
//! ┌──────────────┐  │
//! │ Lifecycle    │──┘
//! └──────────────┘
//! ```
//!
//! Because every channel shares the queue, subscribers see events in the
//! order they were produced. A full queue makes producers wait, which is
//! how a slow subscriber pushes back on the receive loop.
//!
//! Subscribers run on the pump task, never on the caller's task. A panic in
//! a subscriber is caught and logged; the remaining subscribers still run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use sockline_core::{SocketEvent, SocketOperation};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

/// Callback invoked for every event on the channel it subscribed to.
pub(crate) type EventHandler = Arc<dyn Fn(SocketEvent) + Send + Sync>;

/// Identifies a subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, SocketOperation, EventHandler)>,
}

#[derive(Default)]
struct Subscribers {
    registry: RwLock<Registry>,
}

impl Subscribers {
    fn subscribe(&self, operation: SocketOperation, handler: EventHandler) -> SubscriptionId {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.subscribers.push((id, operation, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let before = registry.subscribers.len();
        registry.subscribers.retain(|(sub, _, _)| *sub != id);
        registry.subscribers.len() != before
    }

    /// Snapshot of the handlers for one channel, in registration order.
    fn handlers_for(&self, operation: SocketOperation) -> Vec<EventHandler> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .subscribers
            .iter()
            .filter(|(_, op, _)| *op == operation)
            .map(|(_, _, handler)| Arc::clone(handler))
            .collect()
    }

    fn deliver(&self, event: SocketEvent) {
        let operation = event.operation();
        for handler in self.handlers_for(operation) {
            let event = event.clone();
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                error!(
                    %operation,
                    panic = panic_message(panic.as_ref()),
                    "Event handler panicked"
                );
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Producer side of the event queue.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<SocketEvent>,
}

impl EventSink {
    /// Queue an event, waiting while the queue is full.
    pub(crate) async fn emit(&self, event: SocketEvent) {
        if self.tx.send(event).await.is_err() {
            trace!("Event dropped, dispatcher stopped");
        }
    }

    /// Reserve a queue slot ahead of time so an event can later be queued
    /// synchronously, e.g. while holding a lock.
    pub(crate) async fn reserve(&self) -> Option<mpsc::OwnedPermit<SocketEvent>> {
        self.tx.clone().reserve_owned().await.ok()
    }
}

pub(crate) struct EventDispatcher {
    subscribers: Arc<Subscribers>,
    sink: EventSink,
    queue: Mutex<Option<mpsc::Receiver<SocketEvent>>>,
}

impl EventDispatcher {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            subscribers: Arc::new(Subscribers::default()),
            sink: EventSink { tx },
            queue: Mutex::new(Some(rx)),
        }
    }

    pub(crate) fn subscribe(
        &self,
        operation: SocketOperation,
        handler: EventHandler,
    ) -> SubscriptionId {
        self.subscribers.subscribe(operation, handler)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub(crate) fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Spawn the pump task on `runtime` on first use.
    pub(crate) fn start(&self, runtime: &Handle) {
        let queue = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(rx) = queue {
            debug!("Starting event dispatcher");
            runtime.spawn(pump(Arc::clone(&self.subscribers), rx));
        }
    }
}

/// Runs until every [`EventSink`] is gone.
async fn pump(subscribers: Arc<Subscribers>, mut rx: mpsc::Receiver<SocketEvent>) {
    while let Some(event) = rx.recv().await {
        trace!(operation = %event.operation(), "Dispatching event");
        subscribers.deliver(event);
    }
    debug!("Event dispatcher stopped");
}

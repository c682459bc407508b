/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::bridge
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Marshal aggregator events from background workers onto the
    single presentation task, preserving strict FIFO order.

  Security / Safety Notes:
    Events carry record metadata only; no secrets transit the
    channel.

  Dependencies:
    tokio::sync::mpsc for the bounded worker-to-consumer queue.

  Operational Scope:
    The aggregator holds the EventBus half; the presentation
    layer drives the EventLoop half and registers handlers per
    event kind, invoked in registration order.

  Revision History:
    2025-08-29 COD  Replaced idle-dispatch fan-out with a
                    bounded channel bridge.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Single-consumer delivery, never concurrent with UI work
    - FIFO ordering across event kinds
    - Bounded queue with worker-side backpressure
============================================================*/

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::record::UpdateRecord;

/// Queue depth between workers and the presentation task.
const EVENT_QUEUE_DEPTH: usize = 64;

/// Events emitted by the update aggregator.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    UpdatesFound(Vec<UpdateRecord>),
    RefreshComplete,
    UpdateProgress { percent: f64, name: String },
    UpdateComplete { success: bool, failed: Vec<String> },
}

impl UpdateEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UpdateEvent::UpdatesFound(_) => EventKind::UpdatesFound,
            UpdateEvent::RefreshComplete => EventKind::RefreshComplete,
            UpdateEvent::UpdateProgress { .. } => EventKind::UpdateProgress,
            UpdateEvent::UpdateComplete { .. } => EventKind::UpdateComplete,
        }
    }
}

/// Names a subscription slot in the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UpdatesFound,
    RefreshComplete,
    UpdateProgress,
    UpdateComplete,
}

/// Create a connected bus/loop pair.
pub fn event_channel() -> (EventBus, EventLoop) {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    (
        EventBus { tx },
        EventLoop {
            rx,
            handlers: HashMap::new(),
        },
    )
}

/// Worker-side handle. Cloneable; emitting blocks on a full queue
/// rather than dropping or reordering events.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<UpdateEvent>,
}

impl EventBus {
    /// Deliver an event to the presentation task. Returns false when
    /// the consumer is gone; workers run to completion regardless.
    pub async fn emit(&self, event: UpdateEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

type Handler = Box<dyn FnMut(&UpdateEvent) + Send>;

/// Consumer-side handle, owned by the presentation task.
pub struct EventLoop {
    rx: mpsc::Receiver<UpdateEvent>,
    handlers: HashMap<EventKind, Vec<Handler>>,
}

impl EventLoop {
    /// Register a handler for one event kind. Handlers for the same
    /// kind fire in registration order.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F)
    where
        F: FnMut(&UpdateEvent) + Send + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Receive the next event, invoke its handlers, and hand the event
    /// back to the caller. Returns None once every bus clone is gone.
    pub async fn dispatch_next(&mut self) -> Option<UpdateEvent> {
        let event = self.rx.recv().await?;
        if let Some(handlers) = self.handlers.get_mut(&event.kind()) {
            for handler in handlers.iter_mut() {
                handler(&event);
            }
        }
        Some(event)
    }
}

//! Run events broadcast by the controller.
//!
//! The controller emits via [`EventBus::emit`]; callers that want to stream
//! outcomes as they complete subscribe via [`EventBus::subscribe`]. Built on
//! [`tokio::sync::broadcast`] so several listeners can follow the same run.

use tokio::sync::broadcast;

use crate::checker::{BatchRecord, Outcome};
use crate::consts::DEFAULT_EVENT_CAPACITY;

/// Lifecycle and progress events for a run.
#[derive(Debug, Clone)]
pub enum Event {
    RunStarted { run_id: u64, total: usize },
    /// Followed by `ItemCompleted`, or by `ItemDiscarded` if the run was
    /// cleared or restarted while the check was in flight.
    ItemStarted { run_id: u64, index: usize, record: BatchRecord },
    ItemCompleted { run_id: u64, index: usize, outcome: Outcome },
    /// The item's check finished after its run was superseded; no outcome was recorded.
    ItemDiscarded { run_id: u64, index: usize },
    RunPaused { run_id: u64 },
    RunResumed { run_id: u64 },
    /// Stop was requested. An item already in flight may still complete.
    RunStopped { run_id: u64, processed: usize },
    /// Every queued record was processed.
    RunFinished { run_id: u64, processed: usize },
    RunCleared,
}

impl Event {
    /// The run this event belongs to, if any.
    pub fn run_id(&self) -> Option<u64> {
        match self {
            Event::RunStarted { run_id, .. }
            | Event::ItemStarted { run_id, .. }
            | Event::ItemCompleted { run_id, .. }
            | Event::ItemDiscarded { run_id, .. }
            | Event::RunPaused { run_id }
            | Event::RunResumed { run_id }
            | Event::RunStopped { run_id, .. }
            | Event::RunFinished { run_id, .. } => Some(*run_id),
            Event::RunCleared => None,
        }
    }
}

/// A broadcast channel any component can emit to or subscribe from.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers.
    /// Returns the number of receivers that will see it.
    pub fn emit(&self, event: Event) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events. Returns a receiver that yields all
    /// future events (does not replay past ones).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

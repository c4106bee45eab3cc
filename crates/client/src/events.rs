//! In-process notifications raised by the controllers.
//!
//! [`EventBus`] fans [`ClientEvent`]s out over a `tokio::sync::broadcast`
//! channel. A UI shell subscribes to surface failures and to redirect to
//! the login screen on [`ClientEvent::AuthRequired`].

use flowline_core::{Collection, RecordId};
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// An operation found no live session, or the store rejected the token.
    AuthRequired,

    /// An optimistic write was accepted by the store.
    WriteConfirmed {
        collection: Collection,
        id: RecordId,
        ticket: u64,
    },

    /// An optimistic write was rejected. A reconciliation follows.
    WriteFailed {
        collection: Collection,
        id: RecordId,
        ticket: u64,
        error: String,
    },

    /// A write landed after a newer write to the same record had already
    /// been confirmed, overwriting it remotely.
    StaleWrite {
        collection: Collection,
        id: RecordId,
        ticket: u64,
    },

    /// Local state was replaced from a fresh fetch.
    Reconciled { collection: Collection, count: usize },

    /// The reconciliation fetch failed; local state may be stale.
    ReconcileFailed {
        collection: Collection,
        error: String,
    },

    Created { collection: Collection, id: RecordId },

    Deleted { collection: Collection, id: RecordId },

    DeleteFailed {
        collection: Collection,
        id: RecordId,
        error: String,
    },

    Imported {
        collection: Collection,
        inserted: usize,
        rejected: usize,
    },
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus shared via `Arc<EventBus>` by every controller.
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: ClientEvent) {
        // Only fails when nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

//! Change notifications.
//!
//! The EventBus fans change events out to every interested consumer: views
//! re-rendering after a session update, WebSocket clients watching the
//! content tree. Publishers never wait on subscribers.
//!
//! # Example
//!
//! ```rust
//! use classroom_core::event_bus::{ChangeEvent, EventBus, WriteAction};
//! use classroom_core::Collection;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.emit(ChangeEvent::content(Collection::Lessons, "l1", WriteAction::Created));
//! assert_eq!(rx.try_recv().unwrap().event_type(), "content:lessons:created");
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::content::Collection;

/// Events beyond this many unread cause slow subscribers to lag.
const DEFAULT_CAPACITY: usize = 256;

/// Which session operation produced a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOperation {
    Login,
    Logout,
    UpdateProfile,
    UpdateAdminState,
    UpdateTeacherState,
    SetFontSize,
}

/// Kind of write applied to a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Created,
    Updated,
    Deleted,
}

impl WriteAction {
    fn as_str(&self) -> &'static str {
        match self {
            WriteAction::Created => "created",
            WriteAction::Updated => "updated",
            WriteAction::Deleted => "deleted",
        }
    }
}

/// A change published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// The client session changed.
    Session { operation: SessionOperation },
    /// A record in the content store changed.
    Content {
        collection: Collection,
        id: String,
        action: WriteAction,
    },
}

impl ChangeEvent {
    pub fn session(operation: SessionOperation) -> Self {
        ChangeEvent::Session { operation }
    }

    pub fn content(collection: Collection, id: impl Into<String>, action: WriteAction) -> Self {
        ChangeEvent::Content {
            collection,
            id: id.into(),
            action,
        }
    }

    /// Colon-separated event name, e.g. `session:changed` or
    /// `content:subjects:deleted`.
    pub fn event_type(&self) -> String {
        match self {
            ChangeEvent::Session { .. } => "session:changed".to_string(),
            ChangeEvent::Content {
                collection, action, ..
            } => format!("content:{}:{}", collection, action.as_str()),
        }
    }
}

/// Broadcast channel for [`ChangeEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns how many subscribers will see it; with no
    /// subscribers the event is dropped.
    pub fn emit(&self, event: ChangeEvent) -> usize {
        log::trace!("emit {}", event.event_type());
        self.sender.send(event).unwrap_or(0)
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

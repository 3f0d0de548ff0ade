//! ClassroomContext - shared server-side state.
//!
//! Holds what every server interface needs: the document store, the event
//! bus that announces content changes, and the directory uploaded files are
//! written to. Interfaces (the HTTP router today) clone the context into
//! their handlers and never own state of their own.
//!
//! ```text
//!          ┌──────────────────────────┐
//!          │     ClassroomContext     │
//!          ├──────────────────────────┤
//!          │  - DocumentStore         │
//!          │  - EventBus              │
//!          │  - uploads_dir           │
//!          └────────────┬─────────────┘
//!                       │
//!            ┌──────────┴──────────┐
//!            ▼                     ▼
//!     ┌─────────────┐       ┌─────────────┐
//!     │  REST API   │       │  WebSocket  │
//!     └─────────────┘       └─────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::content::DocumentStore;
use crate::event_bus::EventBus;

/// Directory for uploads when none is configured.
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Builder for [`ClassroomContext`].
#[derive(Default)]
pub struct ClassroomContextBuilder {
    store: Option<Arc<DocumentStore>>,
    event_bus: Option<Arc<EventBus>>,
    uploads_dir: Option<PathBuf>,
}

impl ClassroomContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an opened document store. Defaults to an in-memory store.
    pub fn store(mut self, store: Arc<DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use an existing EventBus (for testing or custom configurations).
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Directory uploaded files are written to.
    pub fn uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.uploads_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> ClassroomContext {
        ClassroomContext {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(DocumentStore::in_memory())),
            event_bus: self.event_bus.unwrap_or_else(|| Arc::new(EventBus::new())),
            uploads_dir: Arc::new(
                self.uploads_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOADS_DIR)),
            ),
        }
    }
}

/// Shared state for every server interface.
///
/// Cloning copies pointers only.
#[derive(Clone)]
pub struct ClassroomContext {
    pub store: Arc<DocumentStore>,
    pub event_bus: Arc<EventBus>,
    uploads_dir: Arc<PathBuf>,
}

impl ClassroomContext {
    pub fn builder() -> ClassroomContextBuilder {
        ClassroomContextBuilder::new()
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }
}

impl Default for ClassroomContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

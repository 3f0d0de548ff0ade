//! # classroom-core
//!
//! Core logic for Classroom, the lesson content manager.
//!
//! This crate is framework-agnostic and can be used by:
//! - the HTTP server (REST + WebSocket)
//! - a desktop or browser client (session state, scroll restoration)
//!
//! ## Key Concepts
//!
//! - **Session**: the client-local record of the logged-in user, auth token,
//!   per-role navigation breadcrumbs and font-size preference
//! - **SessionProvider**: sole owner of the Session; writes it through to
//!   durable storage after every change
//! - **ScrollPersistence**: restores a stored scroll offset without echoing
//!   the programmatic scroll back as a user action
//! - **DocumentStore**: JSON document store for the content hierarchy
//!   (Class → Subject → Unit → SubUnit → Lesson → Content)

pub mod content;
pub mod context;
pub mod event_bus;
pub mod scroll;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use content::{Collection, ConnectionString, DocumentStore, StoreError};
pub use context::ClassroomContext;
pub use event_bus::{ChangeEvent, EventBus};
pub use scroll::{ScrollConfig, ScrollPersistence, ScrollTarget};
pub use session::{
    try_use_session, use_session, Session, SessionConfig, SessionProvider, User,
};
pub use storage::{DurableStorage, FileStorage, MemoryStorage, StorageError};

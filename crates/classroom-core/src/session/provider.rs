//! SessionProvider - sole owner of the client session.
//!
//! The provider loads the Session from durable storage once, hands out
//! snapshots, applies every mutation under one lock and writes the result
//! straight back to storage. Views learn about changes by subscribing to the
//! provider's event bus.
//!
//! ## Access
//!
//! Code below the provider never holds the provider directly. The host
//! enters a scope, and consumers fetch the provider through the accessor:
//!
//! ```rust
//! use std::sync::Arc;
//! use classroom_core::session::{use_session, SessionConfig, SessionProvider};
//! use classroom_core::MemoryStorage;
//!
//! let provider = SessionProvider::new(Arc::new(MemoryStorage::new()), SessionConfig::default());
//! let _scope = provider.enter();
//!
//! // anywhere further down the call stack, on this thread:
//! let session = use_session();
//! session.set_font_size(16.0);
//! assert_eq!(session.session().font_size, 16.0);
//! ```
//!
//! Calling [`use_session`] with no scope entered is a programming error
//! and panics.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::broadcast;

use super::restore::restore_session;
use super::state::{AdminStatePatch, Session, TeacherStatePatch, User, DEFAULT_FONT_SIZE};
use crate::event_bus::{ChangeEvent, EventBus, SessionOperation};
use crate::storage::DurableStorage;

/// Storage key holding the serialized session.
pub const DEFAULT_STORAGE_KEY: &str = "appState";

/// Settings for a [`SessionProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Durable storage key for the serialized session.
    pub storage_key: String,
    /// Font size of a fresh session, and the fallback for bad persisted values.
    pub default_font_size: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl SessionConfig {
    /// The session a fresh client starts with.
    pub fn default_session(&self) -> Session {
        Session::with_font_size(self.default_font_size)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionAccessError {
    #[error("use_session must be called inside a SessionProvider scope")]
    OutsideProvider,
}

struct Inner {
    config: SessionConfig,
    storage: Arc<dyn DurableStorage>,
    session: Mutex<Session>,
    events: EventBus,
}

/// Owner of the client session.
///
/// Cloning is cheap and every clone shares the same session.
#[derive(Clone)]
pub struct SessionProvider {
    inner: Arc<Inner>,
}

impl SessionProvider {
    /// Load the session from `storage`, falling back to defaults.
    ///
    /// A persisted entry that cannot be parsed is removed so the next load
    /// starts clean.
    pub fn new(storage: Arc<dyn DurableStorage>, config: SessionConfig) -> Self {
        let session = load_session(storage.as_ref(), &config);
        Self {
            inner: Arc::new(Inner {
                config,
                storage,
                session: Mutex::new(session),
                events: EventBus::new(),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.lock().clone()
    }

    /// Receive a [`ChangeEvent::Session`] after every mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.events.subscribe()
    }

    /// Make this provider the one [`use_session`] returns on this thread
    /// until the returned guard is dropped. Scopes nest.
    pub fn enter(&self) -> ProviderScope {
        let depth = SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            scopes.push(self.clone());
            scopes.len() - 1
        });
        ProviderScope {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Set the user and token together.
    pub fn login(&self, user: User, token: impl Into<String>) {
        let token = token.into();
        self.update(SessionOperation::Login, |session| {
            session.user = Some(user);
            session.token = Some(token);
        });
    }

    /// Reset everything to defaults and remove the persisted entry.
    pub fn logout(&self) {
        {
            let mut session = self.lock();
            *session = self.inner.config.default_session();
            if let Err(e) = self.inner.storage.remove_item(&self.inner.config.storage_key) {
                log::warn!("Failed to remove persisted session: {e}");
            }
        }
        log::info!("Logged out");
        self.inner
            .events
            .emit(ChangeEvent::session(SessionOperation::Logout));
    }

    /// Replace the user's profile. Does nothing when logged out.
    pub fn update_profile(&self, user: User) {
        self.update(SessionOperation::UpdateProfile, |session| {
            if session.user.is_some() {
                session.user = Some(user);
            }
        });
    }

    pub fn update_admin_state(&self, patch: AdminStatePatch) {
        self.update(SessionOperation::UpdateAdminState, |session| {
            patch.apply_to(&mut session.admin_state);
        });
    }

    pub fn update_teacher_state(&self, patch: TeacherStatePatch) {
        self.update(SessionOperation::UpdateTeacherState, |session| {
            patch.apply_to(&mut session.teacher_state);
        });
    }

    pub fn set_font_size(&self, size: f64) {
        self.update(SessionOperation::SetFontSize, |session| {
            session.font_size = size;
        });
    }

    /// Apply `f`, persist when the session actually changed, then notify.
    fn update<F: FnOnce(&mut Session)>(&self, operation: SessionOperation, f: F) {
        let changed = {
            let mut session = self.lock();
            let before = session.clone();
            f(&mut *session);
            let changed = *session != before;
            if changed {
                self.persist(&session);
            }
            changed
        };

        if changed {
            self.inner.events.emit(ChangeEvent::session(operation));
        } else {
            log::trace!("{operation:?} left the session unchanged");
        }
    }

    /// Best effort: a failed write is logged and the in-memory session stays
    /// authoritative.
    fn persist(&self, session: &Session) {
        let json = match serde_json::to_string(session) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Failed to serialize session: {e}");
                return;
            }
        };

        if let Err(e) = self
            .inner
            .storage
            .set_item(&self.inner.config.storage_key, &json)
        {
            log::warn!("Failed to persist session: {e}");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_session(storage: &dyn DurableStorage, config: &SessionConfig) -> Session {
    let defaults = config.default_session();

    let raw = match storage.get_item(&config.storage_key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return defaults,
        Err(e) => {
            log::warn!("Failed to read persisted session: {e}");
            return defaults;
        }
    };

    match restore_session(&raw, &defaults) {
        Ok(session) => session,
        Err(e) => {
            log::warn!("Discarding corrupted persisted session: {e}");
            if let Err(e) = storage.remove_item(&config.storage_key) {
                log::warn!("Failed to remove corrupted session: {e}");
            }
            defaults
        }
    }
}

// ============================================================================
// Scoped Access
// ============================================================================

thread_local! {
    static SCOPES: RefCell<Vec<SessionProvider>> = const { RefCell::new(Vec::new()) };
}

/// Guard returned by [`SessionProvider::enter`].
///
/// Tied to the thread that created it. Dropping a guard also ends every
/// scope entered after it.
pub struct ProviderScope {
    /// Stack index of this guard's provider.
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ProviderScope {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            scopes.borrow_mut().truncate(self.depth);
        });
    }
}

/// The innermost provider in scope on this thread.
pub fn try_use_session() -> Result<SessionProvider, SessionAccessError> {
    SCOPES.with(|scopes| {
        scopes
            .borrow()
            .last()
            .cloned()
            .ok_or(SessionAccessError::OutsideProvider)
    })
}

/// The innermost provider in scope on this thread.
///
/// # Panics
///
/// Panics when called outside every provider scope.
pub fn use_session() -> SessionProvider {
    match try_use_session() {
        Ok(provider) => provider,
        Err(e) => panic!("{e}"),
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Client session: state, persistence and scoped access.

mod provider;
mod restore;
pub mod state;

pub use provider::{
    try_use_session, use_session, ProviderScope, SessionAccessError, SessionConfig,
    SessionProvider, DEFAULT_STORAGE_KEY,
};
pub use state::{
    AdminState, AdminStatePatch, Session, TeacherState, TeacherStatePatch, User,
    DEFAULT_FONT_SIZE,
};

//! Content hierarchy: record types and the document store.
//!
//! ```ignore
//! use classroom_core::content::{Collection, ConnectionString, DocumentStore};
//!
//! let store = DocumentStore::open(&"file:///var/lib/classroom".parse()?)?;
//! let lesson = store.insert(Collection::Lessons, json!({"title": "Fractions", "subUnitId": id}))?;
//! let contents = store.list(Collection::Contents, Some(lesson_id));
//! ```

pub mod store;
pub mod types;

pub use store::{ConnectionString, Document, DocumentStore, StoreError};
pub use types::{
    ClassBody, Collection, ContentBody, ContentType, LessonBody, Role, SubUnitBody, SubjectBody,
    UnitBody, UserBody,
};

//! Content hierarchy data types.
//!
//! # Data Model Overview
//!
//! ```text
//! Class
//! └── Subject        (classId)
//!     └── Unit       (subjectId)
//!         └── SubUnit    (unitId)
//!             └── Lesson     (subUnitId)
//!                 └── Content    (lessonId, optional uploaded file)
//! ```
//!
//! Users sit outside the tree. Every stored record carries a server-assigned
//! `id` plus `createdAt`/`updatedAt`; the body types below describe only the
//! client-supplied fields and are used to validate writes.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::StoreError;

// ============================================================================
// Collections
// ============================================================================

/// A named collection in the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Classes,
    Subjects,
    Units,
    Subunits,
    Lessons,
    Contents,
}

impl Collection {
    /// Every collection, leaves of the hierarchy last.
    pub const ALL: [Collection; 7] = [
        Collection::Users,
        Collection::Classes,
        Collection::Subjects,
        Collection::Units,
        Collection::Subunits,
        Collection::Lessons,
        Collection::Contents,
    ];

    /// Name used in URLs and as the on-disk file stem.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Classes => "classes",
            Collection::Subjects => "subjects",
            Collection::Units => "units",
            Collection::Subunits => "subunits",
            Collection::Lessons => "lessons",
            Collection::Contents => "contents",
        }
    }

    /// The field linking a record to its parent in the hierarchy.
    pub fn parent_field(&self) -> Option<&'static str> {
        match self {
            Collection::Users | Collection::Classes => None,
            Collection::Subjects => Some("classId"),
            Collection::Units => Some("subjectId"),
            Collection::Subunits => Some("unitId"),
            Collection::Lessons => Some("subUnitId"),
            Collection::Contents => Some("lessonId"),
        }
    }

    /// Check a document body against this collection's schema.
    ///
    /// Returns the body re-serialized through its typed form, which drops
    /// unknown fields and normalizes enum spellings.
    pub fn validate(&self, body: Value) -> Result<Value, StoreError> {
        match self {
            Collection::Users => normalize::<UserBody>(body),
            Collection::Classes => normalize::<ClassBody>(body),
            Collection::Subjects => normalize::<SubjectBody>(body),
            Collection::Units => normalize::<UnitBody>(body),
            Collection::Subunits => normalize::<SubUnitBody>(body),
            Collection::Lessons => normalize::<LessonBody>(body),
            Collection::Contents => normalize::<ContentBody>(body),
        }
    }
}

fn normalize<T: DeserializeOwned + Serialize>(body: Value) -> Result<Value, StoreError> {
    let typed: T = serde_json::from_value(body).map_err(|e| StoreError::Invalid(e.to_string()))?;
    Ok(serde_json::to_value(typed)?)
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}

// ============================================================================
// Record Bodies
// ============================================================================

/// Role of a platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassBody {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectBody {
    pub name: String,
    pub class_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitBody {
    pub name: String,
    pub subject_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubUnitBody {
    pub name: String,
    pub unit_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonBody {
    pub title: String,
    pub sub_unit_id: String,
}

/// Kind of lesson material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Pdf,
    Audio,
    Text,
    Video,
}

impl FromStr for ContentType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(ContentType::Pdf),
            "audio" => Ok(ContentType::Audio),
            "text" => Ok(ContentType::Text),
            "video" => Ok(ContentType::Video),
            other => Err(StoreError::Invalid(format!("unknown content type: {other}"))),
        }
    }
}

/// A piece of lesson material, optionally backed by an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBody {
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub lesson_id: String,
    /// Inline text for `text` content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Public URL of the uploaded file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    /// Original file name as uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

// ============================================================================
// TESTS
// ============================================================================

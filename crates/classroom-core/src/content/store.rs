//! JSON document store for the content hierarchy.
//!
//! # File Locations
//!
//! With a `file://` connection string every collection is kept in its own
//! file under the store directory:
//!
//! ```text
//! <dir>/
//! ├── users.json
//! ├── classes.json
//! ├── subjects.json
//! ├── units.json
//! ├── subunits.json
//! ├── lessons.json
//! └── contents.json
//! ```
//!
//! Each file is a JSON array of documents. Collections are loaded once when
//! the store opens and rewritten in full (write-then-rename) on every write.
//! A `memory://` store never touches the disk.
//!
//! The store validates field shapes per collection but enforces nothing
//! across records: deleting a class leaves its subjects in place.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::types::Collection;

/// A stored record: a JSON object with `id`, `createdAt` and `updatedAt`.
pub type Document = Map<String, Value>;

/// Fields owned by the store; client bodies cannot set them.
const META_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("{collection} record not found: {id}")]
    NotFound { collection: Collection, id: String },

    #[error("Invalid document: {0}")]
    Invalid(String),

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),
}

// ============================================================================
// Connection String
// ============================================================================

/// Where the document store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionString {
    /// `file://<dir>` or a bare directory path.
    File(PathBuf),
    /// `memory://`
    Memory,
}

impl FromStr for ConnectionString {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StoreError::InvalidConnectionString(
                "connection string is empty".to_string(),
            ));
        }

        if s == "memory://" || s == "memory" {
            return Ok(ConnectionString::Memory);
        }

        if let Some(path) = s.strip_prefix("file://") {
            if path.is_empty() {
                return Err(StoreError::InvalidConnectionString(
                    "file:// needs a directory".to_string(),
                ));
            }
            return Ok(ConnectionString::File(PathBuf::from(path)));
        }

        if let Some((scheme, _)) = s.split_once("://") {
            return Err(StoreError::InvalidConnectionString(format!(
                "unsupported scheme: {scheme}"
            )));
        }

        Ok(ConnectionString::File(PathBuf::from(s)))
    }
}

// ============================================================================
// Document Store
// ============================================================================

/// Thread-safe document store.
///
/// Writes hold the collection lock while the collection file is rewritten,
/// so concurrent handlers never interleave two rewrites.
pub struct DocumentStore {
    dir: Option<PathBuf>,
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl DocumentStore {
    /// Open the store described by `conn`, loading any existing collections.
    pub fn open(conn: &ConnectionString) -> Result<Self, StoreError> {
        match conn {
            ConnectionString::Memory => Ok(Self::in_memory()),
            ConnectionString::File(dir) => Self::open_dir(dir),
        }
    }

    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn open_dir(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;

        let mut collections = HashMap::new();
        for collection in Collection::ALL {
            let docs = load_collection(dir, collection)?;
            if !docs.is_empty() {
                log::debug!("Loaded {} {} from {}", docs.len(), collection, dir.display());
            }
            collections.insert(collection, docs);
        }

        Ok(Self {
            dir: Some(dir.to_path_buf()),
            collections: RwLock::new(collections),
        })
    }

    /// The directory backing this store, if any.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Create a record from a client body.
    pub fn insert(&self, collection: Collection, body: Value) -> Result<Document, StoreError> {
        let body = collection.validate(strip_meta(body)?)?;

        let now = timestamp()?;
        let mut doc = Document::new();
        doc.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        if let Value::Object(fields) = body {
            doc.extend(fields);
        }
        doc.insert("createdAt".to_string(), now.clone());
        doc.insert("updatedAt".to_string(), now);

        let mut collections = self.write_lock();
        let mut docs = collections.get(&collection).cloned().unwrap_or_default();
        docs.push(doc.clone());
        self.commit(&mut collections, collection, docs)?;

        Ok(doc)
    }

    /// List records, optionally only those whose parent link equals `parent_id`.
    ///
    /// A `parent_id` on a collection without a parent link matches nothing.
    pub fn list(&self, collection: Collection, parent_id: Option<&str>) -> Vec<Document> {
        let collections = self.read_lock();
        let Some(docs) = collections.get(&collection) else {
            return Vec::new();
        };

        match parent_id {
            None => docs.clone(),
            Some(parent_id) => {
                let Some(field) = collection.parent_field() else {
                    return Vec::new();
                };
                docs.iter()
                    .filter(|d| d.get(field).and_then(Value::as_str) == Some(parent_id))
                    .cloned()
                    .collect()
            }
        }
    }

    /// Fetch a single record.
    pub fn get(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        let collections = self.read_lock();
        collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| doc_id(d) == Some(id)))
            .cloned()
            .ok_or_else(|| not_found(collection, id))
    }

    /// Merge `patch` into an existing record.
    ///
    /// Fields present in `patch` replace the stored ones; store-owned fields
    /// in the patch are ignored. The merged result must still validate.
    pub fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<Document, StoreError> {
        let patch = strip_meta(patch)?;

        let mut collections = self.write_lock();
        let mut docs = collections.get(&collection).cloned().unwrap_or_default();
        let index = docs
            .iter()
            .position(|d| doc_id(d) == Some(id))
            .ok_or_else(|| not_found(collection, id))?;

        let mut body = docs[index].clone();
        for field in META_FIELDS {
            body.remove(field);
        }
        if let Value::Object(fields) = patch {
            body.extend(fields);
        }
        let body = collection.validate(Value::Object(body))?;

        let existing = &docs[index];
        let mut doc = Document::new();
        doc.insert("id".to_string(), Value::String(id.to_string()));
        if let Value::Object(fields) = body {
            doc.extend(fields);
        }
        if let Some(created_at) = existing.get("createdAt") {
            doc.insert("createdAt".to_string(), created_at.clone());
        }
        doc.insert("updatedAt".to_string(), timestamp()?);

        docs[index] = doc.clone();
        self.commit(&mut collections, collection, docs)?;

        Ok(doc)
    }

    /// Delete a record, returning it.
    pub fn delete(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        let mut collections = self.write_lock();
        let mut docs = collections.get(&collection).cloned().unwrap_or_default();
        let index = docs
            .iter()
            .position(|d| doc_id(d) == Some(id))
            .ok_or_else(|| not_found(collection, id))?;

        let removed = docs.remove(index);
        self.commit(&mut collections, collection, docs)?;

        Ok(removed)
    }

    /// Write `docs` to disk, then make them the live collection.
    ///
    /// On a failed write the live collection is left as it was.
    fn commit(
        &self,
        collections: &mut HashMap<Collection, Vec<Document>>,
        collection: Collection,
        docs: Vec<Document>,
    ) -> Result<(), StoreError> {
        self.persist(collection, &docs)?;
        collections.insert(collection, docs);
        Ok(())
    }

    fn persist(&self, collection: Collection, docs: &[Document]) -> Result<(), StoreError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let file_path = dir.join(format!("{collection}.json"));
        let temp_path = dir.join(format!("{collection}.json.tmp"));

        let json = serde_json::to_string_pretty(docs)?;
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &file_path)?;

        Ok(())
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Collection, Vec<Document>>> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Collection, Vec<Document>>> {
        self.collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn load_collection(dir: &Path, collection: Collection) -> Result<Vec<Document>, StoreError> {
    let path = dir.join(format!("{collection}.json"));
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn strip_meta(body: Value) -> Result<Value, StoreError> {
    match body {
        Value::Object(mut fields) => {
            for field in META_FIELDS {
                fields.remove(field);
            }
            Ok(Value::Object(fields))
        }
        other => Err(StoreError::Invalid(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn doc_id(doc: &Document) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

fn not_found(collection: Collection, id: &str) -> StoreError {
    StoreError::NotFound {
        collection,
        id: id.to_string(),
    }
}

fn timestamp() -> Result<Value, StoreError> {
    Ok(serde_json::to_value(Utc::now())?)
}

// ============================================================================
// TESTS
// ============================================================================

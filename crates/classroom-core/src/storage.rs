//! Durable client storage.
//!
//! A string key/value store that survives restarts, the way browser local
//! storage does for a web client. The session layer keeps exactly one key
//! here; nothing else in the crate writes to it.
//!
//! # Backends
//!
//! - [`MemoryStorage`] - process-local map, for tests and headless clients
//! - [`FileStorage`] - one `<key>.json` file per key inside a directory
//!
//! `FileStorage` writes through a temp file and renames it into place, so a
//! crash mid-write never leaves a truncated entry behind:
//!
//! 1. Write to `<key>.json.tmp`
//! 2. Rename to `<key>.json` (atomic on Unix)

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Error type for durable storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Key/value storage that outlives the process.
///
/// Implementations are synchronous: reads and writes are local calls that
/// complete before returning.
pub trait DurableStorage: Send + Sync {
    /// Read the value stored under `key`, or `None` if there is no entry.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the entry under `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

// ============================================================================
// Memory Storage
// ============================================================================

/// In-process storage backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

// ============================================================================
// File Storage
// ============================================================================

/// Directory-backed storage: each key lives in `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at `dir`. The directory is created lazily on
    /// the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

/// Keys become file names, so they must be a single normal path component.
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key cannot be empty".to_string()));
    }

    let mut components = Path::new(key).components();
    match components.next() {
        Some(Component::Normal(_)) if components.next().is_none() => Ok(()),
        _ => Err(StorageError::InvalidKey(key.to_string())),
    }
}

impl DurableStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.entry_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key)?;
        fs::create_dir_all(&self.dir)?;

        let temp_path = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;

        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.entry_path(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

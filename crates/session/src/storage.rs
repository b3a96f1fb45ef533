//! Durable client-side storage for session state.
//!
//! The stores in this crate persist their full state under a small, fixed set
//! of string keys so a reload restores the same open tabs and room selection.
//! Storage is a seam: the file backend is the production implementation, the
//! memory backend serves tests and the degraded no-durable-storage mode.

use crate::{SessionError, SessionResult};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Key/value storage for serialized session state.
///
/// Implementations must tolerate concurrent access from UI event handlers;
/// both provided backends serialise access internally.
pub trait SessionStorage: Send + Sync {
    /// Reads the value stored under `key`, or `None` if absent.
    fn load(&self, key: &str) -> SessionResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn store(&self, key: &str, value: &str) -> SessionResult<()>;

    /// Removes the value stored under `key`, if any.
    fn remove(&self, key: &str) -> SessionResult<()>;
}

/// File-backed storage: one JSON document per key under a session directory.
#[derive(Debug)]
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    /// Creates the storage, creating the session directory if needed.
    pub fn new(directory: impl Into<PathBuf>) -> SessionResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(SessionError::StorageDirCreation)?;
        Ok(Self { directory })
    }

    /// Storage keys become file names, so restrict them to a safe alphabet.
    fn path_for(&self, key: &str) -> SessionResult<PathBuf> {
        let safe = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !safe {
            return Err(SessionError::InvalidInput(format!(
                "storage key contains unsupported characters: {key:?}"
            )));
        }
        Ok(self.directory.join(format!("{key}.json")))
    }
}

impl SessionStorage for FileStorage {
    fn load(&self, key: &str) -> SessionResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SessionError::StorageRead(e)),
        }
    }

    fn store(&self, key: &str, value: &str) -> SessionResult<()> {
        let path = self.path_for(key)?;
        fs::write(&path, value).map_err(SessionError::StorageWrite)
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::StorageWrite(e)),
        }
    }
}

/// In-memory storage for tests and for sessions where durable storage is
/// unavailable.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> SessionResult<()> {
        self.entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

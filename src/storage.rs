//! Durable key/value storage for the session descriptor.
//!
//! SYSTEM CONTEXT
//! ==============
//! The descriptor is the only state that outlives a reload. It is written
//! synchronously from the in-memory session (last writer wins) and read
//! exactly once per start attempt.
//!
//! ERROR HANDLING
//! ==============
//! `SessionStore` never surfaces storage failures to the tracker. A missing,
//! unreadable, or corrupt entry reads as "no prior session"; corrupt entries
//! are removed so the next start takes the fresh path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::session::SessionDescriptor;

/// Storage key holding the JSON session descriptor.
pub const SESSION_KEY: &str = "collab_session";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// Synchronous string key/value store, one per client profile.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-local store. Survives tracker re-creation, not process exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// One JSON file per key under a directory. Writes go through a temp file
/// and a rename so a crash never leaves a half-written descriptor.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, value)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// Typed view over a [`KeyValueStore`] for the session descriptor.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load the stored descriptor, discarding it if it cannot be parsed.
    #[must_use]
    pub fn load(&self) -> Option<SessionDescriptor> {
        let raw = match self.backend.get(SESSION_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "session descriptor read failed");
                return None;
            }
        };
        match serde_json::from_str::<SessionDescriptor>(&raw) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!(error = %e, "discarding corrupt session descriptor");
                self.clear();
                None
            }
        }
    }

    /// Persist `descriptor`. Failures are logged and otherwise ignored.
    pub fn save(&self, descriptor: &SessionDescriptor) {
        let raw = match serde_json::to_string(descriptor) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "session descriptor encode failed");
                return;
            }
        };
        if let Err(e) = self.backend.set(SESSION_KEY, &raw) {
            warn!(error = %e, session_id = %descriptor.session_id, "session descriptor write failed");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.backend.remove(SESSION_KEY) {
            warn!(error = %e, "session descriptor clear failed");
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;

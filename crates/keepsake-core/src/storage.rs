//! Persisted client state.
//!
//! The active session id survives restarts so a relaunch resumes the
//! same conversation. Stored as a small JSON document under a fixed
//! filename in the data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::ACTIVE_SESSION_FILE;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to read client state: {0}")]
    Read(String),

    #[error("Failed to parse client state: {0}")]
    Parse(String),

    #[error("Failed to write client state: {0}")]
    Write(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ClientState {
    active_session_id: Option<String>,
}

/// File-backed store for the active session id.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(ACTIVE_SESSION_FILE),
        }
    }

    /// Load the persisted session id. A missing or unreadable file is
    /// treated as "no active session" (logged, not fatal).
    pub fn load(&self) -> Option<String> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not read client state");
                return None;
            }
        };
        match serde_json::from_str::<ClientState>(&contents) {
            Ok(state) => state.active_session_id,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not parse client state");
                None
            }
        }
    }

    pub fn save(&self, session_id: &str) -> Result<(), StorageError> {
        self.write(ClientState {
            active_session_id: Some(session_id.to_string()),
        })
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.write(ClientState::default())
    }

    fn write(&self, state: ClientState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Write(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(&state).map_err(|e| StorageError::Write(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| StorageError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save("abc").unwrap();
        assert_eq!(store.load().as_deref(), Some("abc"));
    }

    #[test]
    fn test_clear_removes_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save("abc").unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        std::fs::write(dir.path().join(ACTIVE_SESSION_FILE), "not json").unwrap();
        assert!(store.load().is_none());
    }
}

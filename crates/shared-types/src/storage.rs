//! Storage collaborator for key material and certificates
//!
//! The core never interprets identifiers; they are opaque handles chosen by
//! the caller. Failures are reported once, without retry.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::{DocSignError, Result};

/// Byte-oriented persistence used by the key manager and the workflow facade
pub trait Storage: Send + Sync {
    fn write(&self, id: &str, bytes: &[u8]) -> Result<()>;

    fn read(&self, id: &str) -> Result<Vec<u8>>;

    fn exists(&self, id: &str) -> bool {
        self.read(id).is_ok()
    }
}

/// Process-local storage, mostly for tests and short-lived sessions
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .lock()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

impl Storage for MemoryStorage {
    fn write(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DocSignError::StorageWrite(format!("{}: storage lock poisoned", id)))?;
        entries.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, id: &str) -> Result<Vec<u8>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| DocSignError::StorageRead(format!("{}: storage lock poisoned", id)))?;
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| DocSignError::StorageRead(format!("{}: not found", id)))
    }
}

/// Filesystem storage rooted at a directory; identifiers are relative paths
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id);
        if id.is_empty() {
            return None;
        }
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl Storage for FileStorage {
    fn write(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(id).ok_or_else(|| {
            DocSignError::StorageWrite(format!("{}: identifier escapes storage root", id))
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| DocSignError::StorageWrite(format!("{}: {}", parent.display(), e)))?;
        }
        fs::write(&path, bytes)
            .map_err(|e| DocSignError::StorageWrite(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), len = bytes.len(), "wrote storage entry");
        Ok(())
    }

    fn read(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.resolve(id).ok_or_else(|| {
            DocSignError::StorageRead(format!("{}: identifier escapes storage root", id))
        })?;
        fs::read(&path).map_err(|e| DocSignError::StorageRead(format!("{}: {}", path.display(), e)))
    }

    fn exists(&self, id: &str) -> bool {
        self.resolve(id).map(|p| p.is_file()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_round_trip() {
        let storage = MemoryStorage::new();
        storage.write("alice.key", b"secret blob").unwrap();
        assert_eq!(storage.read("alice.key").unwrap(), b"secret blob".to_vec());
        assert!(storage.exists("alice.key"));
        assert_eq!(storage.ids(), vec!["alice.key".to_string()]);
    }

    #[test]
    fn test_memory_missing_entry() {
        let storage = MemoryStorage::new();
        let err = storage.read("nobody").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageReadError);
        assert!(!storage.exists("nobody"));
    }

    #[test]
    fn test_file_round_trip_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.write("keys/alice_pub.pem", b"-----BEGIN").unwrap();
        assert_eq!(
            storage.read("keys/alice_pub.pem").unwrap(),
            b"-----BEGIN".to_vec()
        );
        assert!(storage.exists("keys/alice_pub.pem"));
    }

    #[test]
    fn test_file_rejects_escaping_ids() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        let err = storage.write("../outside", b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageWriteError);

        let err = storage.read("/etc/passwd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageReadError);
    }

    #[test]
    fn test_file_write_into_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected
        std::fs::write(dir.path().join("blocker"), b"").unwrap();
        let storage = FileStorage::new(dir.path());

        let err = storage.write("blocker/key", b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageWriteError);
    }
}

use crate::domain::errors::StorageError;
use crate::ports::outbound::KeyValueStore;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default quota, in line with browser `localStorage` limits.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// File-backed key/value store: one file per key inside a directory.
///
/// Desktop and CLI stand-in for `localStorage`. File names are the hex
/// SHA-256 of the key so arbitrary keys are safe on every filesystem.
/// Writes go through a temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: usize,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        debug!(dir = %dir.display(), "Opened file store");
        Ok(Self {
            dir,
            quota_bytes: DEFAULT_QUOTA_BYTES,
        })
    }

    /// Set the maximum total size of stored values.
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Bytes used by every stored value except `excluding`.
    fn used_bytes(&self, excluding: &Path) -> Result<usize, StorageError> {
        let mut used = 0usize;
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StorageError::Io(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::Io(e.to_string()))?;
            let path = entry.path();
            if path == excluding || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let metadata = entry.metadata().map_err(|e| StorageError::Io(e.to_string()))?;
            used += metadata.len() as usize;
        }
        Ok(used)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if self.used_bytes(&path)? + value.len() > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                size: value.len(),
            });
        }

        // Write atomically via temp file
        let temp_path = path.with_extension("tmp");
        let mut file =
            std::fs::File::create(&temp_path).map_err(|e| StorageError::Io(e.to_string()))?;
        file.write_all(value.as_bytes())
            .map_err(|e| StorageError::Io(e.to_string()))?;
        file.sync_all().map_err(|e| StorageError::Io(e.to_string()))?;
        std::fs::rename(&temp_path, &path).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }
}

//! Filesystem-backed keyed storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::fs;

use super::{KeyedStore, StorageError, StorageResult};

/// Keyed storage mapping each key to one file under a base directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    /// Base directory for stored entries.
    base_dir: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `base_dir`. The directory is created
    /// lazily on first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn entry_path(&self, key: &str) -> StorageResult<PathBuf> {
        // Keys are flat names; anything that could escape the base
        // directory is rejected.
        if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(format!("{key}.json")))
    }

    async fn ensure_base_dir(&self) -> StorageResult<()> {
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyedStore for FsStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.ensure_base_dir().await?;
        let path = self.entry_path(key)?;

        // Write-then-rename so a crash mid-write never truncates the
        // previous value.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        debug!("stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

impl FsStore {
    /// The base directory this store writes under.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

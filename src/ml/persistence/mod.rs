pub mod backup;

pub use backup::*;

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::StoreError;

/// Extension of persisted model blobs
pub const MODEL_FILE_EXTENSION: &str = "json";

/// Durable byte storage for fitted models, one blob per instrument
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Make sure blobs can be written; failing here aborts a save
    async fn ensure_writable(&self) -> Result<(), StoreError>;

    /// Make sure the store can be read; an empty store is fine
    async fn ensure_readable(&self) -> Result<(), StoreError>;

    async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError>;

    /// `None` when no blob exists for the key
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Human-readable location of a key, for logs
    fn location(&self, key: &str) -> String;
}

/// Written and removed by `ensure_writable` to prove the directory accepts files
const WRITE_CHECK_FILE: &str = ".write_check";

/// Model store backed by a directory of `<instrument>.json` files
#[derive(Debug, Clone)]
pub struct FileModelStore {
    models_dir: PathBuf,
}

impl FileModelStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self { models_dir: models_dir.into() }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path of a key's blob; keys must name a file directly inside the models directory
    fn model_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let is_plain_name = !key.is_empty()
            && !key.contains(['/', '\\', '\0'])
            && !key.contains("..");
        if !is_plain_name {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.blob_path(key))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.models_dir.join(format!("{}.{}", key, MODEL_FILE_EXTENSION))
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn ensure_writable(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.models_dir)
            .await
            .map_err(|e| StoreError::io(&self.models_dir, e))?;

        // An existing directory can still refuse new files
        let check = self.models_dir.join(WRITE_CHECK_FILE);
        tokio::fs::write(&check, b"")
            .await
            .map_err(|e| StoreError::io(&check, e))?;
        tokio::fs::remove_file(&check)
            .await
            .map_err(|e| StoreError::io(&check, e))
    }

    async fn ensure_readable(&self) -> Result<(), StoreError> {
        match tokio::fs::metadata(&self.models_dir).await {
            Ok(meta) if meta.is_dir() => {
                tokio::fs::read_dir(&self.models_dir)
                    .await
                    .map_err(|e| StoreError::io(&self.models_dir, e))?;
                Ok(())
            }
            Ok(_) => Err(StoreError::NotADirectory(self.models_dir.clone())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Models directory {} does not exist yet", self.models_dir.display());
                Ok(())
            }
            Err(e) => Err(StoreError::io(&self.models_dir, e)),
        }
    }

    async fn put(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        let path = self.model_path(key)?;
        tokio::fs::write(&path, blob)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.model_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn location(&self, key: &str) -> String {
        self.blob_path(key).display().to_string()
    }
}

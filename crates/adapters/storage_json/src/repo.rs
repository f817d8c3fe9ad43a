//! JSON file implementation of the directory repository.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use thiefwatch_app::ports::DirectoryRepository;
use thiefwatch_domain::directory::Directory;
use thiefwatch_domain::error::WatchError;

use crate::error::StorageError;

/// Configuration for the JSON snapshot storage.
pub struct Config {
    /// Path of the snapshot file (e.g. `data/directory.json`).
    pub path: PathBuf,
}

impl Config {
    /// Build a [`JsonFileRepository`], creating the parent directory if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the parent directory cannot be created.
    pub async fn build(self) -> Result<JsonFileRepository, StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StorageError::io(parent))?;
        }
        Ok(JsonFileRepository { path: self.path })
    }
}

/// Stores the whole directory in one pretty-printed JSON file.
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read(&self) -> Result<Option<Directory>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::io(&self.path)(err)),
        };
        let directory = serde_json::from_slice(&bytes)?;
        tracing::debug!(path = %self.path.display(), "directory snapshot loaded");
        Ok(Some(directory))
    }

    async fn write(&self, directory: &Directory) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(directory)?;
        let temp = self.temp_path();

        let mut file = tokio::fs::File::create(&temp)
            .await
            .map_err(StorageError::io(&temp))?;
        file.write_all(&bytes)
            .await
            .map_err(StorageError::io(&temp))?;
        file.sync_all().await.map_err(StorageError::io(&temp))?;
        drop(file);

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(StorageError::io(&self.path))?;
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "directory snapshot saved");
        Ok(())
    }
}

impl DirectoryRepository for JsonFileRepository {
    fn load(&self) -> impl Future<Output = Result<Option<Directory>, WatchError>> + Send {
        async move { self.read().await.map_err(WatchError::from) }
    }

    fn save(&self, directory: &Directory) -> impl Future<Output = Result<(), WatchError>> + Send {
        async move { self.write(directory).await.map_err(WatchError::from) }
    }
}

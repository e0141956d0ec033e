use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Managed document area on the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, creating the directory if needed.
    ///
    /// `base_url` prefixes the URLs handed back to clients (e.g. "http://localhost:4000/files").
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a storage key to a path under the root.
    ///
    /// Only plain relative components are accepted, so a key can never resolve
    /// outside the storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let relative = Path::new(storage_key);
        let only_normal = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !only_normal {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(self.base_path.join(relative))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Move `source` to `destination`, copying when a rename is impossible (for example
/// across filesystems). On error `source` is still in place and `destination` holds no
/// partial copy.
async fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(
                source = %source.display(),
                destination = %destination.display(),
                error = %rename_err,
                "Rename failed, copying instead"
            );
            copy_then_remove(source, destination).await
        }
    }
}

async fn copy_then_remove(source: &Path, destination: &Path) -> std::io::Result<()> {
    if let Err(e) = fs::copy(source, destination).await {
        let _ = fs::remove_file(destination).await;
        return Err(e);
    }
    if let Err(e) = fs::remove_file(source).await {
        if let Err(cleanup) = fs::remove_file(destination).await {
            tracing::warn!(
                destination = %destination.display(),
                error = %cleanup,
                "Failed to remove copy after source removal failed"
            );
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(self.generate_url(storage_key))
    }

    async fn import_file(&self, source: &Path, storage_key: &str) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(source).await.unwrap_or(false) {
            return Err(StorageError::NotFound(source.display().to_string()));
        }

        self.ensure_parent_dir(&path).await?;

        move_file(source, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to move {} to {}: {}",
                source.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!(
            source = %source.display(),
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage import successful"
        );

        Ok(self.generate_url(storage_key))
    }

    async fn export_file(&self, storage_key: &str, destination: &Path) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        move_file(&path, destination).await.map_err(|e| {
            StorageError::ExportFailed(format!(
                "Failed to move {} to {}: {}",
                path.display(),
                destination.display(),
                e
            ))
        })?;

        tracing::info!(
            key = %storage_key,
            destination = %destination.display(),
            "Local storage export successful"
        );

        Ok(())
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let key = storage_key.to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(key = %key, error = %e, "Local storage stream download error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            "Local storage delete successful"
        );

        Ok(())
    }

    fn resolve_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        self.key_to_path(storage_key)
    }
}

//! Storage abstraction trait
//!
//! Defines the `Storage` trait implemented by the managed document area.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use scandesk_core::AppError;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Stored file {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::IoError(e) => AppError::Io(e),
            other => AppError::Storage(other.to_string()),
        }
    }
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// Keys are produced by [`crate::keys::generate_storage_key`]; every method that takes a
/// key rejects ones that would escape the storage root.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `storage_key`, returning the public URL.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Move a file from outside the storage area under `storage_key`.
    ///
    /// The source is gone once this returns `Ok`.
    async fn import_file(&self, source: &Path, storage_key: &str) -> StorageResult<String>;

    /// Move the file under `storage_key` back out to `destination`.
    ///
    /// The destination's directory must already exist. On `Err` the stored file is
    /// left untouched.
    async fn export_file(&self, storage_key: &str, destination: &Path) -> StorageResult<()>;

    /// Download a file as a stream of chunks.
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Delete a file. Missing files are not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Filesystem path backing `storage_key`, used for streaming hashes.
    fn resolve_path(&self, storage_key: &str) -> StorageResult<PathBuf>;
}

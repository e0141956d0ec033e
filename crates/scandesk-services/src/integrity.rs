//! Content hashing and tamper detection for stored documents.

use scandesk_core::models::Document;
use scandesk_core::AppError;
use scandesk_storage::Storage;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Files are hashed in chunks of this size; they are never read whole.
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of comparing a stored file against its recorded hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub matches: bool,
    pub expected_hash: String,
    pub actual_hash: String,
}

/// Lowercase hex SHA-256 of a file, streamed from disk.
pub async fn compute_hash(path: &Path) -> Result<String, AppError> {
    let mut file = File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => AppError::NotFound(format!("File {}", path.display())),
        _ => AppError::Io(e),
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex SHA-256 of an in-memory buffer.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Verifies stored documents against the hash recorded at upload time.
///
/// The recorded hash is never rewritten here.
#[derive(Clone)]
pub struct IntegrityEngine {
    storage: Arc<dyn Storage>,
}

impl IntegrityEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    #[tracing::instrument(skip(self, document), fields(document_id = %document.id))]
    pub async fn verify(&self, document: &Document) -> Result<IntegrityReport, AppError> {
        let path = self.storage.resolve_path(&document.storage_key)?;
        let actual_hash = compute_hash(&path).await.map_err(|e| match e {
            AppError::NotFound(_) => AppError::NotFound(format!(
                "Backing file for document {} is missing",
                document.id
            )),
            other => other,
        })?;

        let matches = actual_hash.eq_ignore_ascii_case(&document.content_hash);
        if !matches {
            tracing::warn!(
                document_id = %document.id,
                storage_key = %document.storage_key,
                expected_hash = %document.content_hash,
                actual_hash = %actual_hash,
                "Stored file does not match its recorded hash"
            );
        }

        Ok(IntegrityReport {
            matches,
            expected_hash: document.content_hash.clone(),
            actual_hash,
        })
    }

    /// Like [`IntegrityEngine::verify`], but a mismatch is an error.
    pub async fn ensure_intact(&self, document: &Document) -> Result<(), AppError> {
        let report = self.verify(document).await?;
        if report.matches {
            Ok(())
        } else {
            Err(AppError::Integrity {
                document_id: document.id,
                expected_hash: report.expected_hash,
                actual_hash: report.actual_hash,
            })
        }
    }
}

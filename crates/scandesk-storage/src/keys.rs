//! Storage key generation.
//!
//! Key format: `documents/{origin_segment}/{yyyy}/{mm}/{document_id}.{ext}`.

use chrono::{DateTime, Datelike, Utc};
use scandesk_core::models::Origin;
use uuid::Uuid;

/// Generate the storage key for a document.
///
/// The document id is the file stem, so two documents can never share a key even when
/// their original filenames collide.
pub fn generate_storage_key(
    origin: &Origin,
    document_id: Uuid,
    extension: Option<&str>,
    at: DateTime<Utc>,
) -> String {
    let stem = match extension {
        Some(ext) if !ext.is_empty() => format!("{}.{}", document_id, ext.to_lowercase()),
        _ => document_id.to_string(),
    };
    format!(
        "documents/{}/{:04}/{:02}/{}",
        origin.storage_segment(),
        at.year(),
        at.month(),
        stem
    )
}

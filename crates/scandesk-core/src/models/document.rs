use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::access::AccessPolicy;
use super::document_type::{DocumentSubType, DocumentType};
use super::lifecycle::{AuditEntry, DocumentState};
use super::origin::{Origin, OriginKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub origin: Origin,
    pub document_type: DocumentType,
    pub sub_type: Option<DocumentSubType>,
    pub storage_key: String,
    pub storage_url: String,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    /// Lowercase hex SHA-256 of the bytes at upload time.
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: Option<i64>,
    pub state: DocumentState,
    pub audit_trail: Vec<AuditEntry>,
    pub access_policy: AccessPolicy,
}

impl Document {
    /// Build a pending document with its `created` audit entry.
    pub fn new_pending(new: NewDocument) -> Self {
        let uploaded_at = Utc::now();
        let mut created = AuditEntry::new(
            super::lifecycle::AuditAction::Created,
            new.uploaded_by,
            new.comment,
        );
        created.at = uploaded_at;
        Self {
            id: new.id,
            origin: new.origin,
            document_type: new.document_type,
            sub_type: new.sub_type,
            storage_key: new.storage_key,
            storage_url: new.storage_url,
            original_filename: new.original_filename,
            content_type: new.content_type,
            file_size: new.file_size,
            content_hash: new.content_hash,
            uploaded_at,
            uploaded_by: new.uploaded_by,
            state: DocumentState::Pending,
            audit_trail: vec![created],
            access_policy: new.access_policy,
        }
    }

    pub fn entity_origin(&self) -> OriginKind {
        self.origin.kind()
    }

    /// File extension of the original filename, lowercased.
    pub fn extension(&self) -> Option<String> {
        crate::validation::file_extension(&self.original_filename)
    }

    pub fn last_audit_entry(&self) -> Option<&AuditEntry> {
        self.audit_trail.last()
    }

    /// Audit trail rendered as newline separated free text.
    pub fn audit_text(&self) -> String {
        self.audit_trail
            .iter()
            .map(AuditEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Everything needed to persist a freshly stored file as a pending document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub origin: Origin,
    pub document_type: DocumentType,
    pub sub_type: Option<DocumentSubType>,
    pub storage_key: String,
    pub storage_url: String,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    pub content_hash: String,
    pub uploaded_by: Option<i64>,
    pub access_policy: AccessPolicy,
    pub comment: Option<String>,
}

/// Listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DocumentFilter {
    pub origin: Option<OriginKind>,
    /// Entity id within `origin`.
    pub id: Option<i64>,
    pub state: Option<DocumentState>,
    pub document_type: Option<DocumentType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl DocumentFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    pub fn for_origin(origin: &Origin) -> Self {
        Self {
            origin: Some(origin.kind()),
            id: origin.entity_id(),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: DocumentState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = Some(document_type);
        self
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn matches(&self, document: &Document) -> bool {
        if let Some(origin) = self.origin {
            if document.origin.kind() != origin {
                return false;
            }
        }
        if let Some(id) = self.id {
            if document.origin.entity_id() != Some(id) {
                return false;
            }
        }
        if let Some(state) = self.state {
            if document.state != state {
                return false;
            }
        }
        if let Some(document_type) = self.document_type {
            if document.document_type != document_type {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub entity_origin: OriginKind,
    pub origin: Origin,
    pub document_type: DocumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<DocumentSubType>,
    pub filename: String,
    pub url: String,
    pub content_type: String,
    pub file_size: i64,
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: Option<i64>,
    pub state: DocumentState,
    pub access_policy: AccessPolicy,
    pub audit_trail: String,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        let audit_trail = doc.audit_text();
        DocumentResponse {
            id: doc.id,
            entity_origin: doc.origin.kind(),
            origin: doc.origin,
            document_type: doc.document_type,
            sub_type: doc.sub_type,
            filename: doc.original_filename,
            url: doc.storage_url,
            content_type: doc.content_type,
            file_size: doc.file_size,
            content_hash: doc.content_hash,
            uploaded_at: doc.uploaded_at,
            uploaded_by: doc.uploaded_by,
            state: doc.state,
            access_policy: doc.access_policy,
            audit_trail,
        }
    }
}

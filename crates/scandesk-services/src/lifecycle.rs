//! Document lifecycle: creation, review transitions, access control and queries.

use chrono::{DateTime, Utc};
use scandesk_core::models::{
    AccessPolicy, Actor, AuditAction, AuditEntry, Document, DocumentFilter, DocumentState,
    DocumentType, NewDocument, Origin, RequiredSetReport, ScanTarget, TransactionKind,
};
use scandesk_core::validation::{
    content_type_for_extension, content_type_matches_extension, file_extension, sanitize_filename,
};
use scandesk_core::AppError;
use scandesk_db::{DocumentRepository, TransitionOutcome};
use scandesk_storage::{generate_storage_key, ByteStream, Storage};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::integrity::{compute_hash, hash_bytes, IntegrityEngine, IntegrityReport};
use crate::validator::{DocumentValidator, ValidationReport};

/// File received in memory, usually from a multipart upload.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    /// Caller supplied MIME type; derived from the extension when absent.
    pub content_type: Option<String>,
    pub data: bytes::Bytes,
    pub target: ScanTarget,
    pub comment: Option<String>,
}

#[derive(Clone)]
pub struct DocumentLifecycleManager {
    repository: Arc<dyn DocumentRepository>,
    storage: Arc<dyn Storage>,
    integrity: IntegrityEngine,
    validator: DocumentValidator,
}

impl DocumentLifecycleManager {
    pub fn new(repository: Arc<dyn DocumentRepository>, storage: Arc<dyn Storage>) -> Self {
        Self {
            integrity: IntegrityEngine::new(storage.clone()),
            repository,
            storage,
            validator: DocumentValidator::new(),
        }
    }

    pub fn integrity(&self) -> &IntegrityEngine {
        &self.integrity
    }

    // Creation

    /// Store an uploaded file and record it as a pending document.
    #[tracing::instrument(skip_all, fields(actor_id = actor.actor_id, filename = %upload.filename))]
    pub async fn create_upload(
        &self,
        actor: &Actor,
        upload: DocumentUpload,
    ) -> Result<Document, AppError> {
        upload
            .target
            .check_sub_type()
            .map_err(|e| AppError::Validation(vec![e]))?;

        let filename = sanitize_filename(&upload.filename)?;
        self.validator.ensure_file(
            upload.target.document_type,
            &filename,
            upload.data.len() as u64,
        )?;

        let extension = file_extension(&filename);
        let content_type = resolve_content_type(extension.as_deref(), upload.content_type)?;

        let id = Uuid::new_v4();
        let storage_key =
            generate_storage_key(&upload.target.origin, id, extension.as_deref(), Utc::now());
        let content_hash = hash_bytes(&upload.data);
        let file_size = upload.data.len() as i64;

        let storage_url = self
            .storage
            .upload_with_key(&storage_key, upload.data.to_vec(), &content_type)
            .await?;

        let document = Document::new_pending(NewDocument {
            id,
            origin: upload.target.origin,
            document_type: upload.target.document_type,
            sub_type: upload.target.sub_type,
            storage_key,
            storage_url,
            original_filename: filename,
            content_type,
            file_size,
            content_hash,
            uploaded_by: Some(actor.actor_id),
            access_policy: upload.target.policy(),
            comment: upload.comment,
        });

        if let Err(e) = self.repository.insert(&document).await {
            if let Err(cleanup) = self.storage.delete(&document.storage_key).await {
                tracing::error!(
                    error = %cleanup,
                    storage_key = %document.storage_key,
                    "Failed to remove stored file after insert failure"
                );
            }
            return Err(e);
        }

        tracing::info!(
            document_id = %document.id,
            document_type = %document.document_type,
            origin = %document.entity_origin(),
            file_size = document.file_size,
            "Document uploaded"
        );

        Ok(document)
    }

    /// Move a stabilized scan file into managed storage and record it as pending.
    ///
    /// Validation runs before the file is touched, so a rejected file stays where it is.
    /// If the record cannot be written the file is moved back to `source`, or kept in
    /// managed storage when that move fails.
    #[tracing::instrument(skip_all, fields(source = %source.display(), document_type = %target.document_type))]
    pub async fn ingest_file(&self, source: &Path, target: &ScanTarget) -> Result<Document, AppError> {
        target
            .check_sub_type()
            .map_err(|e| AppError::Validation(vec![e]))?;

        let original_filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(sanitize_filename)
            .transpose()?
            .ok_or_else(|| {
                AppError::InvalidInput(format!("Unusable file name: {}", source.display()))
            })?;

        let metadata = tokio::fs::metadata(source).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("Scan file {}", source.display()))
            }
            _ => AppError::Io(e),
        })?;
        self.validator
            .ensure_file(target.document_type, &original_filename, metadata.len())?;

        let extension = file_extension(&original_filename);
        let content_type = resolve_content_type(extension.as_deref(), None)?;

        let id = Uuid::new_v4();
        let storage_key = generate_storage_key(&target.origin, id, extension.as_deref(), Utc::now());
        let storage_url = self.storage.import_file(source, &storage_key).await?;

        let recorded = async {
            let stored_path = self.storage.resolve_path(&storage_key)?;
            let content_hash = compute_hash(&stored_path).await?;
            let file_size = tokio::fs::metadata(&stored_path).await?.len() as i64;
            let document = Document::new_pending(NewDocument {
                id,
                origin: target.origin,
                document_type: target.document_type,
                sub_type: target.sub_type,
                storage_key: storage_key.clone(),
                storage_url,
                original_filename,
                content_type,
                file_size,
                content_hash,
                uploaded_by: None,
                access_policy: target.policy(),
                comment: None,
            });
            self.repository.insert(&document).await?;
            Ok::<_, AppError>(document)
        }
        .await;

        match recorded {
            Ok(document) => {
                tracing::info!(
                    document_id = %document.id,
                    storage_key = %document.storage_key,
                    content_hash = %document.content_hash,
                    "Scan ingested"
                );
                Ok(document)
            }
            Err(e) => {
                // The stored file may be the only copy, so it stays put if it cannot go back.
                match self.storage.export_file(&storage_key, source).await {
                    Ok(()) => tracing::warn!(
                        error = %e,
                        source = %source.display(),
                        "Scan not recorded, file returned to drop folder"
                    ),
                    Err(restore) => tracing::error!(
                        error = %e,
                        restore_error = %restore,
                        storage_key = %storage_key,
                        "Scan not recorded and could not be returned; file kept in managed storage"
                    ),
                }
                Err(e)
            }
        }
    }

    // Transitions

    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        comment: Option<String>,
    ) -> Result<Document, AppError> {
        self.transition(actor, id, DocumentState::Approved, comment)
            .await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        comment: Option<String>,
    ) -> Result<Document, AppError> {
        self.transition(actor, id, DocumentState::Rejected, comment)
            .await
    }

    #[tracing::instrument(skip_all, fields(actor_id = actor.actor_id, document_id = %id, to = %to))]
    async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        to: DocumentState,
        comment: Option<String>,
    ) -> Result<Document, AppError> {
        let action = AuditAction::for_state(to);
        if !actor.is_elevated() {
            return Err(AppError::AccessDenied(format!(
                "Only administrators and managers may {} documents",
                verb(to)
            )));
        }

        let document = self.load(id).await?;
        if !document.state.can_transition_to(to) {
            return Err(invalid_state(id, document.state, to));
        }

        if to == DocumentState::Approved {
            self.integrity.ensure_intact(&document).await?;
        }

        let entry = AuditEntry::new(action, Some(actor.actor_id), comment);
        match self
            .repository
            .transition(id, DocumentState::Pending, to, entry)
            .await?
        {
            TransitionOutcome::Applied(document) => {
                tracing::info!(
                    document_id = %id,
                    actor_id = actor.actor_id,
                    state = %document.state,
                    "Document reviewed"
                );
                Ok(document)
            }
            TransitionOutcome::Conflict(current) => Err(invalid_state(id, current, to)),
            TransitionOutcome::NotFound => Err(not_found(id)),
        }
    }

    // Validation and access

    pub fn validate(&self, document: &Document) -> ValidationReport {
        self.validator.validate(document, Utc::now())
    }

    /// Private documents belong to their origin's client or employee. Ownerless
    /// private documents (unrequested scans) fall back to elevated roles.
    pub fn can_access(&self, document: &Document, actor: &Actor) -> bool {
        match document.access_policy {
            AccessPolicy::Public => true,
            AccessPolicy::Private => match document.origin.owner_id() {
                Some(owner) => owner == actor.actor_id,
                None => actor.is_elevated(),
            },
            AccessPolicy::Restricted => actor.is_elevated(),
        }
    }

    pub fn authorize(&self, document: &Document, actor: &Actor) -> Result<(), AppError> {
        if self.can_access(document, actor) {
            Ok(())
        } else {
            tracing::debug!(
                document_id = %document.id,
                actor_id = actor.actor_id,
                policy = %document.access_policy,
                "Document access denied"
            );
            Err(AppError::AccessDenied(format!(
                "You do not have access to document {}",
                document.id
            )))
        }
    }

    /// Completeness of a client's bundle for `kind`.
    ///
    /// For each required type the newest approved document that passes validation
    /// satisfies it; approved documents that all fail validation count as expired.
    #[tracing::instrument(skip(self))]
    pub async fn check_required(
        &self,
        kind: TransactionKind,
        client_id: i64,
    ) -> Result<RequiredSetReport, AppError> {
        let now = Utc::now();
        let mut missing = Vec::new();
        let mut expired = Vec::new();
        for required in kind.required_documents() {
            match self.newest_valid(client_id, *required, now).await? {
                Candidate::Satisfied(document) => {
                    tracing::debug!(
                        document_id = %document.id,
                        document_type = %required,
                        "Required document satisfied"
                    );
                }
                Candidate::Expired => expired.push(*required),
                Candidate::Missing => missing.push(*required),
            }
        }

        Ok(RequiredSetReport::new(missing, expired))
    }

    /// Walk a client's approved documents of one type, newest first, page by page.
    async fn newest_valid(
        &self,
        client_id: i64,
        document_type: DocumentType,
        now: DateTime<Utc>,
    ) -> Result<Candidate, AppError> {
        let mut filter = DocumentFilter {
            limit: Some(DocumentFilter::MAX_LIMIT),
            offset: Some(0),
            ..DocumentFilter::for_origin(&Origin::Client { id: client_id })
                .with_state(DocumentState::Approved)
                .with_document_type(document_type)
        };
        let mut seen_any = false;
        loop {
            let page = self.repository.list(&filter).await?;
            let page_len = page.len() as i64;
            seen_any |= page_len > 0;
            if let Some(document) = page
                .into_iter()
                .find(|doc| self.validator.validate(doc, now).valid)
            {
                return Ok(Candidate::Satisfied(document));
            }
            if page_len < DocumentFilter::MAX_LIMIT {
                break;
            }
            filter.offset = Some(filter.effective_offset() + page_len);
        }

        Ok(if seen_any {
            Candidate::Expired
        } else {
            Candidate::Missing
        })
    }

    // Queries

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Document, AppError> {
        let document = self.load(id).await?;
        self.authorize(&document, actor)?;
        Ok(document)
    }

    /// Documents matching `filter` that `actor` may read.
    pub async fn list(
        &self,
        actor: &Actor,
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>, AppError> {
        let documents = self.repository.list(filter).await?;
        Ok(documents
            .into_iter()
            .filter(|doc| self.can_access(doc, actor))
            .collect())
    }

    pub async fn validate_by_id(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<ValidationReport, AppError> {
        let document = self.get(actor, id).await?;
        Ok(self.validate(&document))
    }

    pub async fn verify_integrity(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<IntegrityReport, AppError> {
        let document = self.get(actor, id).await?;
        self.integrity.verify(&document).await
    }

    /// Byte stream of a document's file after access and integrity checks.
    pub async fn open_content(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<(Document, ByteStream), AppError> {
        let document = self.get(actor, id).await?;
        self.integrity.ensure_intact(&document).await?;
        let stream = self.storage.download_stream(&document.storage_key).await?;
        Ok((document, stream))
    }

    /// Remove the backing file, then the record.
    #[tracing::instrument(skip_all, fields(actor_id = actor.actor_id, document_id = %id))]
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        if !actor.is_elevated() {
            return Err(AppError::AccessDenied(
                "Only administrators and managers may delete documents".to_string(),
            ));
        }

        let document = self.load(id).await?;
        self.storage.delete(&document.storage_key).await?;
        if !self.repository.delete(id).await? {
            return Err(not_found(id));
        }

        tracing::info!(
            document_id = %id,
            storage_key = %document.storage_key,
            "Document deleted"
        );
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Document, AppError> {
        self.repository.get(id).await?.ok_or_else(|| not_found(id))
    }
}

enum Candidate {
    Satisfied(Document),
    Expired,
    Missing,
}

fn resolve_content_type(
    extension: Option<&str>,
    supplied: Option<String>,
) -> Result<String, AppError> {
    let derived = extension
        .map(content_type_for_extension)
        .unwrap_or("application/octet-stream");

    match supplied {
        Some(ct) if !ct.trim().is_empty() && ct.trim() != "application/octet-stream" => {
            match extension {
                Some(ext) if !content_type_matches_extension(ext, &ct) => {
                    Err(AppError::Validation(vec![format!(
                        "Content type '{}' does not match extension '{}'",
                        ct, ext
                    )]))
                }
                _ => Ok(ct.trim().to_string()),
            }
        }
        _ => Ok(derived.to_string()),
    }
}

fn verb(state: DocumentState) -> &'static str {
    match state {
        DocumentState::Approved => "approve",
        DocumentState::Rejected => "reject",
        DocumentState::Pending => "reopen",
    }
}

fn invalid_state(id: Uuid, current: DocumentState, attempted: DocumentState) -> AppError {
    AppError::InvalidState {
        document_id: id,
        current: current.to_string(),
        attempted: verb(attempted).to_string(),
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Document {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_content_type_derives_from_extension() {
        assert_eq!(
            resolve_content_type(Some("pdf"), None).unwrap(),
            "application/pdf"
        );
        assert_eq!(
            resolve_content_type(Some("jpg"), Some("application/octet-stream".to_string()))
                .unwrap(),
            "image/jpeg"
        );
    }

    #[test]
    fn test_resolve_content_type_rejects_mismatch() {
        let result = resolve_content_type(Some("pdf"), Some("image/png".to_string()));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_invalid_state_message() {
        let err = invalid_state(Uuid::nil(), DocumentState::Approved, DocumentState::Rejected);
        assert_eq!(
            err.to_string(),
            format!(
                "Invalid state transition: document {} is approved, cannot reject",
                Uuid::nil()
            )
        );
    }
}

use async_trait::async_trait;
use scandesk_core::models::{AuditEntry, Document, DocumentFilter, DocumentState};
use scandesk_core::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::repository::{DocumentRepository, TransitionOutcome};

/// Process-local repository backing tests and `DOCUMENT_STORE=memory`.
#[derive(Clone, Default)]
pub struct InMemoryDocumentRepository {
    documents: Arc<Mutex<HashMap<Uuid, Document>>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Document>>, AppError> {
        self.documents
            .lock()
            .map_err(|_| AppError::Internal("document store lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn insert(&self, document: &Document) -> Result<(), AppError> {
        let mut documents = self.lock()?;
        if documents.contains_key(&document.id) {
            return Err(AppError::InvalidInput(format!(
                "Document {} already exists",
                document.id
            )));
        }
        if documents
            .values()
            .any(|existing| existing.storage_key == document.storage_key)
        {
            return Err(AppError::InvalidInput(format!(
                "Storage key {} is already in use",
                document.storage_key
            )));
        }
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, AppError> {
        let documents = self.lock()?;
        let mut matching: Vec<Document> = documents
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));

        Ok(matching
            .into_iter()
            .skip(filter.effective_offset() as usize)
            .take(filter.effective_limit() as usize)
            .collect())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: DocumentState,
        to: DocumentState,
        entry: AuditEntry,
    ) -> Result<TransitionOutcome, AppError> {
        let mut documents = self.lock()?;
        let Some(document) = documents.get_mut(&id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if document.state != from {
            return Ok(TransitionOutcome::Conflict(document.state));
        }

        let entry = entry.after(document.last_audit_entry());
        document.state = to;
        document.audit_trail.push(entry);
        Ok(TransitionOutcome::Applied(document.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock()?.remove(&id).is_some())
    }
}

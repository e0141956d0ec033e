use async_trait::async_trait;
use scandesk_core::models::{AuditEntry, Document, DocumentFilter, DocumentState};
use scandesk_core::AppError;
use uuid::Uuid;

/// Result of a compare-and-set state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// The document was in the expected state and now carries the new state and entry.
    Applied(Document),
    /// The document exists but was not in the expected state; nothing changed.
    Conflict(DocumentState),
    NotFound,
}

/// Persistence interface for document records.
///
/// Implementations must make [`DocumentRepository::transition`] atomic: of two concurrent
/// calls with the same `from` state at most one returns `Applied`. Appended audit entries
/// get a timestamp strictly after the previous entry.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, document: &Document) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Document>, AppError>;

    /// Documents matching `filter`, newest upload first.
    async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, AppError>;

    async fn transition(
        &self,
        id: Uuid,
        from: DocumentState,
        to: DocumentState,
        entry: AuditEntry,
    ) -> Result<TransitionOutcome, AppError>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

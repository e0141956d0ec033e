//! Document repository backed by the `documents` table.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scandesk_core::models::{
    AccessPolicy, AuditEntry, Document, DocumentFilter, DocumentState, DocumentSubType,
    DocumentType, Origin, OriginKind,
};
use scandesk_core::AppError;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::repository::{DocumentRepository, TransitionOutcome};
use crate::db::transaction::TransactionGuard;

const DOCUMENT_COLUMNS: &str = "id, client_id, employee_id, vehicle_id, transaction_id, \
    transaction_date, document_type, sub_type_kind, storage_key, storage_url, \
    original_filename, content_type, file_size, content_hash, uploaded_at, uploaded_by, \
    state, audit_trail, access_policy";

/// Row type for the documents table.
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    client_id: Option<i64>,
    employee_id: Option<i64>,
    vehicle_id: Option<i64>,
    transaction_id: Option<i64>,
    transaction_date: Option<NaiveDate>,
    document_type: DocumentType,
    sub_type_kind: Option<String>,
    storage_key: String,
    storage_url: String,
    original_filename: String,
    content_type: String,
    file_size: i64,
    content_hash: String,
    uploaded_at: DateTime<Utc>,
    uploaded_by: Option<i64>,
    state: DocumentState,
    audit_trail: Json<Vec<AuditEntry>>,
    access_policy: AccessPolicy,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document, AppError> {
        let corrupt = |msg: String| {
            AppError::Internal(format!("Corrupt document row {}: {}", self.id, msg))
        };

        let origin = Origin::from_references(
            self.client_id,
            self.employee_id,
            self.vehicle_id,
            self.transaction_id,
            self.transaction_date,
        )
        .map_err(corrupt)?;

        let sub_type = self
            .sub_type_kind
            .as_deref()
            .map(|kind| DocumentSubType::parse(origin.kind(), kind))
            .transpose()
            .map_err(corrupt)?;

        Ok(Document {
            id: self.id,
            origin,
            document_type: self.document_type,
            sub_type,
            storage_key: self.storage_key,
            storage_url: self.storage_url,
            original_filename: self.original_filename,
            content_type: self.content_type,
            file_size: self.file_size,
            content_hash: self.content_hash,
            uploaded_at: self.uploaded_at,
            uploaded_by: self.uploaded_by,
            state: self.state,
            audit_trail: self.audit_trail.0,
            access_policy: self.access_policy,
        })
    }
}

/// Split an origin into its nullable reference columns.
fn origin_columns(
    origin: &Origin,
) -> (
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    Option<NaiveDate>,
) {
    match *origin {
        Origin::Client { id } => (Some(id), None, None, None, None),
        Origin::Employee { id } => (None, Some(id), None, None, None),
        Origin::Vehicle { id } => (None, None, Some(id), None, None),
        Origin::Transaction { id, date } => (None, None, None, Some(id), Some(date)),
        Origin::General => (None, None, None, None, None),
    }
}

fn origin_reference_column(kind: OriginKind) -> Option<&'static str> {
    match kind {
        OriginKind::Client => Some("client_id"),
        OriginKind::Employee => Some("employee_id"),
        OriginKind::Vehicle => Some("vehicle_id"),
        OriginKind::Transaction => Some("transaction_id"),
        OriginKind::General => None,
    }
}

#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    #[tracing::instrument(skip(self, document), fields(db.table = "documents", db.record_id = %document.id))]
    async fn insert(&self, document: &Document) -> Result<(), AppError> {
        let (client_id, employee_id, vehicle_id, transaction_id, transaction_date) =
            origin_columns(&document.origin);

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, client_id, employee_id, vehicle_id, transaction_id, transaction_date,
                document_type, sub_type_kind, storage_key, storage_url, original_filename,
                content_type, file_size, content_hash, uploaded_at, uploaded_by, state,
                audit_trail, access_policy
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(document.id)
        .bind(client_id)
        .bind(employee_id)
        .bind(vehicle_id)
        .bind(transaction_id)
        .bind(transaction_date)
        .bind(document.document_type)
        .bind(document.sub_type.map(|s| s.kind_name()))
        .bind(&document.storage_key)
        .bind(&document.storage_url)
        .bind(&document.original_filename)
        .bind(&document.content_type)
        .bind(document.file_size)
        .bind(&document.content_hash)
        .bind(document.uploaded_at)
        .bind(document.uploaded_by)
        .bind(document.state)
        .bind(Json(&document.audit_trail))
        .bind(document.access_policy)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Document>, AppError> {
        let row: Option<DocumentRow> = sqlx::query_as::<Postgres, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents"))]
    async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, AppError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM documents WHERE TRUE",
            DOCUMENT_COLUMNS
        ));

        if let Some(origin) = filter.origin {
            query.push(" AND entity_origin = ").push_bind(origin.as_str());
            if let (Some(id), Some(column)) = (filter.id, origin_reference_column(origin)) {
                query.push(format!(" AND {} = ", column)).push_bind(id);
            }
        }
        if let Some(state) = filter.state {
            query.push(" AND state = ").push_bind(state);
        }
        if let Some(document_type) = filter.document_type {
            query.push(" AND document_type = ").push_bind(document_type);
        }

        query
            .push(" ORDER BY uploaded_at DESC, id LIMIT ")
            .push_bind(filter.effective_limit())
            .push(" OFFSET ")
            .push_bind(filter.effective_offset());

        let rows: Vec<DocumentRow> = query
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    #[tracing::instrument(skip_all, fields(db.table = "documents", db.record_id = %id, from = %from, to = %to))]
    async fn transition(
        &self,
        id: Uuid,
        from: DocumentState,
        to: DocumentState,
        entry: AuditEntry,
    ) -> Result<TransitionOutcome, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        // Row lock serializes concurrent transitions on the same document.
        let row: Option<DocumentRow> = sqlx::query_as::<Postgres, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE id = $1 FOR UPDATE",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(TransitionOutcome::NotFound);
        };
        if row.state != from {
            let current = row.state;
            tx.rollback().await?;
            return Ok(TransitionOutcome::Conflict(current));
        }

        let entry = entry.after(row.audit_trail.0.last());

        let updated: DocumentRow = sqlx::query_as::<Postgres, DocumentRow>(&format!(
            r#"
            UPDATE documents
            SET state = $2, audit_trail = audit_trail || $3::jsonb
            WHERE id = $1
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .bind(to)
        .bind(Json(vec![entry]))
        .fetch_one(&mut **tx)
        .await?;

        tx.commit().await?;

        tracing::info!(document_id = %id, state = %to, "Document state updated");

        Ok(TransitionOutcome::Applied(updated.into_document()?))
    }

    #[tracing::instrument(skip(self), fields(db.table = "documents", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

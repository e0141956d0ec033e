//! Document endpoints: upload, listing, review, integrity and client bundles.

use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, Query, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Json,
};
use futures::StreamExt;
use scandesk_core::models::{
    DocumentFilter, DocumentResponse, RequiredSetReport, ScanTarget, TransactionKind,
};
use scandesk_core::AppError;
use scandesk_services::{DocumentUpload, IntegrityReport, ValidationReport};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthActor;
use crate::error::HttpAppError;
use crate::state::AppState;

/// JSON carried in the `metadata` part of an upload.
#[derive(Debug, Deserialize)]
pub struct UploadMetadata {
    #[serde(flatten)]
    pub target: ScanTarget,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub comment: Option<String>,
}

#[tracing::instrument(skip(state, actor), fields(actor_id = actor.0.actor_id))]
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    actor: AuthActor,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<Vec<DocumentResponse>>, HttpAppError> {
    let documents = state.documents.list(&actor.0, &filter).await?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

#[tracing::instrument(skip_all, fields(actor_id = actor.0.actor_id))]
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    actor: AuthActor,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut metadata: Option<UploadMetadata> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Send exactly one field named 'file'".to_string(),
                    )
                    .into());
                }
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                file = Some((filename, content_type, data));
            }
            "metadata" => {
                let text = field.text().await?;
                metadata = Some(serde_json::from_str(&text).map_err(|e| {
                    AppError::InvalidInput(format!("Invalid metadata: {}", e))
                })?);
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    let metadata =
        metadata.ok_or_else(|| AppError::InvalidInput("No metadata provided".to_string()))?;

    let document = state
        .documents
        .create_upload(
            &actor.0,
            DocumentUpload {
                filename,
                content_type,
                data,
                target: metadata.target,
                comment: metadata.comment,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, HttpAppError> {
    let document = state.documents.get(&actor, id).await?;
    Ok(Json(document.into()))
}

/// Stream the stored file. Refuses with 409 when the bytes no longer match the hash.
#[tracing::instrument(skip(state, actor), fields(actor_id = actor.0.actor_id, document_id = %id))]
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    actor: AuthActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (document, stream) = state.documents.open_content(&actor.0, id).await?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let content_disposition = format!(
        "attachment; filename=\"{}\"",
        document.original_filename.replace('"', "")
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, document.content_type.as_str())
        .header(header::CONTENT_DISPOSITION, content_disposition.as_str())
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

pub async fn validate_document(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ValidationReport>, HttpAppError> {
    Ok(Json(state.documents.validate_by_id(&actor, id).await?))
}

pub async fn verify_integrity(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<Json<IntegrityReport>, HttpAppError> {
    Ok(Json(state.documents.verify_integrity(&actor, id).await?))
}

/// The review body is optional, so an empty request means "no comment".
fn review_comment(body: &Bytes) -> Result<Option<String>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let request: ReviewRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {}", e)))?;
    Ok(request.comment.filter(|c| !c.trim().is_empty()))
}

pub async fn approve_document(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<DocumentResponse>, HttpAppError> {
    let comment = review_comment(&body)?;
    let document = state.documents.approve(&actor, id, comment).await?;
    Ok(Json(document.into()))
}

pub async fn reject_document(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<DocumentResponse>, HttpAppError> {
    let comment = review_comment(&body)?;
    let document = state.documents.reject(&actor, id, comment).await?;
    Ok(Json(document.into()))
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    AuthActor(actor): AuthActor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HttpAppError> {
    state.documents.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn required_documents(
    State(state): State<Arc<AppState>>,
    AuthActor(_actor): AuthActor,
    Path((client_id, kind)): Path<(i64, String)>,
) -> Result<Json<RequiredSetReport>, HttpAppError> {
    let kind = kind.parse::<TransactionKind>().map_err(AppError::InvalidInput)?;
    Ok(Json(state.documents.check_required(kind, client_id).await?))
}

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub document_store: String,
    pub scanner: String,
}

/// Liveness plus the cached scanner state. Never touches the device.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        document_store: state.config.document_store().to_string(),
        scanner: state.scanner.status().to_string(),
    })
}

//! Scanner endpoints: cached status, scan requests and reconfiguration.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use scandesk_core::models::{DeviceEndpoint, DeviceSnapshot, ScanOptions};
use scandesk_core::AppError;
use scandesk_scanner::{EffectiveConfig, ScanOutcome, SessionConfig};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AuthActor;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub options: ScanOptions,
}

#[derive(Deserialize)]
pub struct ConfigureRequest {
    pub address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub storage_path: String,
}

impl ConfigureRequest {
    fn into_session_config(self) -> SessionConfig {
        let mut endpoint = DeviceEndpoint::new(self.address.trim());
        if let Some(username) = self.username.filter(|u| !u.trim().is_empty()) {
            endpoint = endpoint.with_credentials(username, self.password.unwrap_or_default());
        }
        SessionConfig::new(endpoint, self.storage_path.trim())
    }
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<DeviceSnapshot> {
    Json(state.scanner.snapshot())
}

/// 202 once the device has taken the settings, 409 with the reason otherwise.
#[tracing::instrument(skip_all, fields(actor_id = actor.0.actor_id))]
pub async fn request_scan(
    State(state): State<Arc<AppState>>,
    actor: AuthActor,
    ValidatedJson(request): ValidatedJson<ScanRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let outcome = state.scanner.request_scan(request.options).await?;
    let status = match outcome {
        ScanOutcome::Accepted(_) => StatusCode::ACCEPTED,
        ScanOutcome::Refused { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)))
}

#[tracing::instrument(skip_all, fields(actor_id = actor.0.actor_id))]
pub async fn configure(
    State(state): State<Arc<AppState>>,
    actor: AuthActor,
    ValidatedJson(request): ValidatedJson<ConfigureRequest>,
) -> Result<Json<EffectiveConfig>, HttpAppError> {
    if !actor.0.is_elevated() {
        return Err(AppError::AccessDenied(
            "Only administrators and managers may configure the scanner".to_string(),
        )
        .into());
    }

    let effective = state
        .scanner
        .reconfigure(request.into_session_config())
        .await?;
    Ok(Json(effective))
}

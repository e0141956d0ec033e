//! Route configuration and setup

use crate::constants::API_PREFIX;
use crate::handlers::{documents, health, scanner};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use scandesk_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

const DEFAULT_CONCURRENCY_LIMIT: usize = 1_024;

/// Full application router with CORS, tracing and the upload size limit applied.
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_CONCURRENCY_LIMIT)
        .max(1);

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest(API_PREFIX, api_routes())
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_size_bytes()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/documents",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route(
            "/documents/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/{id}/content", get(documents::download_document))
        .route(
            "/documents/{id}/validation",
            get(documents::validate_document),
        )
        .route(
            "/documents/{id}/verify-integrity",
            get(documents::verify_integrity),
        )
        .route("/documents/{id}/approve", post(documents::approve_document))
        .route("/documents/{id}/reject", post(documents::reject_document))
        .route(
            "/clients/{client_id}/required-documents/{kind}",
            get(documents::required_documents),
        )
        .route("/scanner/status", get(scanner::get_status))
        .route("/scanner/scan", post(scanner::request_scan))
        .route("/scanner/configure", post(scanner::configure))
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        if config.is_production() {
            tracing::warn!("CORS configured to allow all origins - not recommended for production");
        }
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use scandesk_core::Config;
use std::sync::Arc;

/// Validate configuration, install tracing, build services and routes.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry()?;

    tracing::info!(
        environment = %config.environment(),
        document_store = %config.document_store(),
        "Configuration loaded and validated successfully"
    );

    let state = services::initialize_services(&config).await?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

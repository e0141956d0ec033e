//! Repository, storage and scanner wiring.

use anyhow::{Context, Result};
use scandesk_core::{Config, DocumentStore};
use scandesk_db::{DocumentRepository, InMemoryDocumentRepository, PgDocumentRepository};
use scandesk_scanner::{
    DeviceTransportFactory, HttpTransportFactory, MonitorConfig, ScanCoordinator, SessionConfig,
    SessionTemplate, WatcherConfig,
};
use scandesk_services::DocumentLifecycleManager;
use scandesk_storage::{create_storage, Storage};
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let repository: Arc<dyn DocumentRepository> = match config.document_store() {
        DocumentStore::Postgres => {
            let pool = super::database::setup_database(config).await?;
            Arc::new(PgDocumentRepository::new(pool))
        }
        DocumentStore::Memory => {
            tracing::warn!("Using the in-memory document store; records are lost on restart");
            Arc::new(InMemoryDocumentRepository::new())
        }
    };

    let storage = create_storage(config)
        .await
        .context("Failed to initialize managed storage")?;

    let transports = Arc::new(HttpTransportFactory::new(Duration::from_millis(
        config.device().timeout_ms,
    )));

    build_state(config.clone(), repository, storage, transports).await
}

/// Assemble the state from already constructed backends and start the scan session.
pub async fn build_state(
    config: Config,
    repository: Arc<dyn DocumentRepository>,
    storage: Arc<dyn Storage>,
    transports: Arc<dyn DeviceTransportFactory>,
) -> Result<Arc<AppState>> {
    let documents = DocumentLifecycleManager::new(repository, storage);

    let template = SessionTemplate {
        manager: documents.clone(),
        transports,
        monitor: MonitorConfig::from(config.device()),
        watcher: WatcherConfig::from(config.scan()),
    };
    let session = SessionConfig::new(
        config.device().endpoint.clone(),
        &config.scan().scan_folder,
    );

    let scanner = ScanCoordinator::start(template, session)
        .await
        .context("Failed to start scan session")?;

    tracing::info!(
        scan_folder = %config.scan().scan_folder,
        device = %config.device().endpoint.address,
        "Services initialized"
    );

    Ok(Arc::new(AppState {
        config,
        documents,
        scanner: Arc::new(scanner),
    }))
}

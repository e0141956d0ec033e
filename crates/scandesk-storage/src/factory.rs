use crate::{LocalStorage, Storage, StorageResult};
use scandesk_core::Config;
use std::sync::Arc;

/// Create the managed storage backend from configuration.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage = config.storage();
    let local = LocalStorage::new(
        storage.managed_storage_path.clone(),
        storage.storage_base_url.clone(),
    )
    .await?;

    tracing::info!(
        path = %storage.managed_storage_path,
        base_url = %storage.storage_base_url,
        "Managed document storage ready"
    );

    Ok(Arc::new(local))
}

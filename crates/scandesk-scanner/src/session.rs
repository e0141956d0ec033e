//! One device connection plus one drop-folder watch.

use scandesk_core::models::{DeviceEndpoint, DeviceSnapshot, DeviceState};
use scandesk_core::AppError;
use scandesk_services::DocumentLifecycleManager;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::monitor::{DeviceMonitor, MonitorConfig};
use crate::transport::DeviceTransportFactory;
use crate::watcher::{IngestionWatcher, WatcherConfig};

/// Connection settings that identify a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub device: DeviceEndpoint,
    pub scan_folder: PathBuf,
}

impl SessionConfig {
    pub fn new(device: DeviceEndpoint, scan_folder: impl Into<PathBuf>) -> Self {
        Self {
            device,
            scan_folder: scan_folder.into(),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.device.address.trim().is_empty() {
            errors.push("address: Device address is required".to_string());
        }
        if self.scan_folder.as_os_str().is_empty() {
            errors.push("storage_path: Scan folder is required".to_string());
        }
        if let Some(credentials) = &self.device.credentials {
            if credentials.username.trim().is_empty() {
                errors.push("username: Username must not be blank when credentials are set".to_string());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// Session settings as reported back to callers, without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub address: String,
    pub username: Option<String>,
    pub password_set: bool,
    pub storage_path: String,
}

impl From<&SessionConfig> for EffectiveConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            address: config.device.base_url(),
            username: config.device.credentials.as_ref().map(|c| c.username.clone()),
            password_set: config
                .device
                .credentials
                .as_ref()
                .is_some_and(|c| !c.password.is_empty()),
            storage_path: config.scan_folder.display().to_string(),
        }
    }
}

/// Shared pieces every session is built from.
#[derive(Clone)]
pub struct SessionTemplate {
    pub manager: DocumentLifecycleManager,
    pub transports: Arc<dyn DeviceTransportFactory>,
    pub monitor: MonitorConfig,
    /// Watch settings; the root is replaced by each session's scan folder.
    pub watcher: WatcherConfig,
}

pub struct ScanSession {
    config: SessionConfig,
    monitor: Arc<DeviceMonitor>,
    watcher: IngestionWatcher,
    active: AtomicBool,
    cancel: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl ScanSession {
    /// Connect to the device, start the watch and begin polling.
    #[tracing::instrument(skip_all, fields(address = %config.device.address, scan_folder = %config.scan_folder.display()))]
    pub async fn start(config: SessionConfig, template: &SessionTemplate) -> Result<Arc<Self>, AppError> {
        config.validate()?;

        let monitor = Arc::new(DeviceMonitor::new(
            template.transports.clone(),
            &config.device,
            template.monitor.clone(),
        )?);

        let watcher_config = WatcherConfig {
            root: config.scan_folder.clone(),
            ..template.watcher.clone()
        };
        let watcher = IngestionWatcher::new(template.manager.clone(), watcher_config);
        watcher.start().await?;

        let cancel = CancellationToken::new();
        let poller = monitor.spawn_polling(cancel.clone());

        tracing::info!("Scan session started");

        Ok(Arc::new(Self {
            config,
            monitor,
            watcher,
            active: AtomicBool::new(true),
            cancel,
            poller: Mutex::new(Some(poller)),
        }))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig::from(&self.config)
    }

    pub fn monitor(&self) -> &DeviceMonitor {
        &self.monitor
    }

    pub fn watcher(&self) -> &IngestionWatcher {
        &self.watcher
    }

    pub fn status(&self) -> DeviceState {
        self.monitor.current_state()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.monitor.snapshot()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Make in-flight and future scan requests on this session refuse.
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Stop polling and watching. Queued files are still ingested before this returns.
    pub async fn shutdown(&self) {
        self.deactivate();
        self.cancel.cancel();

        let poller = self
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(poller) = poller {
            if let Err(e) = poller.await {
                tracing::warn!(error = %e, "Device polling task ended abnormally");
            }
        }

        self.watcher.stop().await;
        tracing::info!(address = %self.config.device.address, "Scan session stopped");
    }
}

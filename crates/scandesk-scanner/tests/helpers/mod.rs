//! Test helpers: lifecycle manager over temp storage, a scripted device, fast timings.

use async_trait::async_trait;
use scandesk_core::models::{DeviceEndpoint, ScanOptions, StatusId};
use scandesk_db::InMemoryDocumentRepository;
use scandesk_scanner::{
    DeviceTransport, DeviceTransportFactory, IngestionEvent, MonitorConfig, RawStatus,
    SessionTemplate, TransportError, WatcherConfig,
};
use scandesk_services::DocumentLifecycleManager;
use scandesk_storage::LocalStorage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Address the fake factory refuses to connect to.
pub const UNREACHABLE_ADDRESS: &str = "unreachable";

pub struct TestEnv {
    pub dir: TempDir,
    pub repository: Arc<InMemoryDocumentRepository>,
    pub storage: Arc<LocalStorage>,
    pub manager: DocumentLifecycleManager,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            LocalStorage::new(dir.path().join("managed"), "http://localhost/files".to_string())
                .await
                .unwrap(),
        );
        let repository = Arc::new(InMemoryDocumentRepository::new());
        let manager = DocumentLifecycleManager::new(repository.clone(), storage.clone());
        Self {
            dir,
            repository,
            storage,
            manager,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn watcher_config(&self, root: &str) -> WatcherConfig {
        WatcherConfig {
            stability_window: Duration::from_millis(150),
            poll_interval: Duration::from_millis(25),
            ..WatcherConfig::new(self.path(root))
        }
    }
}

/// Scriptable device: status codes and whether scan settings are accepted.
pub struct FakeDevice {
    status: Mutex<RawStatus>,
    reject_options: AtomicBool,
    pub applied: AtomicUsize,
}

impl FakeDevice {
    pub fn new(device: &str, scanner: &str) -> Arc<Self> {
        let device_handle = Arc::new(Self {
            status: Mutex::new(RawStatus::new()),
            reject_options: AtomicBool::new(false),
            applied: AtomicUsize::new(0),
        });
        device_handle.set_status(device, scanner);
        device_handle
    }

    pub fn set_status(&self, device: &str, scanner: &str) {
        let mut status = self.status.lock().unwrap();
        status.insert("device_status".to_string(), device.to_string());
        status.insert("scanner_status".to_string(), scanner.to_string());
        status.insert("paper_jam".to_string(), "0".to_string());
    }

    pub fn reject_options(&self, reject: bool) {
        self.reject_options.store(reject, Ordering::SeqCst);
    }

    pub fn factory(self: &Arc<Self>) -> Arc<dyn DeviceTransportFactory> {
        let device = Arc::clone(self);
        Arc::new(
            move |endpoint: &DeviceEndpoint| -> Result<Arc<dyn DeviceTransport>, TransportError> {
                if endpoint.address == UNREACHABLE_ADDRESS {
                    return Err(TransportError::InvalidAddress(endpoint.address.clone()));
                }
                let transport: Arc<dyn DeviceTransport> = device.clone();
                Ok(transport)
            },
        )
    }
}

#[async_trait]
impl DeviceTransport for FakeDevice {
    async fn query_status(&self, _ids: &[StatusId]) -> Result<RawStatus, TransportError> {
        Ok(self.status.lock().unwrap().clone())
    }

    async fn apply_scan_options(&self, _options: &ScanOptions) -> Result<(), TransportError> {
        if self.reject_options.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("unsupported paper size".to_string()));
        }
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn fast_monitor() -> MonitorConfig {
    MonitorConfig {
        timeout: Duration::from_millis(200),
        retry_delay: Duration::from_millis(10),
        poll_interval: Duration::from_millis(50),
    }
}

pub fn template(env: &TestEnv, device: &Arc<FakeDevice>) -> SessionTemplate {
    SessionTemplate {
        manager: env.manager.clone(),
        transports: device.factory(),
        monitor: fast_monitor(),
        watcher: env.watcher_config("unused"),
    }
}

/// Next event, failing the test after a few seconds.
pub async fn next_event(events: &mut broadcast::Receiver<IngestionEvent>) -> IngestionEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for ingestion event")
        .expect("event channel closed")
}

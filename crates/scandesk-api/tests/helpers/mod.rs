//! Test helpers: build AppState and router over an in-memory store and a fake scanner.
//!
//! Run from workspace root: `cargo test -p scandesk-api`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestRequest, TestResponse, TestServer};
use scandesk_api::constants::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, API_PREFIX};
use scandesk_api::setup::{routes, services};
use scandesk_api::AppState;
use scandesk_core::config::{
    BaseConfig, DeviceConfig, ScanFolderConfig, ScandeskConfig, StorageConfig,
};
use scandesk_core::models::{DeviceEndpoint, ScanOptions, StatusId};
use scandesk_core::{Config, DocumentStore};
use scandesk_db::InMemoryDocumentRepository;
use scandesk_scanner::{DeviceTransport, DeviceTransportFactory, RawStatus, TransportError};
use scandesk_storage::LocalStorage;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub const ADMIN: (i64, &str) = (1, "admin");
pub const SALES: (i64, &str) = (2, "sales");

/// API path prefix for tests (e.g. `/api/v0/documents`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

pub trait AsActor {
    fn as_actor(self, actor: (i64, &str)) -> Self;
}

impl AsActor for TestRequest {
    fn as_actor(self, (id, role): (i64, &str)) -> Self {
        self.add_header(ACTOR_ID_HEADER, id.to_string())
            .add_header(ACTOR_ROLE_HEADER, role.to_string())
    }
}

/// Scanner stand-in reporting whatever codes the test sets.
pub struct FakeDevice {
    status: Mutex<RawStatus>,
}

impl FakeDevice {
    pub fn new(device: &str, scanner: &str) -> Arc<Self> {
        let fake = Arc::new(Self {
            status: Mutex::new(RawStatus::new()),
        });
        fake.set_status(device, scanner);
        fake
    }

    pub fn set_status(&self, device: &str, scanner: &str) {
        let mut status = self.status.lock().unwrap();
        status.insert(StatusId::Device.as_str().to_string(), device.to_string());
        status.insert(StatusId::Scanner.as_str().to_string(), scanner.to_string());
        status.insert(StatusId::PaperJam.as_str().to_string(), "0".to_string());
    }

    fn factory(self: &Arc<Self>) -> Arc<dyn DeviceTransportFactory> {
        let device = Arc::clone(self);
        Arc::new(
            move |_endpoint: &DeviceEndpoint| -> Result<Arc<dyn DeviceTransport>, TransportError> {
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
        Ok(())
    }
}

/// Test application: server, state and owned temp directory.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub storage: Arc<LocalStorage>,
    pub device: Arc<FakeDevice>,
    pub dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn scan_folder(&self) -> PathBuf {
        self.path("scans")
    }

    /// Poll the fake device once so the cached state is current.
    pub async fn refresh_device(&self) {
        self.state.scanner.session().monitor().poll().await;
    }

    pub async fn shutdown(&self) {
        self.state.scanner.shutdown().await;
    }
}

fn test_config(dir: &TempDir) -> Config {
    let path = |name: &str| dir.path().join(name).display().to_string();
    Config(Box::new(ScandeskConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
            document_store: DocumentStore::Memory,
            database_url: None,
            db_max_connections: 1,
            db_timeout_seconds: 5,
            max_upload_size_bytes: 60 * 1024 * 1024,
        },
        storage: StorageConfig {
            managed_storage_path: path("managed"),
            storage_base_url: "http://localhost/files".to_string(),
        },
        scan: ScanFolderConfig {
            scan_folder: path("scans"),
            quarantine_path: None,
            allowed_extensions: vec!["pdf".to_string(), "jpg".to_string(), "png".to_string()],
            stability_window_ms: 150,
            poll_interval_ms: 25,
            queue_capacity: 16,
            ingest_existing: false,
            target_ttl_secs: 60,
        },
        device: DeviceConfig {
            endpoint: DeviceEndpoint::new("scanner.test"),
            timeout_ms: 200,
            retry_delay_ms: 10,
            poll_interval_secs: 60,
        },
    }))
}

/// Ready device, in-memory repository and temp storage.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_device(FakeDevice::new("1", "1")).await
}

pub async fn setup_test_app_with_device(device: Arc<FakeDevice>) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(&dir);

    let storage = Arc::new(
        LocalStorage::new(
            dir.path().join("managed"),
            "http://localhost/files".to_string(),
        )
        .await
        .expect("Failed to create local storage"),
    );
    let repository = Arc::new(InMemoryDocumentRepository::new());

    let state = services::build_state(
        config.clone(),
        repository,
        storage.clone(),
        device.factory(),
    )
    .await
    .expect("Failed to build state");

    let app = routes::setup_routes(&config, state.clone()).expect("Failed to build routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        storage,
        device,
        dir,
    }
}

pub fn pdf_part(filename: &str, data: &[u8]) -> Part {
    Part::bytes(data.to_vec())
        .file_name(filename)
        .mime_type("application/pdf")
}

/// Upload `data` as `actor` with the given metadata JSON.
pub async fn upload(
    app: &TestApp,
    actor: (i64, &str),
    part: Part,
    metadata: serde_json::Value,
) -> TestResponse {
    let form = MultipartForm::new()
        .add_part("file", part)
        .add_text("metadata", metadata.to_string());
    app.client()
        .post(&api_path("/documents"))
        .as_actor(actor)
        .multipart(form)
        .await
}

/// Upload a PDF for a client and return its id.
pub async fn upload_client_pdf(
    app: &TestApp,
    client_id: i64,
    document_type: &str,
    policy: &str,
) -> Uuid {
    let response = upload(
        app,
        ADMIN,
        pdf_part("scan.pdf", b"%PDF-1.4 test document"),
        serde_json::json!({
            "origin": {"kind": "client", "id": client_id},
            "document_type": document_type,
            "access_policy": policy,
        }),
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    document_id(&response)
}

pub fn document_id(response: &TestResponse) -> Uuid {
    let body: serde_json::Value = response.json();
    body["id"]
        .as_str()
        .and_then(|id| Uuid::parse_str(id).ok())
        .expect("Expected 'id' in response")
}

/// Wait until `check` holds, failing the test after a few seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

//! Scan session coordinator tests with a scripted device.
//!
//! Run with: `cargo test -p scandesk-scanner --test coordinator_test`

mod helpers;

use helpers::{next_event, template, FakeDevice, TestEnv, UNREACHABLE_ADDRESS};
use scandesk_core::models::{
    DeviceEndpoint, DeviceState, DocumentType, Origin, OutputFormat, ScanOptions, ScanTarget,
};
use scandesk_core::AppError;
use scandesk_db::DocumentRepository;
use scandesk_scanner::{IngestionEvent, ScanCoordinator, ScanOutcome, SessionConfig, REFUSED_NOT_READY};
use std::sync::atomic::Ordering;
use std::sync::Arc;

async fn coordinator(env: &TestEnv, device: &Arc<FakeDevice>) -> ScanCoordinator {
    let config = SessionConfig::new(DeviceEndpoint::new("scanner.local"), env.path("drop"));
    ScanCoordinator::start(template(env, device), config)
        .await
        .unwrap()
}

fn id_scan(client_id: i64) -> ScanOptions {
    ScanOptions {
        target: ScanTarget::new(Origin::Client { id: client_id }, DocumentType::Identification),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_status_reflects_polled_device() {
    let env = TestEnv::new().await;
    let device = FakeDevice::new("1", "2");
    let coordinator = coordinator(&env, &device).await;

    assert_eq!(coordinator.session().monitor().poll().await, DeviceState::Busy);
    assert_eq!(coordinator.status(), DeviceState::Busy);
    assert!(coordinator.snapshot().observed_at.is_some());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_scan_refused_when_busy() {
    let env = TestEnv::new().await;
    let device = FakeDevice::new("1", "2");
    let coordinator = coordinator(&env, &device).await;
    coordinator.session().monitor().poll().await;

    let outcome = coordinator.request_scan(id_scan(5)).await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Refused {
            reason: REFUSED_NOT_READY.to_string()
        }
    );
    assert_eq!(device.applied.load(Ordering::SeqCst), 0);
    assert!(coordinator.session().watcher().pending_target().is_none());
    assert!(env.repository.is_empty());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_accepted_scan_classifies_resulting_file() {
    let env = TestEnv::new().await;
    let device = FakeDevice::new("1", "1");
    let coordinator = coordinator(&env, &device).await;
    coordinator.session().monitor().poll().await;
    let mut events = coordinator.session().watcher().subscribe();

    let outcome = coordinator.request_scan(id_scan(5)).await.unwrap();
    assert!(outcome.is_accepted());
    assert_eq!(device.applied.load(Ordering::SeqCst), 1);

    std::fs::write(env.path("drop").join("scan.pdf"), b"scanned id").unwrap();
    let IngestionEvent::Ingested { document_id, .. } = next_event(&mut events).await else {
        panic!("expected Ingested");
    };
    let document = env.repository.get(document_id).await.unwrap().unwrap();
    assert_eq!(document.origin, Origin::Client { id: 5 });
    assert_eq!(document.document_type, DocumentType::Identification);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_invalid_options_rejected_before_device() {
    let env = TestEnv::new().await;
    let device = FakeDevice::new("1", "1");
    let coordinator = coordinator(&env, &device).await;
    coordinator.session().monitor().poll().await;

    let options = ScanOptions {
        resolution: 20,
        ..id_scan(5)
    };
    assert!(matches!(
        coordinator.request_scan(options).await,
        Err(AppError::Validation(_))
    ));

    let options = ScanOptions {
        format: OutputFormat::Png,
        target: ScanTarget::new(Origin::Client { id: 5 }, DocumentType::Invoice),
        ..Default::default()
    };
    assert!(matches!(
        coordinator.request_scan(options).await,
        Err(AppError::Validation(_))
    ));
    assert_eq!(device.applied.load(Ordering::SeqCst), 0);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_device_rejecting_options_refuses_scan() {
    let env = TestEnv::new().await;
    let device = FakeDevice::new("1", "1");
    device.reject_options(true);
    let coordinator = coordinator(&env, &device).await;
    coordinator.session().monitor().poll().await;

    match coordinator.request_scan(id_scan(5)).await.unwrap() {
        ScanOutcome::Refused { reason } => assert!(reason.contains("unsupported paper size")),
        other => panic!("expected refusal, got {:?}", other),
    }
    assert!(coordinator.session().watcher().pending_target().is_none());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_reconfigure_identical_is_noop() {
    let env = TestEnv::new().await;
    let device = FakeDevice::new("1", "1");
    let coordinator = coordinator(&env, &device).await;
    let before = coordinator.session();

    let config = SessionConfig::new(DeviceEndpoint::new("scanner.local"), env.path("drop"));
    coordinator.reconfigure(config).await.unwrap();

    assert!(Arc::ptr_eq(&before, &coordinator.session()));
    assert!(before.is_active());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_reconfigure_swaps_session() {
    let env = TestEnv::new().await;
    let device = FakeDevice::new("1", "1");
    let coordinator = coordinator(&env, &device).await;
    let before = coordinator.session();

    let config = SessionConfig::new(
        DeviceEndpoint::new("10.0.0.9").with_credentials("svc", "secret"),
        env.path("drop-2"),
    );
    let effective = coordinator.reconfigure(config).await.unwrap();

    assert_eq!(effective.address, "http://10.0.0.9");
    assert!(effective.password_set);
    assert!(!before.is_active());
    assert!(!Arc::ptr_eq(&before, &coordinator.session()));
    assert!(env.path("drop-2").is_dir());

    // The old session no longer watches its folder.
    assert!(!before.watcher().is_running().await);

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_failed_reconfigure_restores_previous_session() {
    let env = TestEnv::new().await;
    let device = FakeDevice::new("1", "1");
    let coordinator = coordinator(&env, &device).await;

    let config = SessionConfig::new(DeviceEndpoint::new(UNREACHABLE_ADDRESS), env.path("drop-3"));
    let result = coordinator.reconfigure(config).await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));

    let session = coordinator.session();
    assert!(session.is_active());
    assert_eq!(session.config().device.address, "scanner.local");
    assert_eq!(session.config().scan_folder, env.path("drop"));

    session.monitor().poll().await;
    assert!(coordinator.request_scan(id_scan(1)).await.unwrap().is_accepted());

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_reconfigure_validates_input() {
    let env = TestEnv::new().await;
    let device = FakeDevice::new("1", "1");
    let coordinator = coordinator(&env, &device).await;
    let before = coordinator.session();

    let config = SessionConfig::new(DeviceEndpoint::new(" "), env.path("drop-4"));
    assert!(matches!(
        coordinator.reconfigure(config).await,
        Err(AppError::Validation(_))
    ));
    assert!(Arc::ptr_eq(&before, &coordinator.session()));
    assert!(before.is_active());

    coordinator.shutdown().await;
}

//! HTTP device transport tests against a mock device.
//!
//! Run with: `cargo test -p scandesk-scanner --test transport_test`

use mockito::Matcher;
use scandesk_core::models::{DeviceEndpoint, DeviceState, ScanOptions};
use scandesk_scanner::{
    DeviceMonitor, DeviceTransport, HttpDeviceTransport, HttpTransportFactory, MonitorConfig,
    TransportError,
};
use std::sync::Arc;
use std::time::Duration;

const STATUS_IDS: &str = "device_status,scanner_status,paper_jam";

fn monitor_config() -> MonitorConfig {
    MonitorConfig {
        timeout: Duration::from_millis(500),
        retry_delay: Duration::from_millis(10),
        poll_interval: Duration::from_secs(60),
    }
}

fn monitor_for(url: &str) -> DeviceMonitor {
    DeviceMonitor::new(
        Arc::new(HttpTransportFactory::new(Duration::from_millis(500))),
        &DeviceEndpoint::new(url),
        monitor_config(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_ready_code_maps_to_ready() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/status")
        .match_query(Matcher::UrlEncoded("ids".into(), STATUS_IDS.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"device_status":"1","scanner_status":"1","paper_jam":"0"}"#)
        .create_async()
        .await;

    let monitor = monitor_for(&server.url());
    assert_eq!(monitor.poll().await, DeviceState::Ready);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_code_maps_to_offline() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/status")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"device_status":"9"}"#)
        .create_async()
        .await;

    let monitor = monitor_for(&server.url());
    assert_eq!(monitor.poll().await, DeviceState::Offline);
    assert!(monitor.snapshot().last_error.is_none());
}

#[tokio::test]
async fn test_server_error_retries_once_then_reports_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/status")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("firmware fault")
        .expect(2)
        .create_async()
        .await;

    let monitor = monitor_for(&server.url());
    assert_eq!(monitor.poll().await, DeviceState::Error);
    let snapshot = monitor.snapshot();
    assert!(snapshot.last_error.unwrap().contains("500"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_credentials_sent_as_basic_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/status")
        .match_query(Matcher::Any)
        .match_header("authorization", "Basic c3ZjOnNlY3JldA==")
        .with_status(200)
        .with_body(r#"{"device_status":1,"scanner_status":2}"#)
        .create_async()
        .await;

    let endpoint = DeviceEndpoint::new(server.url()).with_credentials("svc", "secret");
    let transport = HttpDeviceTransport::new(&endpoint, Duration::from_millis(500)).unwrap();
    let raw = transport
        .query_status(&scandesk_core::models::StatusId::ALL)
        .await
        .unwrap();
    assert_eq!(raw.get("scanner_status").map(String::as_str), Some("2"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_scan_settings_posted() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/scan/settings")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "resolution": 300,
            "color_mode": "color",
            "format": "pdf"
        })))
        .with_status(204)
        .create_async()
        .await;

    let transport =
        HttpDeviceTransport::new(&DeviceEndpoint::new(server.url()), Duration::from_millis(500)).unwrap();
    transport.apply_scan_options(&ScanOptions::default()).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_scan_settings_rejected_by_device() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/scan/settings")
        .with_status(422)
        .with_body("duplex not supported")
        .create_async()
        .await;

    let transport =
        HttpDeviceTransport::new(&DeviceEndpoint::new(server.url()), Duration::from_millis(500)).unwrap();
    let result = transport.apply_scan_options(&ScanOptions::default()).await;
    match result {
        Err(TransportError::Rejected(body)) => assert_eq!(body, "duplex not supported"),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_device_reports_error() {
    // Nothing listens on the discard port.
    let monitor = monitor_for("http://127.0.0.1:9");
    assert_eq!(monitor.poll().await, DeviceState::Error);
    assert!(monitor.snapshot().last_error.is_some());
}

//! Scanner API integration tests against a fake device.
//!
//! Run with: `cargo test -p scandesk-api --test scanner_test`

mod helpers;

use axum::http::StatusCode;
use helpers::{
    api_path, eventually, setup_test_app, setup_test_app_with_device, AsActor, FakeDevice, ADMIN,
    SALES,
};
use scandesk_core::models::{DocumentFilter, OriginKind};

fn identification_scan(client_id: i64) -> serde_json::Value {
    serde_json::json!({
        "options": {
            "resolution": 300,
            "color_mode": "grayscale",
            "target": {
                "origin": {"kind": "client", "id": client_id},
                "document_type": "identification",
                "access_policy": "public",
            },
        }
    })
}

#[tokio::test]
async fn test_status_reports_cached_state() {
    let app = setup_test_app().await;
    app.refresh_device().await;

    let response = app.client().get(&api_path("/scanner/status")).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "READY");
    assert!(body["observed_at"].is_string());

    app.device.set_status("1", "4");
    app.refresh_device().await;
    let body: serde_json::Value = app.client().get(&api_path("/scanner/status")).await.json();
    assert_eq!(body["state"], "PAPER_JAM");

    app.shutdown().await;
}

#[tokio::test]
async fn test_scan_refused_when_busy() {
    let app = setup_test_app_with_device(FakeDevice::new("1", "2")).await;
    app.refresh_device().await;

    let response = app
        .client()
        .post(&api_path("/scanner/scan"))
        .as_actor(SALES)
        .json(&identification_scan(5))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["outcome"], "refused");
    assert_eq!(body["reason"], "device not ready");

    app.shutdown().await;
}

#[tokio::test]
async fn test_accepted_scan_is_ingested_with_target() {
    let app = setup_test_app().await;
    app.refresh_device().await;

    let response = app
        .client()
        .post(&api_path("/scanner/scan"))
        .as_actor(SALES)
        .json(&identification_scan(5))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["outcome"], "accepted");
    assert_eq!(body["device_state"], "READY");
    assert!(body["request_id"].is_string());

    std::fs::write(app.scan_folder().join("scan_0001.pdf"), b"%PDF-1.4 INE").unwrap();

    let admin = scandesk_core::models::Actor::new(ADMIN.0, scandesk_core::models::Role::Admin);
    let filter = DocumentFilter {
        origin: Some(OriginKind::Client),
        id: Some(5),
        ..Default::default()
    };
    let documents = &app.state.documents;
    let (admin, filter) = (&admin, &filter);
    eventually(move || async move {
        documents
            .list(admin, filter)
            .await
            .map(|docs| docs.len() == 1)
            .unwrap_or(false)
    })
    .await;

    let response = app
        .client()
        .get(&api_path("/documents?origin=client&id=5"))
        .as_actor(SALES)
        .await;
    let listed: Vec<serde_json::Value> = response.json();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["document_type"], "identification");
    assert_eq!(listed[0]["state"], "pending");
    assert!(listed[0]["uploaded_by"].is_null());
    assert!(!app.scan_folder().join("scan_0001.pdf").exists());

    app.shutdown().await;
}

#[tokio::test]
async fn test_invalid_scan_options_rejected() {
    let app = setup_test_app().await;
    app.refresh_device().await;

    let mut request = identification_scan(5);
    request["options"]["resolution"] = serde_json::json!(20);
    let response = app
        .client()
        .post(&api_path("/scanner/scan"))
        .as_actor(SALES)
        .json(&request)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let response = app
        .client()
        .post(&api_path("/scanner/scan"))
        .as_actor(SALES)
        .json(&serde_json::json!({"options": {"resolution": "high"}}))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");

    app.shutdown().await;
}

#[tokio::test]
async fn test_configure_requires_elevated_role() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/scanner/configure"))
        .as_actor(SALES)
        .json(&serde_json::json!({
            "address": "10.0.0.9",
            "storage_path": app.path("elsewhere").display().to_string(),
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert!(!app.path("elsewhere").exists());

    app.shutdown().await;
}

#[tokio::test]
async fn test_configure_swaps_session() {
    let app = setup_test_app().await;
    let new_folder = app.path("scans-2");

    let response = app
        .client()
        .post(&api_path("/scanner/configure"))
        .as_actor(ADMIN)
        .json(&serde_json::json!({
            "address": "10.0.0.9",
            "username": "svc",
            "password": "secret",
            "storage_path": new_folder.display().to_string(),
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(!response.text().contains("secret"));
    let body: serde_json::Value = response.json();
    assert_eq!(body["address"], "http://10.0.0.9");
    assert_eq!(body["username"], "svc");
    assert_eq!(body["password_set"], true);
    assert_eq!(body["storage_path"], new_folder.display().to_string());
    assert!(new_folder.is_dir());

    assert_eq!(
        app.state.scanner.session().config().device.address,
        "10.0.0.9"
    );

    app.shutdown().await;
}

#[tokio::test]
async fn test_configure_validates_input() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/scanner/configure"))
        .as_actor(ADMIN)
        .json(&serde_json::json!({"address": " ", "storage_path": ""}))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");

    assert_eq!(
        app.state.scanner.session().config().device.address,
        "scanner.test"
    );

    app.shutdown().await;
}

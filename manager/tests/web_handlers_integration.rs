//! HTTP surface, driven through the router without a socket

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::fixtures::*;
use gam_manager::config::AnnounceAuthConfig;
use gam_manager::rpc::ClientOptions;
use gam_manager::web::{create_router, AppState};
use gam_manager::{AlarmManager, Config, DeviceService, HealthScorer, RuntimeSettings, SettingsStore, SyncEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router_with(db: &TestDatabase, announce: AnnounceAuthConfig) -> Router {
    let database = db.database();
    let options = ClientOptions::with_timeout_secs(2);
    let engine = Arc::new(SyncEngine::new(database.clone(), options.clone()));
    let config = Config {
        announce,
        ..Default::default()
    };
    let state = AppState::new(
        Arc::new(config),
        database.clone(),
        SettingsStore::new(database.clone(), RuntimeSettings::default()),
        AlarmManager::new(database.clone()),
        Arc::new(HealthScorer::new(database.clone())),
        Arc::new(DeviceService::new(database, engine, options)),
    );
    create_router(state)
}

fn router(db: &TestDatabase) -> Router {
    router_with(db, AnnounceAuthConfig::default())
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    send_request(router, request).await
}

async fn send_request(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn raw_announce(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::PUT)
        .uri("/api/devices/announce")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_announce_replies_without_envelope() {
    let db = TestDatabase::new().await.unwrap();
    let router = router(&db);

    let (status, body) = send(&router, Method::PUT, "/api/devices/announce", Some(announcement("SN1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "serial_number": "SN1" }));
    assert!(db.database().get_device_by_serial("SN1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_announce_rejects_bad_payloads() {
    let db = TestDatabase::new().await.unwrap();
    let router = router(&db);

    let (status, body) = send_request(&router, raw_announce("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, _) = send(&router, Method::PUT, "/api/devices/announce", Some(json!({ "Model": "GAM" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&router, Method::PUT, "/api/devices/announce", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(db.count_rows("devices").await.unwrap(), 0);
}

#[tokio::test]
async fn test_announce_auth() {
    let db = TestDatabase::new().await.unwrap();
    let router = router_with(
        &db,
        AnnounceAuthConfig {
            auth_required: true,
            username: Some("fleet".to_string()),
            password: Some("announce-pw".to_string()),
        },
    );

    let (status, _) = send(&router, Method::PUT, "/api/devices/announce", Some(announcement("SN1"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let with_auth = |credentials: &str| {
        Request::builder()
            .method(Method::PUT)
            .uri("/api/devices/announce")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Basic {}", STANDARD.encode(credentials)))
            .body(Body::from(announcement("SN1").to_string()))
            .unwrap()
    };

    let (status, _) = send_request(&router, with_auth("fleet:wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send_request(&router, with_auth("fleet:announce-pw")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_device_listing_uses_envelope() {
    let db = TestDatabase::new().await.unwrap();
    let router = router(&db);
    send(&router, Method::PUT, "/api/devices/announce", Some(announcement("SN1"))).await;

    let (status, body) = send(&router, Method::GET, "/api/devices", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["serial_number"], "SN1");
    // Credentials never leave the controller
    assert!(body["data"][0].get("announced_password").is_none());

    let (status, body) = send(&router, Method::GET, "/api/devices/SN1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["device"]["serial_number"], "SN1");
    assert!(body["data"]["endpoints"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_device_is_404() {
    let db = TestDatabase::new().await.unwrap();
    let router = router(&db);

    for uri in ["/api/devices/NOPE", "/api/devices/NOPE/health", "/api/devices/NOPE/alarms"] {
        let (status, body) = send(&router, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["success"], false);
    }

    let (status, _) = send(&router, Method::POST, "/api/devices/NOPE/sync", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manual_alarm_lifecycle_over_http() {
    let db = TestDatabase::new().await.unwrap();
    let router = router(&db);
    send(&router, Method::PUT, "/api/devices/announce", Some(announcement("SN1"))).await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/devices/SN1/alarms",
        Some(json!({ "gam_id": "OPS-1", "severity": "major", "details": "cabinet door open" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let alarm_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["severity"], "MJ");
    assert_eq!(body["data"]["is_manual"], true);

    let (status, _) = send(&router, Method::POST, "/api/devices/SN1/alarms", Some(json!({ "gam_id": "OPS-1" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &router,
        Method::POST,
        &format!("/api/alarms/{}/acknowledge", alarm_id),
        Some(json!({ "by": "noc" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["acknowledged_by"], "noc");
    assert!(body["data"]["closing_date"].is_string());
    let acknowledged_close = body["data"]["closing_date"].clone();

    // Closing after acknowledgement keeps the acknowledgement's closing date
    let (status, body) = send(&router, Method::POST, &format!("/api/alarms/{}/close", alarm_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["closing_date"], acknowledged_close);

    let (_, body) = send(&router, Method::GET, "/api/devices/SN1/alarms?open_only=true", None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = send(&router, Method::POST, "/api/alarms/9999/close", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_settings_update_is_validated_and_audited() {
    let db = TestDatabase::new().await.unwrap();
    let router = router(&db);

    let (status, _) = send(
        &router,
        Method::PUT,
        "/api/settings",
        Some(json!({ "settings": { "no_such_key": "5" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &router,
        Method::PUT,
        "/api/settings",
        Some(json!({ "settings": { "polling_interval_seconds": "-5" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &router,
        Method::PUT,
        "/api/settings",
        Some(json!({ "settings": { "alarm_retention_days": "100000000" } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("36500"));

    let (status, _) = send(
        &router,
        Method::PUT,
        "/api/settings",
        Some(json!({ "settings": { "alarm_retention_days": "36500" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &router,
        Method::PUT,
        "/api/settings",
        Some(json!({ "settings": { "polling_interval_seconds": "45" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&router, Method::GET, "/api/settings", None).await;
    assert_eq!(body["data"]["polling_interval_seconds"], 45);

    let (_, body) = send(&router, Method::GET, "/api/audit", None).await;
    assert_eq!(body["data"][0]["action"], "update_settings");
}

#[tokio::test]
async fn test_read_only_device_operation_is_conflict() {
    let db = TestDatabase::new().await.unwrap();
    let router = router(&db);
    send(&router, Method::PUT, "/api/devices/announce", Some(announcement("SN1"))).await;
    let device = db.database().get_device_by_serial("SN1").await.unwrap().unwrap();
    db.database().set_device_read_only(device.id, true).await.unwrap();

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/devices/SN1/firmware",
        Some(json!({ "url": "http://files/gam.bin", "activate": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&router, Method::GET, "/api/devices/SN1/signal?port=bogus", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_device_overrides_and_delete() {
    let db = TestDatabase::new().await.unwrap();
    let router = router(&db);
    send(&router, Method::PUT, "/api/devices/announce", Some(announcement("SN1"))).await;

    let (status, _) = send(&router, Method::PATCH, "/api/devices/SN1", Some(json!({ "scheme": "ftp" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &router,
        Method::PATCH,
        "/api/devices/SN1",
        Some(json!({
            "read_only": true,
            "rpc_username": "ops",
            "rpc_password": "ops-pw",
            "port": 8443,
            "credentials": { "1": { "username": "view", "password": "v" } }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["read_only"], true);
    assert_eq!(body["data"]["port"], 8443);
    assert_eq!(body["data"]["ip_address"], "10.10.0.5");
    assert!(body["data"].get("rpc_password").is_none());

    let stored = db.database().get_device_by_serial("SN1").await.unwrap().unwrap();
    assert_eq!(stored.rpc_username.as_deref(), Some("ops"));
    assert_eq!(stored.credentials.get(1).unwrap().username, "view");

    let (_, body) = send(&router, Method::GET, "/api/audit", None).await;
    assert_eq!(body["data"][0]["action"], "update_device");
    assert!(!body["data"][0]["details"].as_str().unwrap().contains("ops-pw"));

    let (status, _) = send(&router, Method::DELETE, "/api/devices/SN1", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&router, Method::GET, "/api/devices/SN1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

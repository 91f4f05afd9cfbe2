//! Whole-device sync against a mock device

mod common;

use common::fixtures::*;
use gam_manager::database::SyncKind;
use gam_manager::errors::DeviceSyncError;
use gam_manager::rpc::ClientOptions;
use gam_manager::sync::SyncEngine;
use serde_json::json;

fn engine(db: &TestDatabase) -> SyncEngine {
    SyncEngine::new(db.database(), ClientOptions::with_timeout_secs(2))
}

async fn serve_default_inventory(device: &MockDevice) {
    device
        .serve_inventory(
            json!([
                endpoint("AA:BB:CC:00:00:01", Some(1), "G.hn 1/1"),
                endpoint("aa-bb-cc-00-00-02", None, "G.hn 1/2")
            ]),
            json!([bandwidth("100M", 100_000, 20_000), bandwidth("1G", 1_000_000, 200_000)]),
            json!([subscriber(5, "flat-1", "aa:bb:cc:00:00:01", "100M")]),
            json!([port("G.hn 1/1", "up"), port("G.hn 1/2", "down")]),
        )
        .await;
}

#[tokio::test]
async fn test_full_sync_populates_inventory() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    serve_default_inventory(&device).await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();

    let report = engine(&db).sync_device(device_id).await.unwrap();
    assert!(report.online);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.uptime, Some(90_000));

    let database = db.database();
    let endpoints = database.list_endpoints(device_id).await.unwrap();
    assert_eq!(endpoints.len(), 2);
    assert!(endpoints.iter().any(|e| e.mac_address == "aa:bb:cc:00:00:02"));

    let subscribers = database.list_subscribers(device_id).await.unwrap();
    assert_eq!(subscribers.len(), 1);
    let flat = &subscribers[0];
    assert_eq!(flat.vlan_display.as_deref(), Some("100"));
    assert!(flat.endpoint_id.is_some());
    assert!(flat.bandwidth_id.is_some());

    assert_eq!(database.list_ports(device_id).await.unwrap().len(), 2);

    let stored = database.get_device(device_id).await.unwrap().unwrap();
    assert!(stored.is_online);
    assert_eq!(stored.uptime, Some(90_000));
    assert!(stored.last_endpoint_sync.is_some());
    assert!(stored.last_port_sync.is_some());

    // One attempt per pass
    let attempts = database.recent_sync_attempts(device_id, 10).await.unwrap();
    assert_eq!(attempts.len(), 4);
    assert!(attempts.iter().all(|a| a.success));
}

#[tokio::test]
async fn test_passes_run_in_order() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    serve_default_inventory(&device).await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();

    engine(&db).sync_device(device_id).await.unwrap();

    assert_eq!(
        device.received_methods().await,
        vec![
            "endpoint.brief.get",
            "bandwidth.get",
            "subscriber.get",
            "port.status.get",
            "system.uptime.get"
        ]
    );
}

#[tokio::test]
async fn test_missing_bandwidth_is_soft_deleted() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();
    let engine = engine(&db);

    device
        .serve_inventory(
            json!([]),
            json!([bandwidth("A", 10, 1), bandwidth("B", 20, 2), bandwidth("C", 30, 3)]),
            json!([]),
            json!([]),
        )
        .await;
    engine.sync_device(device_id).await.unwrap();

    device.reset().await;
    device
        .serve_inventory(
            json!([]),
            json!([bandwidth("A", 10, 1), bandwidth("B", 25, 2)]),
            json!([]),
            json!([]),
        )
        .await;
    let report = engine.sync_device(device_id).await.unwrap();
    assert_eq!(report.pass(SyncKind::Bandwidths).unwrap().stats.unwrap().absent, 1);

    let profiles = db.database().list_bandwidths(device_id).await.unwrap();
    let by_name = |name: &str| profiles.iter().find(|p| p.name == name).unwrap();
    assert!(by_name("C").deleted);
    assert!(!by_name("A").deleted && by_name("A").sync);
    assert!(!by_name("B").deleted && by_name("B").sync);
    assert_eq!(by_name("B").downstream, Some(25));

    // A profile that reappears is revived in place
    device.reset().await;
    device
        .serve_inventory(
            json!([]),
            json!([bandwidth("A", 10, 1), bandwidth("B", 25, 2), bandwidth("C", 30, 3)]),
            json!([]),
            json!([]),
        )
        .await;
    engine.sync_device(device_id).await.unwrap();
    let profiles = db.database().list_bandwidths(device_id).await.unwrap();
    assert_eq!(profiles.len(), 3);
    assert!(profiles.iter().all(|p| !p.deleted));
}

#[tokio::test]
async fn test_missing_endpoints_and_subscribers_go_not_alive() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    serve_default_inventory(&device).await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();
    let engine = engine(&db);
    engine.sync_device(device_id).await.unwrap();

    device.reset().await;
    device
        .serve_inventory(
            json!([endpoint("aa:bb:cc:00:00:02", None, "G.hn 1/2")]),
            json!([bandwidth("100M", 100_000, 20_000), bandwidth("1G", 1_000_000, 200_000)]),
            json!([]),
            json!([port("G.hn 1/1", "down")]),
        )
        .await;
    engine.sync_device(device_id).await.unwrap();

    let database = db.database();
    let endpoints = database.list_endpoints(device_id).await.unwrap();
    assert_eq!(endpoints.len(), 2);
    let gone = endpoints.iter().find(|e| e.mac_address == "aa:bb:cc:00:00:01").unwrap();
    assert!(!gone.alive);

    let subscribers = database.list_subscribers(device_id).await.unwrap();
    assert_eq!(subscribers.len(), 1);
    assert!(!subscribers[0].alive);

    // Ports retain their last known rows
    let ports = database.list_ports(device_id).await.unwrap();
    assert_eq!(ports.len(), 2);
}

#[tokio::test]
async fn test_all_passes_failing_marks_device_offline_and_cascades() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    serve_default_inventory(&device).await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();
    let engine = engine(&db);
    engine.sync_device(device_id).await.unwrap();

    device.reset().await;
    device.fail_everything().await;
    let report = engine.sync_device(device_id).await.unwrap();

    assert!(!report.online);
    assert_eq!(report.succeeded(), 0);
    assert_eq!(report.uptime, None);

    let database = db.database();
    let stored = database.get_device(device_id).await.unwrap().unwrap();
    assert!(!stored.is_online);
    assert!(database.list_endpoints(device_id).await.unwrap().iter().all(|e| !e.alive));
    assert!(database.list_subscribers(device_id).await.unwrap().iter().all(|s| !s.alive));

    let attempts = database.recent_sync_attempts(device_id, 4).await.unwrap();
    assert!(attempts.iter().all(|a| !a.success && a.error.is_some()));
}

#[tokio::test]
async fn test_partial_failure_keeps_device_online_without_cascade() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    serve_default_inventory(&device).await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();
    let engine = engine(&db);
    engine.sync_device(device_id).await.unwrap();

    device.reset().await;
    device.respond_status("endpoint.brief.get", 502).await;
    device.respond_rpc_error("subscriber.get", -32000, "busy").await;
    device.respond("bandwidth.get", json!([bandwidth("100M", 1, 1)])).await;
    device.respond("port.status.get", json!([port("G.hn 1/1", "up")])).await;
    device.respond("system.uptime.get", json!({ "uptime": 12 })).await;

    let report = engine.sync_device(device_id).await.unwrap();
    assert!(report.online);
    assert!(!report.pass(SyncKind::Endpoints).unwrap().success);
    assert!(!report.pass(SyncKind::Subscribers).unwrap().success);
    assert!(report.pass(SyncKind::Bandwidths).unwrap().success);

    let database = db.database();
    assert!(database.get_device(device_id).await.unwrap().unwrap().is_online);
    // Failed passes leave their entities untouched
    assert!(database.list_endpoints(device_id).await.unwrap().iter().all(|e| e.alive));
    assert!(database.list_subscribers(device_id).await.unwrap().iter().all(|s| s.alive));
}

#[tokio::test]
async fn test_unmappable_payload_fails_only_that_pass() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    device
        .serve_inventory(
            json!("not a list"),
            json!([bandwidth("100M", 1, 1)]),
            json!([{ "port1": "G.hn 1/1" }]),
            json!([]),
        )
        .await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();

    let report = engine(&db).sync_device(device_id).await.unwrap();
    let endpoints = report.pass(SyncKind::Endpoints).unwrap();
    assert!(!endpoints.success);
    assert!(endpoints.error.as_deref().unwrap().contains("endpoints"));
    assert!(!report.pass(SyncKind::Subscribers).unwrap().success);
    assert!(report.online);

    let stored = db.database().get_device(device_id).await.unwrap().unwrap();
    assert!(stored.last_endpoint_sync.is_none());
    assert!(stored.last_bandwidth_sync.is_some());
}

#[tokio::test]
async fn test_endpoint_moves_between_devices() {
    let db = TestDatabase::new().await.unwrap();
    let first = MockDevice::start().await;
    let second = MockDevice::start().await;
    let first_id = register_device(&db.database(), "SN1", &first).await.unwrap();
    let second_id = register_device(&db.database(), "SN2", &second).await.unwrap();

    first
        .serve_inventory(json!([endpoint("aa:bb:cc:00:00:09", Some(3), "G.hn 1/3")]), json!([]), json!([]), json!([]))
        .await;
    second
        .serve_inventory(json!([endpoint("AA:BB:CC:00:00:09", None, "G.hn 1/7")]), json!([]), json!([]), json!([]))
        .await;

    let engine = engine(&db);
    engine.sync_device(first_id).await.unwrap();
    engine.sync_device(second_id).await.unwrap();

    let database = db.database();
    assert!(database.list_endpoints(first_id).await.unwrap().is_empty());
    let moved = database.get_endpoint_by_mac("aa:bb:cc:00:00:09").await.unwrap().unwrap();
    assert_eq!(moved.device_id, second_id);
    assert_eq!(moved.conf_endpoint_id, None);
    assert_eq!(moved.conf_port, None);
}

#[tokio::test]
async fn test_device_without_credentials_cannot_sync() {
    let db = TestDatabase::new().await.unwrap();
    let device_id = register_bare_device(&db.database(), "SN9").await.unwrap();

    let err = engine(&db).sync_device(device_id).await.unwrap_err();
    assert!(matches!(err, DeviceSyncError::Client(_)));

    let err = engine(&db).sync_device(4242).await.unwrap_err();
    assert!(matches!(err, DeviceSyncError::NotFound(4242)));
}

//! Health scoring from stored sync attempts and alarms

mod common;

use chrono::{Duration, Utc};
use common::fixtures::*;
use gam_manager::alarms::{AlarmManager, ManualAlarm};
use gam_manager::database::{SyncAttemptRecord, SyncKind};
use gam_manager::health::{HealthScorer, HealthStatus};
use serde_json::json;

async fn record_attempt(db: &TestDatabase, device_id: i64, success: bool, duration_ms: i64, hours_ago: i64) {
    db.database()
        .store_sync_attempt(&SyncAttemptRecord {
            device_id,
            kind: SyncKind::Endpoints,
            success,
            duration_ms,
            error: (!success).then(|| "timeout".to_string()),
            attempted_at: Utc::now() - Duration::hours(hours_ago),
        })
        .await
        .unwrap();
}

fn manual_alarm() -> ManualAlarm {
    serde_json::from_value(json!({ "condition_type": "TEST" })).unwrap()
}

#[tokio::test]
async fn test_device_without_history_scores_full() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();

    let health = HealthScorer::new(db.database()).evaluate(device_id).await.unwrap().unwrap();
    assert_eq!(health.breakdown.score, 100.0);
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.inputs.total_attempts, 0);

    let stored = db.database().get_device(device_id).await.unwrap().unwrap();
    assert_eq!(stored.health_score, Some(100.0));
    assert_eq!(stored.health_status.as_deref(), Some("healthy"));
}

#[tokio::test]
async fn test_failures_and_alarms_lower_the_score() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();

    record_attempt(&db, device_id, true, 100, 1).await;
    record_attempt(&db, device_id, true, 100, 2).await;
    record_attempt(&db, device_id, false, 9_000, 3).await;
    record_attempt(&db, device_id, false, 9_000, 4).await;
    // Outside the window
    record_attempt(&db, device_id, false, 9_000, 48).await;

    let alarms = AlarmManager::new(db.database());
    alarms.raise_manual(device_id, manual_alarm()).await.unwrap();
    alarms.raise_manual(device_id, manual_alarm()).await.unwrap();

    let health = HealthScorer::new(db.database()).evaluate(device_id).await.unwrap().unwrap();
    assert_eq!(health.inputs.total_attempts, 4);
    assert_eq!(health.inputs.successful_attempts, 2);
    assert_eq!(health.inputs.avg_response_ms, Some(100.0));
    assert_eq!(health.inputs.open_alarms, 2);
    // 40*0.5 + 0.25*100 + 0.20*80 + 0.15*100
    assert_eq!(health.breakdown.score, 76.0);
    assert_eq!(health.status, HealthStatus::Degraded);
}

#[tokio::test]
async fn test_offline_device_is_offline_whatever_its_score() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();
    db.database().set_device_offline(device_id).await.unwrap();

    let health = HealthScorer::new(db.database()).evaluate(device_id).await.unwrap().unwrap();
    assert_eq!(health.breakdown.score, 100.0);
    assert_eq!(health.status, HealthStatus::Offline);
}

#[tokio::test]
async fn test_unknown_device_has_no_health() {
    let db = TestDatabase::new().await.unwrap();
    assert!(HealthScorer::new(db.database()).evaluate(77).await.unwrap().is_none());
}

#[tokio::test]
async fn test_snapshot_appends_history_for_every_device() {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    let first = register_device(&db.database(), "SN1", &device).await.unwrap();
    register_device(&db.database(), "SN2", &device).await.unwrap();

    let scorer = HealthScorer::new(db.database());
    assert_eq!(scorer.snapshot_all().await.unwrap(), 2);
    assert_eq!(scorer.snapshot_all().await.unwrap(), 2);

    assert_eq!(db.count_rows("device_health_history").await.unwrap(), 4);
    let history = db.database().health_history(first, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.status == "healthy"));
}

//! Alarm reconciliation and manual alarm lifecycle

mod common;

use common::fixtures::*;
use gam_manager::alarms::{AlarmManager, ManualAlarm};
use gam_manager::database::Severity;
use gam_manager::errors::AlarmError;
use serde_json::json;
use std::collections::BTreeSet;

async fn setup() -> (TestDatabase, AlarmManager, i64) {
    let db = TestDatabase::new().await.unwrap();
    let device = MockDevice::start().await;
    let device_id = register_device(&db.database(), "SN1", &device).await.unwrap();
    let alarms = AlarmManager::new(db.database());
    (db, alarms, device_id)
}

async fn open_ids(alarms: &AlarmManager, device_id: i64) -> BTreeSet<String> {
    alarms
        .open_alarms(device_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.gam_id)
        .collect()
}

fn manual(gam_id: &str) -> ManualAlarm {
    ManualAlarm {
        gam_id: Some(gam_id.to_string()),
        condition_type: Some("MAINT".to_string()),
        interface: None,
        severity: None,
        service_affecting: false,
        details: Some("planned work".to_string()),
    }
}

#[tokio::test]
async fn test_open_set_matches_latest_snapshot() {
    let (_db, alarms, device_id) = setup().await;

    alarms
        .reconcile(
            device_id,
            &[los_alarm("G.hn 1/1", "MJ"), los_alarm("G.hn 1/2", "MN")],
        )
        .await
        .unwrap();
    let summary = alarms
        .reconcile(
            device_id,
            &[los_alarm("G.hn 1/2", "CR"), json!({ "id": "TEMP-1", "severity": "MN" })],
        )
        .await
        .unwrap();

    assert_eq!(summary.opened, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.closed, 1);

    let expected: BTreeSet<String> = ["LOS_G.hn 1/2_SN1", "TEMP-1"].iter().map(|s| s.to_string()).collect();
    assert_eq!(open_ids(&alarms, device_id).await, expected);

    // The surviving alarm took the new severity
    let open = alarms.open_alarms(device_id).await.unwrap();
    let los = open.iter().find(|a| a.gam_id == "LOS_G.hn 1/2_SN1").unwrap();
    assert_eq!(los.severity, Severity::Critical);
}

#[tokio::test]
async fn test_reconciliation_is_idempotent() {
    let (db, alarms, device_id) = setup().await;
    let snapshot = vec![los_alarm("G.hn 1/1", "MJ"), los_alarm("G.hn 1/3", "MJ")];

    alarms.reconcile(device_id, &snapshot).await.unwrap();
    let before = db.database().list_alarms(device_id).await.unwrap();

    let summary = alarms.reconcile(device_id, &snapshot).await.unwrap();
    assert_eq!(summary.opened, 0);
    assert_eq!(summary.closed, 0);

    let after = db.database().list_alarms(device_id).await.unwrap();
    assert_eq!(before.len(), after.len());
    let before_ids: Vec<i64> = before.iter().map(|a| a.id).collect();
    let after_ids: Vec<i64> = after.iter().map(|a| a.id).collect();
    assert_eq!(before_ids, after_ids);
}

#[tokio::test]
async fn test_empty_snapshot_closes_everything_but_manual() {
    let (_db, alarms, device_id) = setup().await;

    alarms.reconcile(device_id, &[los_alarm("G.hn 1/1", "MJ")]).await.unwrap();
    alarms.raise_manual(device_id, manual("HOLD-1")).await.unwrap();

    let summary = alarms.reconcile(device_id, &[]).await.unwrap();
    assert_eq!(summary.closed, 1);

    let expected: BTreeSet<String> = ["HOLD-1".to_string()].into_iter().collect();
    assert_eq!(open_ids(&alarms, device_id).await, expected);
}

#[tokio::test]
async fn test_duplicate_ids_keep_last_occurrence() {
    let (_db, alarms, device_id) = setup().await;

    let summary = alarms
        .reconcile(
            device_id,
            &[los_alarm("G.hn 1/1", "MN"), los_alarm("G.hn 1/1", "CR")],
        )
        .await
        .unwrap();
    assert_eq!(summary.opened, 1);

    let open = alarms.open_alarms(device_id).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].severity, Severity::Critical);
}

#[tokio::test]
async fn test_unusable_entries_are_skipped() {
    let (_db, alarms, device_id) = setup().await;

    let summary = alarms
        .reconcile(device_id, &[json!({ "severity": "MJ" }), json!("LOS"), los_alarm("G.hn 1/4", "MJ")])
        .await
        .unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.opened, 1);
}

#[tokio::test]
async fn test_manual_alarm_defaults_and_duplicates() {
    let (_db, alarms, device_id) = setup().await;

    let generated = alarms
        .raise_manual(
            device_id,
            ManualAlarm {
                gam_id: None,
                condition_type: None,
                interface: None,
                severity: None,
                service_affecting: false,
                details: None,
            },
        )
        .await
        .unwrap();
    assert!(generated.gam_id.starts_with("MANUAL_"));
    assert_eq!(generated.severity, Severity::Minor);
    assert!(generated.is_manual);

    alarms.raise_manual(device_id, manual("HOLD-2")).await.unwrap();
    let err = alarms.raise_manual(device_id, manual("HOLD-2")).await.unwrap_err();
    assert!(matches!(err, AlarmError::AlreadyOpen { .. }));
}

#[tokio::test]
async fn test_close_and_acknowledge() {
    let (db, alarms, device_id) = setup().await;
    let alarm = alarms.raise_manual(device_id, manual("HOLD-3")).await.unwrap();

    let closed = alarms.close(alarm.id).await.unwrap();
    assert!(!closed.is_open());
    let first_close = closed.closing_date;

    // Closing again keeps the first closing date
    let again = alarms.close(alarm.id).await.unwrap();
    assert_eq!(again.closing_date, first_close);

    // Acknowledging a closed alarm records the operator only
    let acked = alarms.acknowledge(alarm.id, "noc-operator").await.unwrap();
    assert_eq!(acked.acknowledged_by.as_deref(), Some("noc-operator"));
    assert_eq!(acked.closing_date, first_close);

    // Acknowledging an open alarm closes it
    let open = alarms.raise_manual(device_id, manual("HOLD-4")).await.unwrap();
    let acked = alarms.acknowledge(open.id, "noc-operator").await.unwrap();
    assert!(acked.acknowledged_at.is_some());
    assert!(!acked.is_open());
    assert_eq!(acked.closing_date, acked.acknowledged_at);
    assert!(db
        .database()
        .find_open_alarm(device_id, "HOLD-4")
        .await
        .unwrap()
        .is_none());

    // A second acknowledgement keeps the first operator
    let again = alarms.acknowledge(open.id, "someone-else").await.unwrap();
    assert_eq!(again.acknowledged_by.as_deref(), Some("noc-operator"));

    assert!(matches!(alarms.close(9999).await.unwrap_err(), AlarmError::NotFound(9999)));
}

#[tokio::test]
async fn test_offline_alarm_is_not_duplicated() {
    let (db, alarms, device_id) = setup().await;

    assert!(alarms.raise_offline(device_id, "SN1").await.unwrap());
    assert!(!alarms.raise_offline(device_id, "SN1").await.unwrap());
    assert_eq!(db.database().count_open_alarms(device_id).await.unwrap(), 1);

    assert!(alarms.clear_offline(device_id, "SN1").await.unwrap());
    assert!(!alarms.clear_offline(device_id, "SN1").await.unwrap());

    // A fresh episode opens a new alarm
    assert!(alarms.raise_offline(device_id, "SN1").await.unwrap());
    assert_eq!(db.database().list_alarms(device_id).await.unwrap().len(), 2);
}

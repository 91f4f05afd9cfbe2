//! Alarm lifecycle management.
//!
//! Devices report their complete set of active alarms. Reconciling that
//! snapshot against storage opens, refreshes and closes alarms so that the
//! open non-manual alarms of a device always equal the latest snapshot.
//! Manual alarms are never touched by reconciliation.

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::announce::FieldLookup;
use crate::constants::scheduler::OFFLINE_ALARM_PREFIX;
use crate::database::{
    close_alarm_in, find_open_alarm_in, get_device_in, insert_alarm, list_open_alarms_in,
    refresh_open_alarm, AlarmRecord, Database, NewAlarm, Severity,
};
use crate::errors::AlarmError;

const ID_FIELDS: &[&str] = &["id", "gamId", "alarmId"];
const CONDITION_FIELDS: &[&str] = &["condType", "conditionType", "condition"];
const INTERFACE_FIELDS: &[&str] = &["ifDescr", "interface", "port"];
const SEVERITY_FIELDS: &[&str] = &["severity", "sev"];
const SERVICE_AFFECTING_FIELDS: &[&str] = &["serviceAffecting", "sa", "serviceAffect"];
const DETAILS_FIELDS: &[&str] = &["details", "description", "condDescr"];

/// One alarm from a device snapshot after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedAlarm {
    pub gam_id: String,
    pub condition_type: Option<String>,
    pub interface: Option<String>,
    pub severity: Severity,
    pub service_affecting: bool,
    pub details: Option<String>,
}

impl ReportedAlarm {
    /// Parse one snapshot entry. The id is the supplied one, else
    /// `{condType}_{ifDescr}_{serial}`; entries with neither an id nor a
    /// condition type are unusable.
    pub fn parse(value: &Value, serial_number: &str) -> Option<Self> {
        let object = value.as_object()?;
        let fields = FieldLookup::new(object);

        let condition_type = fields.string(CONDITION_FIELDS);
        let interface = fields.string(INTERFACE_FIELDS);

        let gam_id = match fields.string(ID_FIELDS) {
            Some(id) => id,
            None => format!(
                "{}_{}_{}",
                condition_type.as_deref()?,
                interface.as_deref().unwrap_or_default(),
                serial_number
            ),
        };

        Some(Self {
            gam_id,
            condition_type,
            interface,
            severity: fields
                .string(SEVERITY_FIELDS)
                .map(|s| Severity::parse_lenient(&s))
                .unwrap_or(Severity::NotAlarmed),
            service_affecting: fields.boolean(SERVICE_AFFECTING_FIELDS).unwrap_or(false),
            details: fields.string(DETAILS_FIELDS),
        })
    }
}

/// What one reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlarmReconcileSummary {
    pub opened: usize,
    pub updated: usize,
    pub closed: usize,
    pub skipped: usize,
}

/// Operator-raised alarm
#[derive(Debug, Clone, Deserialize)]
pub struct ManualAlarm {
    #[serde(default)]
    pub gam_id: Option<String>,
    #[serde(default)]
    pub condition_type: Option<String>,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub service_affecting: bool,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Clone)]
pub struct AlarmManager {
    database: Arc<Database>,
}

impl AlarmManager {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Reconcile a device's complete active-alarm snapshot in one
    /// transaction. An empty snapshot closes every open non-manual alarm.
    #[instrument(skip(self, snapshot), fields(alarms = snapshot.len()))]
    pub async fn reconcile(&self, device_id: i64, snapshot: &[Value]) -> Result<AlarmReconcileSummary> {
        let now = Utc::now();
        let mut tx = self.database.begin().await?;

        let device = get_device_in(&mut tx, device_id)
            .await?
            .ok_or_else(|| anyhow!("device {} not found", device_id))?;

        let mut summary = AlarmReconcileSummary::default();

        // Last occurrence of a duplicated id wins
        let mut reported: Vec<ReportedAlarm> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for raw in snapshot {
            match ReportedAlarm::parse(raw, &device.serial_number) {
                Some(alarm) => match positions.get(&alarm.gam_id) {
                    Some(&index) => reported[index] = alarm,
                    None => {
                        positions.insert(alarm.gam_id.clone(), reported.len());
                        reported.push(alarm);
                    }
                },
                None => {
                    warn!("Skipping unusable alarm entry from {}: {}", device.serial_number, raw);
                    summary.skipped += 1;
                }
            }
        }

        let open = list_open_alarms_in(&mut tx, device_id).await?;
        let open_by_id: HashMap<&str, &AlarmRecord> =
            open.iter().map(|a| (a.gam_id.as_str(), a)).collect();

        for alarm in &reported {
            match open_by_id.get(alarm.gam_id.as_str()) {
                Some(existing) if existing.is_manual => {
                    debug!("Alarm {} is held open manually, leaving it", alarm.gam_id);
                }
                Some(existing) => {
                    refresh_open_alarm(
                        &mut tx,
                        existing.id,
                        alarm.severity,
                        alarm.service_affecting,
                        alarm.details.as_deref(),
                    )
                    .await?;
                    summary.updated += 1;
                }
                None => {
                    let new_alarm = NewAlarm {
                        device_id,
                        gam_id: alarm.gam_id.clone(),
                        condition_type: alarm.condition_type.clone(),
                        interface: alarm.interface.clone(),
                        severity: alarm.severity,
                        service_affecting: alarm.service_affecting,
                        details: alarm.details.clone(),
                        is_manual: false,
                    };
                    insert_alarm(&mut tx, &new_alarm, now).await?;
                    summary.opened += 1;
                }
            }
        }

        for existing in open.iter().filter(|a| !a.is_manual) {
            if !positions.contains_key(&existing.gam_id) && close_alarm_in(&mut tx, existing.id, now).await? {
                summary.closed += 1;
            }
        }

        tx.commit().await?;

        if summary.opened + summary.closed > 0 {
            info!(
                "Alarms for {}: {} opened, {} updated, {} closed",
                device.serial_number, summary.opened, summary.updated, summary.closed
            );
        }
        Ok(summary)
    }

    pub async fn open_alarms(&self, device_id: i64) -> Result<Vec<AlarmRecord>> {
        self.database.list_open_alarms(device_id).await
    }

    pub async fn raise_manual(&self, device_id: i64, request: ManualAlarm) -> Result<AlarmRecord, AlarmError> {
        let gam_id = request
            .gam_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("MANUAL_{}", Uuid::new_v4().simple()));

        let alarm = NewAlarm {
            device_id,
            gam_id: gam_id.clone(),
            condition_type: request.condition_type,
            interface: request.interface,
            severity: request
                .severity
                .as_deref()
                .map(Severity::parse_lenient)
                .unwrap_or(Severity::Minor),
            service_affecting: request.service_affecting,
            details: request.details,
            is_manual: true,
        };

        let alarm_id = {
            let mut tx = self.database.begin().await?;
            if find_open_alarm_in(&mut tx, device_id, &gam_id).await?.is_some() {
                return Err(AlarmError::AlreadyOpen { gam_id });
            }
            let id = insert_alarm(&mut tx, &alarm, Utc::now()).await?;
            tx.commit().await.map_err(anyhow::Error::from)?;
            id
        };

        info!("Manual alarm {} raised on device {}", gam_id, device_id);
        self.get(alarm_id).await
    }

    /// Close an alarm by id; closing a closed alarm is a no-op.
    pub async fn close(&self, alarm_id: i64) -> Result<AlarmRecord, AlarmError> {
        if self.database.close_alarm(alarm_id, Utc::now()).await? {
            info!("Alarm {} closed", alarm_id);
        }
        self.get(alarm_id).await
    }

    /// Acknowledge and close an alarm. A second acknowledgement keeps the
    /// first operator and timestamps.
    pub async fn acknowledge(&self, alarm_id: i64, by: &str) -> Result<AlarmRecord, AlarmError> {
        if self.database.acknowledge_alarm(alarm_id, by, Utc::now()).await? {
            info!("Alarm {} acknowledged and closed by {}", alarm_id, by);
        }
        self.get(alarm_id).await
    }

    /// Open the synthetic offline alarm unless one is already open.
    pub async fn raise_offline(&self, device_id: i64, serial_number: &str) -> Result<bool> {
        let gam_id = offline_alarm_id(serial_number);
        let mut tx = self.database.begin().await?;

        if find_open_alarm_in(&mut tx, device_id, &gam_id).await?.is_some() {
            return Ok(false);
        }

        let alarm = NewAlarm {
            device_id,
            gam_id,
            condition_type: Some("OFFLINE".to_string()),
            interface: None,
            severity: Severity::Major,
            service_affecting: true,
            details: Some("Device stopped announcing".to_string()),
            is_manual: false,
        };
        insert_alarm(&mut tx, &alarm, Utc::now()).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Close the offline alarm once the device is heard from again.
    pub async fn clear_offline(&self, device_id: i64, serial_number: &str) -> Result<bool> {
        match self
            .database
            .find_open_alarm(device_id, &offline_alarm_id(serial_number))
            .await?
        {
            Some(alarm) => self.database.close_alarm(alarm.id, Utc::now()).await,
            None => Ok(false),
        }
    }

    async fn get(&self, alarm_id: i64) -> Result<AlarmRecord, AlarmError> {
        self.database
            .get_alarm(alarm_id)
            .await?
            .ok_or(AlarmError::NotFound(alarm_id))
    }
}

pub fn offline_alarm_id(serial_number: &str) -> String {
    format!("{}{}", OFFLINE_ALARM_PREFIX, serial_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn synthesized_id_uses_condition_interface_and_serial() {
        let alarm = ReportedAlarm::parse(
            &json!({ "condType": "LOS", "ifDescr": "G.hn 1/1", "severity": "CR" }),
            "SN1",
        )
        .unwrap();
        assert_eq!(alarm.gam_id, "LOS_G.hn 1/1_SN1");
        assert_eq!(alarm.severity, Severity::Critical);
    }

    #[test]
    fn supplied_id_wins() {
        let alarm = ReportedAlarm::parse(
            &json!({ "AlarmId": "A-17", "condType": "LOS", "Severity": "bogus" }),
            "SN1",
        )
        .unwrap();
        assert_eq!(alarm.gam_id, "A-17");
        assert_eq!(alarm.severity, Severity::NotAlarmed);
    }

    #[test]
    fn entries_without_identity_are_rejected() {
        assert!(ReportedAlarm::parse(&json!({ "severity": "MJ" }), "SN1").is_none());
        assert!(ReportedAlarm::parse(&json!("LOS"), "SN1").is_none());
    }
}

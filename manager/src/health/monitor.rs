use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::scorer::{compute_score, derive_status};
use super::types::{DeviceHealth, HealthInputs};
use crate::constants::health::WINDOW_HOURS;
use crate::database::{Database, DeviceHealthHistoryRecord, DeviceRecord};

/// Scores devices from stored sync attempts and alarms. Never calls a device.
pub struct HealthScorer {
    database: Arc<Database>,
}

impl HealthScorer {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    async fn gather_inputs(&self, device: &DeviceRecord) -> Result<HealthInputs> {
        let since = Utc::now() - Duration::hours(WINDOW_HOURS);
        let stats = self.database.sync_stats_since(device.id, since).await?;
        let open_alarms = self.database.count_open_alarms(device.id).await?;

        Ok(HealthInputs {
            total_attempts: stats.total,
            successful_attempts: stats.successful,
            avg_response_ms: stats.avg_success_ms,
            open_alarms,
            uptime: device.uptime,
        })
    }

    async fn score_device(&self, device: &DeviceRecord) -> Result<DeviceHealth> {
        let inputs = self.gather_inputs(device).await?;
        let breakdown = compute_score(&inputs);
        let status = derive_status(breakdown.score, device.is_online);

        self.database
            .set_device_health(device.id, breakdown.score, status.as_str())
            .await?;

        Ok(DeviceHealth {
            device_id: device.id,
            serial_number: device.serial_number.clone(),
            is_online: device.is_online,
            status,
            breakdown,
            inputs,
        })
    }

    /// Score one device and store the result on it. `None` for an unknown id.
    pub async fn evaluate(&self, device_id: i64) -> Result<Option<DeviceHealth>> {
        match self.database.get_device(device_id).await? {
            Some(device) => Ok(Some(self.score_device(&device).await?)),
            None => Ok(None),
        }
    }

    /// Score every device and append one history row each.
    #[instrument(skip(self))]
    pub async fn snapshot_all(&self) -> Result<usize> {
        let devices = self.database.list_devices().await?;
        let recorded_at = Utc::now();
        let mut recorded = 0;

        for device in &devices {
            let health = match self.score_device(device).await {
                Ok(health) => health,
                Err(e) => {
                    error!("Health scoring failed for {}: {}", device.serial_number, e);
                    continue;
                }
            };

            let record = DeviceHealthHistoryRecord {
                device_id: device.id,
                score: health.breakdown.score,
                status: health.status.as_str().to_string(),
                success_rate: health.breakdown.success_rate,
                avg_response_ms: health.inputs.avg_response_ms,
                open_alarms: health.inputs.open_alarms,
                uptime: health.inputs.uptime,
                recorded_at,
            };
            if self.database.store_health_history(&record).await.is_ok() {
                recorded += 1;
            }
        }

        info!("Health snapshot recorded for {}/{} devices", recorded, devices.len());
        Ok(recorded)
    }
}

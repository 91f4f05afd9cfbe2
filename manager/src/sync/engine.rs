use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::mapping::parse_list;
use super::passes::{apply_bandwidths, apply_endpoints, apply_ports, apply_subscribers, PassStats};
use crate::database::{
    mark_device_inventory_not_alive, mark_device_offline, mark_device_reachable, mark_pass_synced,
    Database, SyncAttemptRecord, SyncKind,
};
use crate::errors::{DeviceSyncError, SyncError};
use crate::rpc::types::UptimeInfo;
use crate::rpc::{ClientOptions, GamRpcClient};

/// Bandwidth profiles run before subscribers so profile references resolve
/// on the first sync.
pub const PASS_ORDER: [SyncKind; 4] = [
    SyncKind::Endpoints,
    SyncKind::Bandwidths,
    SyncKind::Subscribers,
    SyncKind::Ports,
];

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub kind: SyncKind,
    pub success: bool,
    pub duration_ms: i64,
    pub error: Option<String>,
    pub stats: Option<PassStats>,
}

/// Outcome of a whole-device sync, one entry per pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub device_id: i64,
    pub serial_number: String,
    pub started_at: DateTime<Utc>,
    pub passes: Vec<PassReport>,
    pub uptime: Option<i64>,
    pub online: bool,
}

impl SyncReport {
    pub fn pass(&self, kind: SyncKind) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.kind == kind)
    }

    pub fn succeeded(&self) -> usize {
        self.passes.iter().filter(|p| p.success).count()
    }
}

pub struct SyncEngine {
    database: Arc<Database>,
    options: ClientOptions,
}

impl SyncEngine {
    pub fn new(database: Arc<Database>, options: ClientOptions) -> Self {
        Self { database, options }
    }

    /// Run the four passes and the uptime fetch against one device.
    ///
    /// The device ends up online iff at least one pass succeeded. When every
    /// pass fails, the device goes offline and its alive endpoints and
    /// subscribers go not-alive in the same transaction. Only a missing
    /// device or a client that cannot be built is returned as an error.
    #[instrument(skip(self))]
    pub async fn sync_device(&self, device_id: i64) -> Result<SyncReport, DeviceSyncError> {
        let device = self
            .database
            .get_device(device_id)
            .await?
            .ok_or(DeviceSyncError::NotFound(device_id))?;

        let client = GamRpcClient::for_device(&device, &self.options)?;
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        debug!("Sync {} started for {} ({})", run_id, device.serial_number, client.host());

        let mut passes = Vec::with_capacity(PASS_ORDER.len());
        for kind in PASS_ORDER {
            let report = self.run_pass(&client, device_id, kind).await;
            if let Some(error) = &report.error {
                warn!("{} pass failed for {}: {}", kind, device.serial_number, error);
            }
            passes.push(report);
        }

        let online = passes.iter().any(|p| p.success);
        let uptime = if online {
            self.fetch_uptime(&client, &device.serial_number).await
        } else {
            None
        };

        let now = Utc::now();
        let mut tx = self.database.begin().await?;
        if online {
            mark_device_reachable(&mut tx, device_id, uptime, now).await?;
        } else {
            mark_device_offline(&mut tx, device_id, now).await?;
            let (endpoints, subscribers) = mark_device_inventory_not_alive(&mut tx, device_id, now).await?;
            info!(
                "Device {} unreachable: offline, {} endpoints and {} subscribers marked not alive",
                device.serial_number, endpoints, subscribers
            );
        }
        tx.commit().await.map_err(anyhow::Error::from)?;

        let report = SyncReport {
            run_id,
            device_id,
            serial_number: device.serial_number,
            started_at,
            passes,
            uptime,
            online,
        };
        info!(
            "Sync {} for {}: {}/{} passes succeeded",
            report.run_id,
            report.serial_number,
            report.succeeded(),
            report.passes.len()
        );
        Ok(report)
    }

    async fn run_pass(&self, client: &GamRpcClient, device_id: i64, kind: SyncKind) -> PassReport {
        let started = Instant::now();
        let attempted_at = Utc::now();
        let outcome = self.execute_pass(client, device_id, kind).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        let (success, error, stats) = match outcome {
            Ok(stats) => (true, None, Some(stats)),
            Err(e) => (false, Some(e.to_string()), None),
        };

        let attempt = SyncAttemptRecord {
            device_id,
            kind,
            success,
            duration_ms,
            error: error.clone(),
            attempted_at,
        };
        if let Err(e) = self.database.store_sync_attempt(&attempt).await {
            warn!("Could not record {} sync attempt for device {}: {}", kind, device_id, e);
        }

        PassReport {
            kind,
            success,
            duration_ms,
            error,
            stats,
        }
    }

    async fn execute_pass(
        &self,
        client: &GamRpcClient,
        device_id: i64,
        kind: SyncKind,
    ) -> Result<PassStats, SyncError> {
        let result: Value = match kind {
            SyncKind::Endpoints => client.endpoint_brief_get().await?,
            SyncKind::Subscribers => client.subscriber_get().await?,
            SyncKind::Bandwidths => client.bandwidth_get().await?,
            SyncKind::Ports => client.port_status_get().await?,
        };

        // A mapping failure drops the transaction, so nothing is written
        let now = Utc::now();
        let mut tx = self.database.begin().await?;
        let stats = match kind {
            SyncKind::Endpoints => {
                apply_endpoints(&mut tx, device_id, parse_list(kind.as_str(), result)?, now).await?
            }
            SyncKind::Subscribers => {
                apply_subscribers(&mut tx, device_id, parse_list(kind.as_str(), result)?, now).await?
            }
            SyncKind::Bandwidths => {
                apply_bandwidths(&mut tx, device_id, parse_list(kind.as_str(), result)?, now).await?
            }
            SyncKind::Ports => {
                apply_ports(&mut tx, device_id, parse_list(kind.as_str(), result)?, now).await?
            }
        };
        mark_pass_synced(&mut tx, device_id, kind, now).await?;
        tx.commit().await.map_err(anyhow::Error::from)?;

        debug!("{} pass for device {}: {:?}", kind, device_id, stats);
        Ok(stats)
    }

    async fn fetch_uptime(&self, client: &GamRpcClient, serial_number: &str) -> Option<i64> {
        match client.system_uptime_get().await {
            Ok(result) => match serde_json::from_value::<UptimeInfo>(result.clone()) {
                Ok(info) => info.uptime,
                Err(_) => result.as_i64(),
            },
            Err(e) => {
                debug!("Uptime fetch failed for {}: {}", serial_number, e);
                None
            }
        }
    }
}

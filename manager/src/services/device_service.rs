//! Admin-triggered device operations: on-demand sync, provisioning,
//! firmware and signal measurement.
//!
//! Multi-step operations run their RPC calls in order and stop at the first
//! failure. Steps that already succeeded are not rolled back; the error
//! names the failing step and the completed ones. Every operation writes an
//! audit row whatever its outcome.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::database::{AuditLogRecord, Database, DeviceRecord};
use crate::errors::{OperationError, RpcError};
use crate::rpc::types::{BandwidthSpec, SubscriberSpec};
use crate::rpc::{port_index, ClientOptions, GamRpcClient};
use crate::sync::{SyncEngine, SyncReport};

/// Results of the steps of one operation, in order.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    pub serial_number: String,
    pub operation: &'static str,
    pub steps: Vec<StepResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: &'static str,
    pub result: Value,
}

struct StepRunner {
    operation: &'static str,
    serial_number: String,
    steps: Vec<StepResult>,
}

impl StepRunner {
    fn new(operation: &'static str, serial_number: &str) -> Self {
        Self {
            operation,
            serial_number: serial_number.to_string(),
            steps: Vec::new(),
        }
    }

    async fn step<F>(&mut self, step: &'static str, call: F) -> Result<(), OperationError>
    where
        F: Future<Output = Result<Value, RpcError>>,
    {
        match call.await {
            Ok(result) => {
                self.steps.push(StepResult { step, result });
                Ok(())
            }
            Err(source) => {
                error!("{} on {} failed at '{}': {}", self.operation, self.serial_number, step, source);
                Err(OperationError::StepFailed {
                    step,
                    completed: self.steps.iter().map(|s| s.step).collect(),
                    source,
                })
            }
        }
    }

    fn finish(self) -> OperationOutcome {
        OperationOutcome {
            serial_number: self.serial_number,
            operation: self.operation,
            steps: self.steps,
        }
    }
}

pub struct DeviceService {
    database: Arc<Database>,
    sync_engine: Arc<SyncEngine>,
    options: ClientOptions,
}

impl DeviceService {
    pub fn new(database: Arc<Database>, sync_engine: Arc<SyncEngine>, options: ClientOptions) -> Self {
        Self {
            database,
            sync_engine,
            options,
        }
    }

    async fn device(&self, serial_number: &str) -> Result<DeviceRecord, OperationError> {
        self.database
            .get_device_by_serial(serial_number)
            .await?
            .ok_or_else(|| OperationError::DeviceNotFound(serial_number.to_string()))
    }

    async fn writable_client(&self, serial_number: &str) -> Result<GamRpcClient, OperationError> {
        let device = self.device(serial_number).await?;
        if device.read_only {
            return Err(OperationError::ReadOnly(serial_number.to_string()));
        }
        Ok(GamRpcClient::for_device(&device, &self.options)?)
    }

    async fn audit<T>(
        &self,
        actor: &str,
        action: &str,
        serial_number: &str,
        details: Value,
        outcome: &Result<T, OperationError>,
    ) {
        let details = match outcome {
            Ok(_) => json!({ "result": "ok", "request": details }),
            Err(e) => json!({ "result": "error", "error": e.to_string(), "request": details }),
        };
        let entry = AuditLogRecord {
            timestamp: Utc::now(),
            actor: actor.to_string(),
            action: action.to_string(),
            target: serial_number.to_string(),
            details: Some(details.to_string()),
        };
        if let Err(e) = self.database.write_audit(&entry).await {
            warn!("Failed to write audit entry for {} on {}: {}", action, serial_number, e);
        }
    }

    /// Full sync of one device outside the poller's schedule.
    #[instrument(skip(self))]
    pub async fn sync_now(&self, serial_number: &str, actor: &str) -> Result<SyncReport, OperationError> {
        let outcome = async {
            let device = self.device(serial_number).await?;
            Ok::<_, OperationError>(self.sync_engine.sync_device(device.id).await?)
        }
        .await;

        self.audit(actor, "sync_now", serial_number, Value::Null, &outcome).await;
        outcome
    }

    /// Push a subscriber, then persist the running configuration.
    #[instrument(skip(self, spec))]
    pub async fn provision_subscriber(
        &self,
        serial_number: &str,
        spec: &SubscriberSpec,
        actor: &str,
    ) -> Result<OperationOutcome, OperationError> {
        let outcome = async {
            let client = self.writable_client(serial_number).await?;
            let mut runner = StepRunner::new("provision_subscriber", serial_number);
            runner.step("push_subscriber", client.subscriber_add(spec)).await?;
            runner.step("save_config", client.save_config()).await?;
            Ok::<_, OperationError>(runner.finish())
        }
        .await;

        if outcome.is_ok() {
            info!("Provisioned subscriber '{}' on {}", spec.name, serial_number);
        }
        let request = serde_json::to_value(spec).unwrap_or(Value::Null);
        self.audit(actor, "provision_subscriber", serial_number, request, &outcome).await;
        outcome
    }

    #[instrument(skip(self, spec))]
    pub async fn push_bandwidth_profile(
        &self,
        serial_number: &str,
        spec: &BandwidthSpec,
        actor: &str,
    ) -> Result<OperationOutcome, OperationError> {
        let outcome = async {
            let client = self.writable_client(serial_number).await?;
            let mut runner = StepRunner::new("push_bandwidth_profile", serial_number);
            runner.step("push_bandwidth", client.bandwidth_add(spec)).await?;
            runner.step("save_config", client.save_config()).await?;
            Ok::<_, OperationError>(runner.finish())
        }
        .await;

        let request = serde_json::to_value(spec).unwrap_or(Value::Null);
        self.audit(actor, "push_bandwidth_profile", serial_number, request, &outcome).await;
        outcome
    }

    /// Upload a firmware image; with `activate` the banks are swapped after.
    #[instrument(skip(self))]
    pub async fn push_firmware(
        &self,
        serial_number: &str,
        image_url: &str,
        activate: bool,
        actor: &str,
    ) -> Result<OperationOutcome, OperationError> {
        let outcome = async {
            let client = self.writable_client(serial_number).await?;
            let mut runner = StepRunner::new("push_firmware", serial_number);
            runner.step("upload_image", client.firmware_image_upload(image_url)).await?;
            if activate {
                runner.step("swap_image", client.firmware_swap()).await?;
            }
            Ok::<_, OperationError>(runner.finish())
        }
        .await;

        let request = json!({ "url": image_url, "activate": activate });
        self.audit(actor, "push_firmware", serial_number, request, &outcome).await;
        outcome
    }

    /// Signal measurement on a port given by name, e.g. `G.hn 1/3`.
    /// Read-only devices may be measured.
    pub async fn measure_signal(&self, serial_number: &str, port: &str) -> Result<Value, OperationError> {
        let index = port_index(port)?;
        let device = self.device(serial_number).await?;
        let client = GamRpcClient::for_device(&device, &self.options)?;
        Ok(client.signal_measurement_get(index).await?)
    }
}

// Device views and admin-triggered device operations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::common::{
    api_error, internal_error, operation_error, require_device, ApiResponse, ApiResult, API_ACTOR,
};
use crate::database::{
    AuditLogRecord, BandwidthRecord, DeviceHealthHistoryRecord, DeviceRecord, EndpointRecord,
    LevelCredentials, PortRecord, SubscriberRecord, SyncAttemptRecord,
};
use crate::constants::device::MAX_PRIVILEGE_LEVEL;
use crate::health::DeviceHealth;
use crate::rpc::types::{BandwidthSpec, SubscriberSpec};
use crate::services::OperationOutcome;
use crate::sync::SyncReport;
use crate::web::AppState;

#[derive(Serialize)]
pub struct DeviceDetail {
    pub device: DeviceRecord,
    pub endpoints: Vec<EndpointRecord>,
    pub subscribers: Vec<SubscriberRecord>,
    pub bandwidths: Vec<BandwidthRecord>,
    pub ports: Vec<PortRecord>,
    pub recent_sync_attempts: Vec<SyncAttemptRecord>,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    24
}

#[derive(Deserialize)]
pub struct FirmwareRequest {
    pub url: String,
    #[serde(default)]
    pub activate: bool,
}

/// Operator overrides on a device row. Absent fields are left as they are.
#[derive(Deserialize)]
pub struct UpdateDeviceRequest {
    pub read_only: Option<bool>,
    pub rpc_username: Option<String>,
    pub rpc_password: Option<String>,
    pub ip_address: Option<String>,
    pub port: Option<i64>,
    pub scheme: Option<String>,
    pub credentials: Option<LevelCredentials>,
}

#[derive(Deserialize)]
pub struct SignalQuery {
    pub port: String,
}

pub async fn list_devices(State(state): State<AppState>) -> ApiResult<Vec<DeviceRecord>> {
    let devices = state.database.list_devices().await.map_err(internal_error)?;
    Ok(Json(ApiResponse::success(devices)))
}

pub async fn get_device(
    Path(serial): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<DeviceDetail> {
    let device = require_device(&state, &serial).await?;
    let db = &state.database;

    let detail = DeviceDetail {
        endpoints: db.list_endpoints(device.id).await.map_err(internal_error)?,
        subscribers: db.list_subscribers(device.id).await.map_err(internal_error)?,
        bandwidths: db.list_bandwidths(device.id).await.map_err(internal_error)?,
        ports: db.list_ports(device.id).await.map_err(internal_error)?,
        recent_sync_attempts: db
            .recent_sync_attempts(device.id, 20)
            .await
            .map_err(internal_error)?,
        device,
    };
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn sync_device(
    Path(serial): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<SyncReport> {
    info!("Manual sync requested for: {}", serial);
    let report = state
        .device_service
        .sync_now(&serial, API_ACTOR)
        .await
        .map_err(operation_error)?;
    Ok(Json(ApiResponse::success(report)))
}

pub async fn get_device_health(
    Path(serial): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<DeviceHealth> {
    let device = require_device(&state, &serial).await?;
    match state.health.evaluate(device.id).await {
        Ok(Some(health)) => Ok(Json(ApiResponse::success(health))),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Device {} not found", serial),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

pub async fn get_device_health_history(
    Path(serial): Path<String>,
    Query(query): Query<LimitQuery>,
    State(state): State<AppState>,
) -> ApiResult<Vec<DeviceHealthHistoryRecord>> {
    let device = require_device(&state, &serial).await?;
    let history = state
        .database
        .health_history(device.id, query.limit.clamp(1, 1000))
        .await
        .map_err(internal_error)?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn provision_subscriber(
    Path(serial): Path<String>,
    State(state): State<AppState>,
    Json(spec): Json<SubscriberSpec>,
) -> ApiResult<OperationOutcome> {
    info!("Subscriber provisioning requested on {}: {}", serial, spec.name);
    let outcome = state
        .device_service
        .provision_subscriber(&serial, &spec, API_ACTOR)
        .await
        .map_err(operation_error)?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn push_bandwidth_profile(
    Path(serial): Path<String>,
    State(state): State<AppState>,
    Json(spec): Json<BandwidthSpec>,
) -> ApiResult<OperationOutcome> {
    let outcome = state
        .device_service
        .push_bandwidth_profile(&serial, &spec, API_ACTOR)
        .await
        .map_err(operation_error)?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn push_firmware(
    Path(serial): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<FirmwareRequest>,
) -> ApiResult<OperationOutcome> {
    info!("Firmware push requested on {} (activate: {})", serial, request.activate);
    let outcome = state
        .device_service
        .push_firmware(&serial, &request.url, request.activate, API_ACTOR)
        .await
        .map_err(operation_error)?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn measure_signal(
    Path(serial): Path<String>,
    Query(query): Query<SignalQuery>,
    State(state): State<AppState>,
) -> ApiResult<Value> {
    let measurement = state
        .device_service
        .measure_signal(&serial, &query.port)
        .await
        .map_err(operation_error)?;
    Ok(Json(ApiResponse::success(measurement)))
}

async fn audit_device_change(state: &AppState, action: &str, serial: &str, details: Value) {
    let entry = AuditLogRecord {
        timestamp: Utc::now(),
        actor: API_ACTOR.to_string(),
        action: action.to_string(),
        target: serial.to_string(),
        details: Some(details.to_string()),
    };
    if let Err(e) = state.database.write_audit(&entry).await {
        warn!("Failed to audit {} on {}: {}", action, serial, e);
    }
}

pub async fn update_device(
    Path(serial): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<UpdateDeviceRequest>,
) -> ApiResult<DeviceRecord> {
    let device = require_device(&state, &serial).await?;
    let db = &state.database;

    if let Some(scheme) = req.scheme.as_deref() {
        if scheme != "http" && scheme != "https" {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("Unsupported scheme {}", scheme),
            ));
        }
    }
    if let Some(credentials) = &req.credentials {
        if credentials.0.keys().any(|level| *level > MAX_PRIVILEGE_LEVEL) {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("Privilege levels run from 0 to {}", MAX_PRIVILEGE_LEVEL),
            ));
        }
    }

    if let Some(read_only) = req.read_only {
        db.set_device_read_only(device.id, read_only)
            .await
            .map_err(internal_error)?;
    }
    if req.rpc_username.is_some() || req.rpc_password.is_some() {
        db.set_device_rpc_credentials(
            device.id,
            req.rpc_username.as_deref().or(device.rpc_username.as_deref()),
            req.rpc_password.as_deref().or(device.rpc_password.as_deref()),
        )
        .await
        .map_err(internal_error)?;
    }
    if req.ip_address.is_some() || req.port.is_some() || req.scheme.is_some() {
        let ip_address = req.ip_address.as_deref().or(device.ip_address.as_deref());
        let Some(ip_address) = ip_address else {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("Device {} has no address to update", serial),
            ));
        };
        db.set_device_address(
            device.id,
            ip_address,
            req.port.unwrap_or(device.port),
            req.scheme.as_deref().unwrap_or(&device.scheme),
        )
        .await
        .map_err(internal_error)?;
    }
    if let Some(credentials) = &req.credentials {
        db.set_device_level_credentials(device.id, credentials)
            .await
            .map_err(internal_error)?;
    }

    // Secrets stay out of the audit trail
    let details = json!({
        "read_only": req.read_only,
        "rpc_credentials": req.rpc_username.is_some() || req.rpc_password.is_some(),
        "ip_address": req.ip_address,
        "port": req.port,
        "scheme": req.scheme,
        "credential_levels": req.credentials.as_ref().map(|c| c.0.keys().copied().collect::<Vec<_>>()),
    });
    audit_device_change(&state, "update_device", &serial, details).await;

    let updated = require_device(&state, &serial).await?;
    info!("Device {} updated", serial);
    Ok(Json(ApiResponse::success(updated)))
}

/// Remove a device and everything recorded about it. It reappears on its
/// next announcement.
pub async fn delete_device(
    Path(serial): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Value> {
    let device = require_device(&state, &serial).await?;
    state
        .database
        .delete_device(device.id)
        .await
        .map_err(internal_error)?;

    audit_device_change(&state, "delete_device", &serial, Value::Null).await;
    info!("Device {} deleted", serial);
    Ok(Json(ApiResponse::success(json!({ "deleted": serial }))))
}

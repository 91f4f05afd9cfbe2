// Alarm endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use tracing::info;

use super::common::{alarm_error, internal_error, require_device, ApiResponse, ApiResult, API_ACTOR};
use crate::alarms::ManualAlarm;
use crate::database::AlarmRecord;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct AlarmListQuery {
    #[serde(default)]
    pub open_only: bool,
}

#[derive(Deserialize, Default)]
pub struct AcknowledgeRequest {
    pub by: Option<String>,
}

pub async fn get_device_alarms(
    Path(serial): Path<String>,
    Query(query): Query<AlarmListQuery>,
    State(state): State<AppState>,
) -> ApiResult<Vec<AlarmRecord>> {
    let device = require_device(&state, &serial).await?;
    let alarms = match query.open_only {
        true => state.alarms.open_alarms(device.id).await,
        false => state.database.list_alarms(device.id).await,
    };
    let alarms = alarms.map_err(internal_error)?;
    Ok(Json(ApiResponse::success(alarms)))
}

pub async fn raise_manual_alarm(
    Path(serial): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ManualAlarm>,
) -> ApiResult<AlarmRecord> {
    let device = require_device(&state, &serial).await?;
    let alarm = state
        .alarms
        .raise_manual(device.id, request)
        .await
        .map_err(alarm_error)?;
    info!("Manual alarm {} raised on {}", alarm.gam_id, serial);
    Ok(Json(ApiResponse::success(alarm)))
}

pub async fn close_alarm(Path(id): Path<i64>, State(state): State<AppState>) -> ApiResult<AlarmRecord> {
    let alarm = state.alarms.close(id).await.map_err(alarm_error)?;
    info!("Alarm {} closed", id);
    Ok(Json(ApiResponse::success(alarm)))
}

pub async fn acknowledge_alarm(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    body: Option<Json<AcknowledgeRequest>>,
) -> ApiResult<AlarmRecord> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let by = request.by.unwrap_or_else(|| API_ACTOR.to_string());
    let alarm = state.alarms.acknowledge(id, &by).await.map_err(alarm_error)?;
    Ok(Json(ApiResponse::success(alarm)))
}

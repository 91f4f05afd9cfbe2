// Runtime settings and audit log endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

use super::common::{api_error, internal_error, ApiResponse, ApiResult, API_ACTOR};
use crate::config::settings::keys;
use crate::config::RuntimeSettings;
use crate::database::AuditLogRecord;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: HashMap<String, String>,
}

#[derive(Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
}

fn default_audit_limit() -> i64 {
    100
}

pub async fn get_runtime_settings(State(state): State<AppState>) -> ApiResult<RuntimeSettings> {
    Ok(Json(ApiResponse::success(state.settings.current().await)))
}

/// Unknown keys are rejected; values must be non-negative integers within
/// the key's bound.
/// Loops pick the new values up on their next iteration.
pub async fn update_runtime_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> ApiResult<Value> {
    for (key, value) in &req.settings {
        let Some(max) = keys::max_value(key) else {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("Unknown setting {}", key),
            ));
        };
        match value.trim().parse::<u64>() {
            Ok(parsed) if parsed <= max => {}
            Ok(_) => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    format!("Setting {} must not exceed {}", key, max),
                ))
            }
            Err(_) => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    format!("Setting {} must be a non-negative integer", key),
                ))
            }
        }
    }

    for (key, value) in &req.settings {
        state
            .settings
            .set(key, value.trim())
            .await
            .map_err(internal_error)?;
    }

    let entry = AuditLogRecord {
        timestamp: Utc::now(),
        actor: API_ACTOR.to_string(),
        action: "update_settings".to_string(),
        target: "global_settings".to_string(),
        details: Some(json!(req.settings).to_string()),
    };
    if let Err(e) = state.database.write_audit(&entry).await {
        warn!("Failed to audit settings update: {}", e);
    }

    info!("Updated {} runtime settings", req.settings.len());
    Ok(Json(ApiResponse::success(json!({
        "message": format!("Updated {} settings", req.settings.len()),
        "updated_count": req.settings.len()
    }))))
}

pub async fn get_audit_log(
    Query(query): Query<AuditQuery>,
    State(state): State<AppState>,
) -> ApiResult<Vec<AuditLogRecord>> {
    let entries = state
        .database
        .recent_audit_entries(query.limit.clamp(1, 1000))
        .await
        .map_err(internal_error)?;
    Ok(Json(ApiResponse::success(entries)))
}

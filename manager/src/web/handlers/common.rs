// Common types and utilities for API handlers

use axum::{http::StatusCode, response::Json};
use chrono::Utc;
use serde::Serialize;
use tracing::error;

use crate::database::DeviceRecord;
use crate::errors::{AlarmError, OperationError};
use crate::web::AppState;

/// Audit actor for operations triggered through the API
pub const API_ACTOR: &str = "api";

// Helper type for API responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(message.into())))
}

pub fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error!("Request failed: {}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub fn operation_error(e: OperationError) -> ApiError {
    let status = match &e {
        OperationError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        OperationError::ReadOnly(_) => StatusCode::CONFLICT,
        OperationError::Port(_) => StatusCode::BAD_REQUEST,
        OperationError::Client(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OperationError::Rpc(_) | OperationError::StepFailed { .. } => StatusCode::BAD_GATEWAY,
        OperationError::Storage(_) => return internal_error(e),
    };
    api_error(status, e.to_string())
}

pub fn alarm_error(e: AlarmError) -> ApiError {
    let status = match &e {
        AlarmError::NotFound(_) => StatusCode::NOT_FOUND,
        AlarmError::AlreadyOpen { .. } => StatusCode::CONFLICT,
        AlarmError::Storage(_) => return internal_error(e),
    };
    api_error(status, e.to_string())
}

/// Device by serial number, or a 404.
pub async fn require_device(state: &AppState, serial: &str) -> Result<DeviceRecord, ApiError> {
    match state.database.get_device_by_serial(serial).await {
        Ok(Some(device)) => Ok(device),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Device {} not found", serial),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

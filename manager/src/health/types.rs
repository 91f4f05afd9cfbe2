//! Health scoring types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inputs to the score, each taken over the trailing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthInputs {
    pub total_attempts: i64,
    pub successful_attempts: i64,
    /// Mean duration of successful attempts
    pub avg_response_ms: Option<f64>,
    pub open_alarms: i64,
    /// Device-reported uptime in seconds
    pub uptime: Option<i64>,
}

impl HealthInputs {
    /// No attempts counts as full success
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts <= 0 {
            1.0
        } else {
            (self.successful_attempts as f64 / self.total_attempts as f64).clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
    Offline,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Critical => "critical",
            HealthStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite score with the component sub-scores that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthBreakdown {
    pub score: f64,
    pub success_rate: f64,
    pub response_score: f64,
    pub alarm_score: f64,
    pub uptime_score: f64,
}

/// Result of evaluating one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceHealth {
    pub device_id: i64,
    pub serial_number: String,
    pub is_online: bool,
    pub status: HealthStatus,
    pub breakdown: HealthBreakdown,
    pub inputs: HealthInputs,
}

//! Composite health score. Pure functions only; gathering the inputs is
//! the monitor's job.

use super::types::{HealthBreakdown, HealthInputs, HealthStatus};
use crate::constants::health::*;

/// 100 at or below the best latency, 0 at or above the worst, linear between.
/// No successful attempts means no latency evidence, which scores 100.
pub fn response_score(avg_response_ms: Option<f64>) -> f64 {
    match avg_response_ms {
        None => 100.0,
        Some(ms) if ms <= RESPONSE_BEST_MS => 100.0,
        Some(ms) if ms >= RESPONSE_WORST_MS => 0.0,
        Some(ms) => 100.0 * (RESPONSE_WORST_MS - ms) / (RESPONSE_WORST_MS - RESPONSE_BEST_MS),
    }
}

pub fn alarm_score(open_alarms: i64) -> f64 {
    (100.0 - ALARM_PENALTY * open_alarms.max(0) as f64).max(0.0)
}

pub fn uptime_score(uptime: Option<i64>) -> f64 {
    match uptime {
        None => 100.0,
        Some(seconds) => {
            100.0 * seconds.clamp(0, UPTIME_FULL_SECONDS) as f64 / UPTIME_FULL_SECONDS as f64
        }
    }
}

pub fn compute_score(inputs: &HealthInputs) -> HealthBreakdown {
    let success_rate = inputs.success_rate();
    let response_score = response_score(inputs.avg_response_ms);
    let alarm_score = alarm_score(inputs.open_alarms);
    let uptime_score = uptime_score(inputs.uptime);

    let score = SUCCESS_WEIGHT * success_rate
        + RESPONSE_WEIGHT * response_score
        + ALARM_WEIGHT * alarm_score
        + UPTIME_WEIGHT * uptime_score;

    HealthBreakdown {
        score: round2(score).clamp(0.0, 100.0),
        success_rate,
        response_score,
        alarm_score,
        uptime_score,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Offline devices are always `offline`, whatever their score.
pub fn derive_status(score: f64, is_online: bool) -> HealthStatus {
    if !is_online {
        HealthStatus::Offline
    } else if score >= HEALTHY_THRESHOLD {
        HealthStatus::Healthy
    } else if score >= DEGRADED_THRESHOLD {
        HealthStatus::Degraded
    } else if score >= CRITICAL_THRESHOLD {
        HealthStatus::Critical
    } else {
        HealthStatus::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_inputs_score_100() {
        let inputs = HealthInputs {
            total_attempts: 12,
            successful_attempts: 12,
            avg_response_ms: Some(120.0),
            open_alarms: 0,
            uptime: Some(200_000),
        };
        assert_eq!(compute_score(&inputs).score, 100.0);
        assert_eq!(compute_score(&HealthInputs::default()).score, 100.0);
    }

    #[test]
    fn zero_success_caps_at_60() {
        let inputs = HealthInputs {
            total_attempts: 8,
            successful_attempts: 0,
            avg_response_ms: None,
            open_alarms: 0,
            uptime: None,
        };
        let breakdown = compute_score(&inputs);
        assert!(breakdown.score <= 60.0);
        assert_eq!(breakdown.response_score, 100.0);
    }

    #[test]
    fn components_are_linear_and_bounded() {
        assert_eq!(response_score(Some(2750.0)), 50.0);
        assert_eq!(response_score(Some(9000.0)), 0.0);
        assert_eq!(alarm_score(3), 70.0);
        assert_eq!(alarm_score(25), 0.0);
        assert_eq!(uptime_score(Some(43_200)), 50.0);
        assert_eq!(uptime_score(Some(-5)), 0.0);
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(derive_status(95.0, false), HealthStatus::Offline);
        assert_eq!(derive_status(80.0, true), HealthStatus::Healthy);
        assert_eq!(derive_status(79.9, true), HealthStatus::Degraded);
        assert_eq!(derive_status(60.0, true), HealthStatus::Degraded);
        assert_eq!(derive_status(30.0, true), HealthStatus::Critical);
        assert_eq!(derive_status(29.9, true), HealthStatus::Offline);
    }
}

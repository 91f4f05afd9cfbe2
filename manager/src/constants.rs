//! Central repository for timeouts, ticks, default settings and scoring
//! constants.
//!
//! Organized by category so every loop and client reads its numbers from a
//! single place.

use std::time::Duration;

/// Outbound JSON-RPC client constants
pub mod rpc {
    use super::Duration;

    /// Fixed path of the device JSON-RPC endpoint
    pub const ENDPOINT_PATH: &str = "/jsonrpc";

    /// JSON-RPC protocol version sent in every envelope
    pub const JSONRPC_VERSION: &str = "2.0";

    /// Per-call budget when the configuration does not override it
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection establishment budget
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    pub const USER_AGENT: &str = "gam-manager/1.0";
}

/// Device defaults applied on first announcement
pub mod device {
    pub const DEFAULT_SCHEME: &str = "https";
    pub const DEFAULT_PORT: i64 = 443;

    /// Highest legacy privilege level
    pub const MAX_PRIVILEGE_LEVEL: u8 = 15;
}

/// Fixed scheduler ticks. Intervals that operators tune live in the
/// runtime settings instead.
pub mod scheduler {
    use super::Duration;

    pub const POLLER_TICK: Duration = Duration::from_secs(10);
    pub const OFFLINE_DETECTOR_TICK: Duration = Duration::from_secs(30);

    /// Cron expression (sec min hour day month dow) for the health snapshot
    pub const HEALTH_SNAPSHOT_SCHEDULE: &str = "0 0 * * * *";

    /// Prefix of the synthetic alarm id raised by the offline detector
    pub const OFFLINE_ALARM_PREFIX: &str = "OFFLINE_";
}

/// Default values for runtime settings stored in `global_settings`
pub mod defaults {
    pub const POLLING_INTERVAL_SECONDS: u64 = 300;
    pub const CONSIDERED_ACTIVE_SECONDS: u64 = 600;
    pub const MAX_CONCURRENT_SYNCS: usize = 4;
    pub const PURGE_INTERVAL_HOURS: u64 = 24;
    pub const AUDIT_RETENTION_DAYS: i64 = 90;
    pub const ALARM_RETENTION_DAYS: i64 = 30;
    pub const SYNC_ATTEMPT_RETENTION_DAYS: i64 = 30;
    pub const LOOKUP_INTERVAL_SECONDS: u64 = 60;
    pub const LOOKUP_RETRY_HORIZON_HOURS: i64 = 24;

    pub const HTTP_HOST: &str = "0.0.0.0";
    pub const HTTP_PORT: u16 = 8095;
    pub const DATABASE_PATH: &str = "data/gam.db";
}

/// Upper bounds for runtime settings, applied on write and on read
pub mod bounds {
    /// Ten years
    pub const MAX_SECONDS: u64 = 315_360_000;
    pub const MAX_HOURS: u64 = 87_600;
    pub const MAX_DAYS: u64 = 36_500;
    pub const MAX_CONCURRENT_SYNCS: u64 = 256;
}

/// Health score weights and thresholds
pub mod health {
    /// Trailing window for every score input
    pub const WINDOW_HOURS: i64 = 24;

    pub const SUCCESS_WEIGHT: f64 = 40.0;
    pub const RESPONSE_WEIGHT: f64 = 0.25;
    pub const ALARM_WEIGHT: f64 = 0.20;
    pub const UPTIME_WEIGHT: f64 = 0.15;

    pub const RESPONSE_BEST_MS: f64 = 500.0;
    pub const RESPONSE_WORST_MS: f64 = 5000.0;

    pub const ALARM_PENALTY: f64 = 10.0;

    pub const UPTIME_FULL_SECONDS: i64 = 86_400;

    pub const HEALTHY_THRESHOLD: f64 = 80.0;
    pub const DEGRADED_THRESHOLD: f64 = 60.0;
    pub const CRITICAL_THRESHOLD: f64 = 30.0;
}

/// Limits for inbound requests
pub mod limits {
    /// Largest accepted announcement body
    pub const MAX_ANNOUNCE_BODY_BYTES: usize = 256 * 1024;
}

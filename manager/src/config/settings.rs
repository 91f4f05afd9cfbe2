//! Runtime settings that operators can retune without a restart.
//!
//! Values live in the `global_settings` table. Background loops call
//! [`SettingsStore::current`] at the top of every iteration, which re-reads
//! the table and falls back to the last good snapshot if storage is
//! unavailable.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::constants::{bounds, defaults};
use crate::database::Database;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub polling_interval_seconds: u64,
    pub considered_active_seconds: u64,
    pub max_concurrent_syncs: usize,
    pub purge_interval_hours: u64,
    pub audit_retention_days: i64,
    pub alarm_retention_days: i64,
    pub sync_attempt_retention_days: i64,
    pub lookup_interval_seconds: u64,
    pub lookup_retry_horizon_hours: i64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            polling_interval_seconds: defaults::POLLING_INTERVAL_SECONDS,
            considered_active_seconds: defaults::CONSIDERED_ACTIVE_SECONDS,
            max_concurrent_syncs: defaults::MAX_CONCURRENT_SYNCS,
            purge_interval_hours: defaults::PURGE_INTERVAL_HOURS,
            audit_retention_days: defaults::AUDIT_RETENTION_DAYS,
            alarm_retention_days: defaults::ALARM_RETENTION_DAYS,
            sync_attempt_retention_days: defaults::SYNC_ATTEMPT_RETENTION_DAYS,
            lookup_interval_seconds: defaults::LOOKUP_INTERVAL_SECONDS,
            lookup_retry_horizon_hours: defaults::LOOKUP_RETRY_HORIZON_HOURS,
        }
    }
}

pub mod keys {
    use crate::constants::bounds;

    pub const POLLING_INTERVAL_SECONDS: &str = "polling_interval_seconds";
    pub const CONSIDERED_ACTIVE_SECONDS: &str = "considered_active_seconds";
    pub const MAX_CONCURRENT_SYNCS: &str = "max_concurrent_syncs";
    pub const PURGE_INTERVAL_HOURS: &str = "purge_interval_hours";
    pub const AUDIT_RETENTION_DAYS: &str = "audit_retention_days";
    pub const ALARM_RETENTION_DAYS: &str = "alarm_retention_days";
    pub const SYNC_ATTEMPT_RETENTION_DAYS: &str = "sync_attempt_retention_days";
    pub const LOOKUP_INTERVAL_SECONDS: &str = "lookup_interval_seconds";
    pub const LOOKUP_RETRY_HORIZON_HOURS: &str = "lookup_retry_horizon_hours";

    /// Largest accepted value for `key`, `None` when the key is unknown.
    pub fn max_value(key: &str) -> Option<u64> {
        match key {
            POLLING_INTERVAL_SECONDS | CONSIDERED_ACTIVE_SECONDS | LOOKUP_INTERVAL_SECONDS => {
                Some(bounds::MAX_SECONDS)
            }
            PURGE_INTERVAL_HOURS | LOOKUP_RETRY_HORIZON_HOURS => Some(bounds::MAX_HOURS),
            AUDIT_RETENTION_DAYS | ALARM_RETENTION_DAYS | SYNC_ATTEMPT_RETENTION_DAYS => {
                Some(bounds::MAX_DAYS)
            }
            MAX_CONCURRENT_SYNCS => Some(bounds::MAX_CONCURRENT_SYNCS),
            _ => None,
        }
    }
}

impl RuntimeSettings {
    /// Build a snapshot from raw key/value rows. Missing or unparseable
    /// values keep the value from `base`.
    pub fn from_rows(rows: &HashMap<String, String>, base: &RuntimeSettings) -> Self {
        fn parse<T: std::str::FromStr + Copy>(
            rows: &HashMap<String, String>,
            key: &str,
            fallback: T,
        ) -> T {
            match rows.get(key) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    warn!("Ignoring unparseable setting {} = '{}'", key, raw);
                    fallback
                }),
                None => fallback,
            }
        }

        let seconds = |key, fallback: u64| parse(rows, key, fallback).min(bounds::MAX_SECONDS);
        let hours = |key, fallback: i64| {
            parse(rows, key, fallback).clamp(0, bounds::MAX_HOURS as i64)
        };
        let days = |key, fallback: i64| parse(rows, key, fallback).clamp(0, bounds::MAX_DAYS as i64);

        Self {
            polling_interval_seconds: seconds(
                keys::POLLING_INTERVAL_SECONDS,
                base.polling_interval_seconds,
            ),
            considered_active_seconds: seconds(
                keys::CONSIDERED_ACTIVE_SECONDS,
                base.considered_active_seconds,
            ),
            max_concurrent_syncs: parse(rows, keys::MAX_CONCURRENT_SYNCS, base.max_concurrent_syncs)
                .clamp(1, bounds::MAX_CONCURRENT_SYNCS as usize),
            purge_interval_hours: parse(rows, keys::PURGE_INTERVAL_HOURS, base.purge_interval_hours)
                .clamp(1, bounds::MAX_HOURS),
            audit_retention_days: days(keys::AUDIT_RETENTION_DAYS, base.audit_retention_days),
            alarm_retention_days: days(keys::ALARM_RETENTION_DAYS, base.alarm_retention_days),
            sync_attempt_retention_days: days(
                keys::SYNC_ATTEMPT_RETENTION_DAYS,
                base.sync_attempt_retention_days,
            ),
            lookup_interval_seconds: seconds(
                keys::LOOKUP_INTERVAL_SECONDS,
                base.lookup_interval_seconds,
            )
            .max(1),
            lookup_retry_horizon_hours: hours(
                keys::LOOKUP_RETRY_HORIZON_HOURS,
                base.lookup_retry_horizon_hours,
            ),
        }
    }

    pub fn to_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            (keys::POLLING_INTERVAL_SECONDS, self.polling_interval_seconds.to_string()),
            (keys::CONSIDERED_ACTIVE_SECONDS, self.considered_active_seconds.to_string()),
            (keys::MAX_CONCURRENT_SYNCS, self.max_concurrent_syncs.to_string()),
            (keys::PURGE_INTERVAL_HOURS, self.purge_interval_hours.to_string()),
            (keys::AUDIT_RETENTION_DAYS, self.audit_retention_days.to_string()),
            (keys::ALARM_RETENTION_DAYS, self.alarm_retention_days.to_string()),
            (keys::SYNC_ATTEMPT_RETENTION_DAYS, self.sync_attempt_retention_days.to_string()),
            (keys::LOOKUP_INTERVAL_SECONDS, self.lookup_interval_seconds.to_string()),
            (keys::LOOKUP_RETRY_HORIZON_HOURS, self.lookup_retry_horizon_hours.to_string()),
        ]
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_seconds)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_hours * 3600)
    }

    pub fn lookup_interval(&self) -> Duration {
        Duration::from_secs(self.lookup_interval_seconds)
    }
}

/// Shared, thread-safe runtime settings snapshot backed by the database.
#[derive(Clone)]
pub struct SettingsStore {
    database: Arc<Database>,
    defaults: RuntimeSettings,
    last_good: Arc<RwLock<RuntimeSettings>>,
}

impl SettingsStore {
    pub fn new(database: Arc<Database>, defaults: RuntimeSettings) -> Self {
        Self {
            database,
            last_good: Arc::new(RwLock::new(defaults.clone())),
            defaults,
        }
    }

    /// Write the seed values for keys that have no row yet.
    pub async fn seed_defaults(&self) -> Result<()> {
        let existing = self.database.get_global_settings().await?;
        for (key, value) in self.defaults.to_rows() {
            if !existing.contains_key(key) {
                debug!("Seeding runtime setting {} = {}", key, value);
                self.database.set_global_setting(key, &value).await?;
            }
        }
        Ok(())
    }

    /// Fresh snapshot read from storage.
    pub async fn current(&self) -> RuntimeSettings {
        match self.database.get_global_settings().await {
            Ok(rows) => {
                let snapshot = RuntimeSettings::from_rows(&rows, &self.defaults);
                *self.last_good.write().await = snapshot.clone();
                snapshot
            }
            Err(e) => {
                warn!("Failed to read runtime settings, using last snapshot: {}", e);
                self.last_good.read().await.clone()
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.database.set_global_setting(key, value).await
    }
}

//! Sync attempt and health history database operations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use tracing::{debug, error};

use super::records::{DeviceHealthHistoryRecord, SyncAttemptRecord, SyncKind};
use super::Database;

/// Aggregated sync attempts for one device over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncStats {
    pub total: i64,
    pub successful: i64,
    /// Mean duration of the successful attempts only
    pub avg_success_ms: Option<f64>,
}

pub async fn record_sync_attempt(conn: &mut SqliteConnection, attempt: &SyncAttemptRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_attempts (device_id, kind, success, duration_ms, error, attempted_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(attempt.device_id)
    .bind(attempt.kind.as_str())
    .bind(attempt.success)
    .bind(attempt.duration_ms)
    .bind(&attempt.error)
    .bind(attempt.attempted_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl Database {
    pub async fn store_sync_attempt(&self, attempt: &SyncAttemptRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        match record_sync_attempt(&mut conn, attempt).await {
            Ok(()) => {
                debug!(
                    "Sync attempt stored: device {} {} success={}",
                    attempt.device_id, attempt.kind, attempt.success
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    "Failed to store sync attempt for device {}: {}",
                    attempt.device_id, e
                );
                Err(e)
            }
        }
    }

    pub async fn sync_stats_since(&self, device_id: i64, since: DateTime<Utc>) -> Result<SyncStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN success = 1 THEN 1 ELSE 0 END), 0) AS successful,
                AVG(CASE WHEN success = 1 THEN duration_ms END) AS avg_success_ms
            FROM sync_attempts
            WHERE device_id = ? AND attempted_at >= ?
            "#,
        )
        .bind(device_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(SyncStats {
            total: row.try_get("total")?,
            successful: row.try_get("successful")?,
            avg_success_ms: row.try_get("avg_success_ms")?,
        })
    }

    pub async fn recent_sync_attempts(&self, device_id: i64, limit: i64) -> Result<Vec<SyncAttemptRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT device_id, kind, success, duration_ms, error, attempted_at
            FROM sync_attempts
            WHERE device_id = ?
            ORDER BY attempted_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut attempts = Vec::new();
        for row in rows {
            let kind: String = row.try_get("kind")?;
            let kind: SyncKind = match kind.parse() {
                Ok(kind) => kind,
                Err(e) => {
                    debug!("Skipping sync attempt: {}", e);
                    continue;
                }
            };
            attempts.push(SyncAttemptRecord {
                device_id: row.try_get("device_id")?,
                kind,
                success: row.try_get("success")?,
                duration_ms: row.try_get("duration_ms")?,
                error: row.try_get("error")?,
                attempted_at: row.try_get("attempted_at")?,
            });
        }
        Ok(attempts)
    }

    pub async fn store_health_history(&self, record: &DeviceHealthHistoryRecord) -> Result<()> {
        match sqlx::query(
            r#"
            INSERT INTO device_health_history (
                device_id, score, status, success_rate, avg_response_ms,
                open_alarms, uptime, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.device_id)
        .bind(record.score)
        .bind(&record.status)
        .bind(record.success_rate)
        .bind(record.avg_response_ms)
        .bind(record.open_alarms)
        .bind(record.uptime)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(
                    "Failed to store health history for device {}: {}",
                    record.device_id, e
                );
                Err(e.into())
            }
        }
    }

    pub async fn health_history(
        &self,
        device_id: i64,
        limit: i64,
    ) -> Result<Vec<DeviceHealthHistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT device_id, score, status, success_rate, avg_response_ms,
                   open_alarms, uptime, recorded_at
            FROM device_health_history
            WHERE device_id = ?
            ORDER BY recorded_at DESC
            LIMIT ?
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut history = Vec::new();
        for row in rows {
            history.push(DeviceHealthHistoryRecord {
                device_id: row.try_get("device_id")?,
                score: row.try_get("score")?,
                status: row.try_get("status")?,
                success_rate: row.try_get("success_rate")?,
                avg_response_ms: row.try_get("avg_response_ms")?,
                open_alarms: row.try_get("open_alarms")?,
                uptime: row.try_get("uptime")?,
                recorded_at: row.try_get("recorded_at")?,
            });
        }
        Ok(history)
    }
}

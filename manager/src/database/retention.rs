//! Audit log, external endpoint lookups and retention purges.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use tracing::{debug, warn};

use super::records::{AuditLogRecord, EndpointLookupRecord, LookupStatus};
use super::Database;

/// Rows removed by one purge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCounts {
    pub audit_rows: u64,
    pub closed_alarms: u64,
    pub sync_attempts: u64,
}

impl PurgeCounts {
    pub fn total(&self) -> u64 {
        self.audit_rows + self.closed_alarms + self.sync_attempts
    }
}

/// Queue an external lookup for a newly seen endpoint. A MAC that already
/// has a pending lookup is left alone.
pub async fn insert_pending_lookup(
    conn: &mut SqliteConnection,
    mac_address: &str,
    device_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM endpoint_lookups WHERE mac_address = ? AND status = 'pending'",
    )
    .bind(mac_address)
    .fetch_one(&mut *conn)
    .await?;

    if pending > 0 {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO endpoint_lookups (mac_address, device_id, status, attempts, created_at)
        VALUES (?, ?, 'pending', 0, ?)
        "#,
    )
    .bind(mac_address)
    .bind(device_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl Database {
    pub async fn write_audit(&self, entry: &AuditLogRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_log (timestamp, actor, action, target, details) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.timestamp)
        .bind(&entry.actor)
        .bind(&entry.action)
        .bind(&entry.target)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_audit_entries(&self, limit: i64) -> Result<Vec<AuditLogRecord>> {
        let rows = sqlx::query(
            "SELECT timestamp, actor, action, target, details FROM audit_log ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(AuditLogRecord {
                timestamp: row.try_get("timestamp")?,
                actor: row.try_get("actor")?,
                action: row.try_get("action")?,
                target: row.try_get("target")?,
                details: row.try_get("details")?,
            });
        }
        Ok(entries)
    }

    pub async fn list_lookups(&self, status: LookupStatus) -> Result<Vec<EndpointLookupRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, mac_address, device_id, status, attempts, external_ref, created_at, last_attempt_at
            FROM endpoint_lookups
            WHERE status = ?
            ORDER BY created_at
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut lookups = Vec::new();
        for row in rows {
            let raw_status: String = row.try_get("status")?;
            let status = match raw_status.parse() {
                Ok(status) => status,
                Err(e) => {
                    warn!("Skipping endpoint lookup: {}", e);
                    continue;
                }
            };
            lookups.push(EndpointLookupRecord {
                id: row.try_get("id")?,
                mac_address: row.try_get("mac_address")?,
                device_id: row.try_get("device_id")?,
                status,
                attempts: row.try_get("attempts")?,
                external_ref: row.try_get("external_ref")?,
                created_at: row.try_get("created_at")?,
                last_attempt_at: row.try_get("last_attempt_at")?,
            });
        }
        Ok(lookups)
    }

    pub async fn record_lookup_attempt(&self, lookup_id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE endpoint_lookups SET attempts = attempts + 1, last_attempt_at = ? WHERE id = ?")
            .bind(now)
            .bind(lookup_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn complete_lookup(&self, lookup_id: i64, external_ref: &str) -> Result<()> {
        sqlx::query("UPDATE endpoint_lookups SET status = 'found', external_ref = ? WHERE id = ?")
            .bind(external_ref)
            .bind(lookup_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Pending lookups created before `cutoff` become expired.
    pub async fn expire_lookups_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE endpoint_lookups SET status = 'expired' WHERE status = 'pending' AND created_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete audit rows, closed alarms and sync attempts older than their
    /// cutoffs. Open alarms are never touched.
    pub async fn purge_expired(
        &self,
        audit_cutoff: DateTime<Utc>,
        alarm_cutoff: DateTime<Utc>,
        sync_attempt_cutoff: DateTime<Utc>,
    ) -> Result<PurgeCounts> {
        let mut tx = self.pool.begin().await?;

        let audit_rows = sqlx::query("DELETE FROM audit_log WHERE timestamp < ?")
            .bind(audit_cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let closed_alarms =
            sqlx::query("DELETE FROM alarms WHERE closing_date IS NOT NULL AND closing_date < ?")
                .bind(alarm_cutoff)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        let sync_attempts = sqlx::query("DELETE FROM sync_attempts WHERE attempted_at < ?")
            .bind(sync_attempt_cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let counts = PurgeCounts {
            audit_rows,
            closed_alarms,
            sync_attempts,
        };
        debug!("Purge removed {:?}", counts);
        Ok(counts)
    }
}

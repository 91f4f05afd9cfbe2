//! Alarm database operations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::records::{AlarmRecord, Severity};
use super::Database;

/// Values for an alarm about to be opened.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlarm {
    pub device_id: i64,
    pub gam_id: String,
    pub condition_type: Option<String>,
    pub interface: Option<String>,
    pub severity: Severity,
    pub service_affecting: bool,
    pub details: Option<String>,
    pub is_manual: bool,
}

fn row_to_alarm(row: &SqliteRow) -> Result<AlarmRecord> {
    let severity: String = row.try_get("severity")?;
    Ok(AlarmRecord {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        gam_id: row.try_get("gam_id")?,
        condition_type: row.try_get("condition_type")?,
        interface: row.try_get("interface")?,
        severity: Severity::parse_lenient(&severity),
        service_affecting: row.try_get("service_affecting")?,
        details: row.try_get("details")?,
        is_manual: row.try_get("is_manual")?,
        opening_date: row.try_get("opening_date")?,
        closing_date: row.try_get("closing_date")?,
        acknowledged_at: row.try_get("acknowledged_at")?,
        acknowledged_by: row.try_get("acknowledged_by")?,
    })
}

/// Open alarms of a device, manual ones included.
pub async fn list_open_alarms_in(conn: &mut SqliteConnection, device_id: i64) -> Result<Vec<AlarmRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM alarms WHERE device_id = ? AND closing_date IS NULL ORDER BY opening_date, id",
    )
    .bind(device_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(row_to_alarm).collect()
}

pub async fn insert_alarm(conn: &mut SqliteConnection, alarm: &NewAlarm, now: DateTime<Utc>) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO alarms (
            device_id, gam_id, condition_type, interface, severity,
            service_affecting, details, is_manual, opening_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(alarm.device_id)
    .bind(&alarm.gam_id)
    .bind(&alarm.condition_type)
    .bind(&alarm.interface)
    .bind(alarm.severity.as_str())
    .bind(alarm.service_affecting)
    .bind(&alarm.details)
    .bind(alarm.is_manual)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Refresh the mutable fields of an open alarm in place.
pub async fn refresh_open_alarm(
    conn: &mut SqliteConnection,
    alarm_id: i64,
    severity: Severity,
    service_affecting: bool,
    details: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE alarms SET severity = ?, service_affecting = ?, details = COALESCE(?, details)
        WHERE id = ? AND closing_date IS NULL
        "#,
    )
    .bind(severity.as_str())
    .bind(service_affecting)
    .bind(details)
    .bind(alarm_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn close_alarm_in(conn: &mut SqliteConnection, alarm_id: i64, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query("UPDATE alarms SET closing_date = ? WHERE id = ? AND closing_date IS NULL")
        .bind(now)
        .bind(alarm_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_open_alarm_in(
    conn: &mut SqliteConnection,
    device_id: i64,
    gam_id: &str,
) -> Result<Option<AlarmRecord>> {
    let row = sqlx::query("SELECT * FROM alarms WHERE device_id = ? AND gam_id = ? AND closing_date IS NULL")
        .bind(device_id)
        .bind(gam_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_alarm).transpose()
}

impl Database {
    pub async fn get_alarm(&self, alarm_id: i64) -> Result<Option<AlarmRecord>> {
        let row = sqlx::query("SELECT * FROM alarms WHERE id = ?")
            .bind(alarm_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_alarm).transpose()
    }

    pub async fn list_open_alarms(&self, device_id: i64) -> Result<Vec<AlarmRecord>> {
        let mut conn = self.pool.acquire().await?;
        list_open_alarms_in(&mut conn, device_id).await
    }

    /// All alarms of a device, most recent first.
    pub async fn list_alarms(&self, device_id: i64) -> Result<Vec<AlarmRecord>> {
        let rows = sqlx::query("SELECT * FROM alarms WHERE device_id = ? ORDER BY opening_date DESC, id DESC")
            .bind(device_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_alarm).collect()
    }

    pub async fn count_open_alarms(&self, device_id: i64) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM alarms WHERE device_id = ? AND closing_date IS NULL")
                .bind(device_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    pub async fn find_open_alarm(&self, device_id: i64, gam_id: &str) -> Result<Option<AlarmRecord>> {
        let mut conn = self.pool.acquire().await?;
        find_open_alarm_in(&mut conn, device_id, gam_id).await
    }

    pub async fn close_alarm(&self, alarm_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        close_alarm_in(&mut conn, alarm_id, now).await
    }

    /// Acknowledging also closes the alarm if it is still open.
    pub async fn acknowledge_alarm(&self, alarm_id: i64, by: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE alarms
            SET acknowledged_at = ?, acknowledged_by = ?, closing_date = COALESCE(closing_date, ?)
            WHERE id = ? AND acknowledged_at IS NULL
            "#,
        )
        .bind(now)
        .bind(by)
        .bind(now)
        .bind(alarm_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

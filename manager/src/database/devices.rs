//! Device database operations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info};

use super::records::{AnnouncedDevice, DeviceRecord, LevelCredentials, SyncKind};
use super::Database;
use crate::constants::device;

const DEVICE_COLUMNS: &str = r#"
    id, serial_number, name, ip_address, port, scheme,
    rpc_username, rpc_password, announced_username, announced_password, credentials,
    model, hardware_version, mac_address, software_version, firmware_version,
    swap_software_version, swap_firmware_version,
    is_online, uptime, read_only, group_id,
    last_seen, last_announce,
    last_endpoint_sync, last_subscriber_sync, last_bandwidth_sync, last_port_sync,
    health_score, health_status, created_at, updated_at
"#;

fn row_to_device(row: &SqliteRow) -> Result<DeviceRecord> {
    let credentials: Option<String> = row.try_get("credentials")?;
    Ok(DeviceRecord {
        id: row.try_get("id")?,
        serial_number: row.try_get("serial_number")?,
        name: row.try_get("name")?,
        ip_address: row.try_get("ip_address")?,
        port: row.try_get("port")?,
        scheme: row.try_get("scheme")?,
        rpc_username: row.try_get("rpc_username")?,
        rpc_password: row.try_get("rpc_password")?,
        announced_username: row.try_get("announced_username")?,
        announced_password: row.try_get("announced_password")?,
        credentials: LevelCredentials::from_json(credentials.as_deref()),
        model: row.try_get("model")?,
        hardware_version: row.try_get("hardware_version")?,
        mac_address: row.try_get("mac_address")?,
        software_version: row.try_get("software_version")?,
        firmware_version: row.try_get("firmware_version")?,
        swap_software_version: row.try_get("swap_software_version")?,
        swap_firmware_version: row.try_get("swap_firmware_version")?,
        is_online: row.try_get("is_online")?,
        uptime: row.try_get("uptime")?,
        read_only: row.try_get("read_only")?,
        group_id: row.try_get("group_id")?,
        last_seen: row.try_get("last_seen")?,
        last_announce: row.try_get("last_announce")?,
        last_endpoint_sync: row.try_get("last_endpoint_sync")?,
        last_subscriber_sync: row.try_get("last_subscriber_sync")?,
        last_bandwidth_sync: row.try_get("last_bandwidth_sync")?,
        last_port_sync: row.try_get("last_port_sync")?,
        health_score: row.try_get("health_score")?,
        health_status: row.try_get("health_status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Create or refresh a device from an announcement inside the caller's
/// transaction. Returns the device id and whether the row was created.
///
/// Existing values survive unless the announcement carries a non-empty
/// replacement; address, liveness and timestamps always refresh.
pub async fn upsert_announced_device(
    conn: &mut SqliteConnection,
    announced: &AnnouncedDevice,
    observed_address: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(i64, bool)> {
    let ip_address = announced
        .ip_address
        .as_deref()
        .or(observed_address)
        .map(str::to_string);

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM devices WHERE serial_number = ?")
        .bind(&announced.serial_number)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(device_id) = existing {
        sqlx::query(
            r#"
            UPDATE devices SET
                name = COALESCE(?, name),
                ip_address = COALESCE(?, ip_address),
                port = COALESCE(?, port),
                scheme = COALESCE(?, scheme),
                announced_username = COALESCE(?, announced_username),
                announced_password = COALESCE(?, announced_password),
                model = COALESCE(?, model),
                hardware_version = COALESCE(?, hardware_version),
                mac_address = COALESCE(?, mac_address),
                software_version = COALESCE(?, software_version),
                firmware_version = COALESCE(?, firmware_version),
                swap_software_version = COALESCE(?, swap_software_version),
                swap_firmware_version = COALESCE(?, swap_firmware_version),
                uptime = COALESCE(?, uptime),
                is_online = 1,
                last_seen = ?,
                last_announce = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&announced.name)
        .bind(&ip_address)
        .bind(announced.port)
        .bind(&announced.scheme)
        .bind(&announced.username)
        .bind(&announced.password)
        .bind(&announced.model)
        .bind(&announced.hardware_version)
        .bind(&announced.mac_address)
        .bind(&announced.software_version)
        .bind(&announced.firmware_version)
        .bind(&announced.swap_software_version)
        .bind(&announced.swap_firmware_version)
        .bind(announced.uptime)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(device_id)
        .execute(&mut *conn)
        .await?;

        debug!("Refreshed device {} from announcement", announced.serial_number);
        return Ok((device_id, false));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO devices (
            serial_number, name, ip_address, port, scheme,
            announced_username, announced_password,
            model, hardware_version, mac_address,
            software_version, firmware_version, swap_software_version, swap_firmware_version,
            uptime, is_online, read_only, last_seen, last_announce, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 0, ?, ?, ?, ?)
        "#,
    )
    .bind(&announced.serial_number)
    .bind(&announced.name)
    .bind(&ip_address)
    .bind(announced.port.unwrap_or(device::DEFAULT_PORT))
    .bind(
        announced
            .scheme
            .clone()
            .unwrap_or_else(|| device::DEFAULT_SCHEME.to_string()),
    )
    .bind(&announced.username)
    .bind(&announced.password)
    .bind(&announced.model)
    .bind(&announced.hardware_version)
    .bind(&announced.mac_address)
    .bind(&announced.software_version)
    .bind(&announced.firmware_version)
    .bind(&announced.swap_software_version)
    .bind(&announced.swap_firmware_version)
    .bind(announced.uptime)
    .bind(now)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    info!("Registered new device {}", announced.serial_number);
    Ok((result.last_insert_rowid(), true))
}

pub async fn get_device_in(conn: &mut SqliteConnection, device_id: i64) -> Result<Option<DeviceRecord>> {
    let sql = format!("SELECT {} FROM devices WHERE id = ?", DEVICE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(device_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_device).transpose()
}

/// Mark a successful pass: device online, seen now, pass timestamp set.
pub async fn mark_pass_synced(
    conn: &mut SqliteConnection,
    device_id: i64,
    kind: SyncKind,
    now: DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "UPDATE devices SET {} = ?, updated_at = ? WHERE id = ?",
        kind.timestamp_column()
    );
    sqlx::query(&sql)
        .bind(now)
        .bind(now)
        .bind(device_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Device answered at least one pass.
pub async fn mark_device_reachable(
    conn: &mut SqliteConnection,
    device_id: i64,
    uptime: Option<i64>,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE devices SET is_online = 1, last_seen = ?, uptime = COALESCE(?, uptime), updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(uptime)
    .bind(now)
    .bind(device_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn mark_device_offline(conn: &mut SqliteConnection, device_id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE devices SET is_online = 0, updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(device_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl Database {
    pub async fn get_device(&self, device_id: i64) -> Result<Option<DeviceRecord>> {
        let mut conn = self.pool.acquire().await?;
        get_device_in(&mut conn, device_id).await
    }

    pub async fn get_device_by_serial(&self, serial_number: &str) -> Result<Option<DeviceRecord>> {
        let sql = format!("SELECT {} FROM devices WHERE serial_number = ?", DEVICE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(serial_number)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_device).transpose()
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>> {
        let sql = format!("SELECT {} FROM devices ORDER BY serial_number", DEVICE_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_device).collect()
    }

    pub async fn count_devices(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM devices")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Online devices whose endpoint pass is older than `cutoff` or never ran.
    pub async fn devices_due_for_poll(&self, cutoff: DateTime<Utc>) -> Result<Vec<DeviceRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM devices
            WHERE is_online = 1
              AND (last_endpoint_sync IS NULL OR last_endpoint_sync < ?)
            ORDER BY last_endpoint_sync ASC
            "#,
            DEVICE_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(cutoff).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_device).collect()
    }

    /// Devices flagged online that have not been seen since `cutoff`.
    pub async fn stale_online_devices(&self, cutoff: DateTime<Utc>) -> Result<Vec<DeviceRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM devices
            WHERE is_online = 1
              AND (last_seen IS NULL OR last_seen < ?)
            "#,
            DEVICE_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(cutoff).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_device).collect()
    }

    pub async fn set_device_offline(&self, device_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        mark_device_offline(&mut conn, device_id, Utc::now()).await
    }

    pub async fn set_device_health(&self, device_id: i64, score: f64, status: &str) -> Result<()> {
        sqlx::query("UPDATE devices SET health_score = ?, health_status = ? WHERE id = ?")
            .bind(score)
            .bind(status)
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Per-device RPC credential override
    pub async fn set_device_rpc_credentials(
        &self,
        device_id: i64,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE devices SET rpc_username = ?, rpc_password = ?, updated_at = ? WHERE id = ?",
        )
        .bind(username)
        .bind(password)
        .bind(Utc::now())
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_device_level_credentials(
        &self,
        device_id: i64,
        credentials: &LevelCredentials,
    ) -> Result<()> {
        sqlx::query("UPDATE devices SET credentials = ?, updated_at = ? WHERE id = ?")
            .bind(credentials.to_json())
            .bind(Utc::now())
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_device_read_only(&self, device_id: i64, read_only: bool) -> Result<()> {
        sqlx::query("UPDATE devices SET read_only = ?, updated_at = ? WHERE id = ?")
            .bind(read_only)
            .bind(Utc::now())
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Point a device at a different address, used when a device is
    /// reachable somewhere other than where it announced from.
    pub async fn set_device_address(
        &self,
        device_id: i64,
        ip_address: &str,
        port: i64,
        scheme: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE devices SET ip_address = ?, port = ?, scheme = ?, updated_at = ? WHERE id = ?",
        )
        .bind(ip_address)
        .bind(port)
        .bind(scheme)
        .bind(Utc::now())
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cascades to every row the device owns.
    pub async fn delete_device(&self, device_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

//! Endpoint, subscriber, bandwidth profile and port rows.
//!
//! The sync passes read and write these through a transaction connection;
//! the `Database` getters serve the admin surface and tests.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::records::{BandwidthRecord, EndpointRecord, PortRecord, SubscriberRecord};
use super::Database;

// ============================================================================
// Row mapping
// ============================================================================

fn row_to_endpoint(row: &SqliteRow) -> Result<EndpointRecord> {
    Ok(EndpointRecord {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        mac_address: row.try_get("mac_address")?,
        name: row.try_get("name")?,
        conf_endpoint_id: row.try_get("conf_endpoint_id")?,
        conf_port: row.try_get("conf_port")?,
        conf_subscriber_id: row.try_get("conf_subscriber_id")?,
        detected_port: row.try_get("detected_port")?,
        phy_rate: row.try_get("phy_rate")?,
        wire_length: row.try_get("wire_length")?,
        port_link_states: row.try_get("port_link_states")?,
        alive: row.try_get("alive")?,
        quarantined: row.try_get("quarantined")?,
        external_ref: row.try_get("external_ref")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_subscriber(row: &SqliteRow) -> Result<SubscriberRecord> {
    Ok(SubscriberRecord {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        json_id: row.try_get("json_id")?,
        uid: row.try_get("uid")?,
        name: row.try_get("name")?,
        endpoint_mac: row.try_get("endpoint_mac")?,
        endpoint_id: row.try_get("endpoint_id")?,
        port1: row.try_get("port1")?,
        port2: row.try_get("port2")?,
        vlan_id: row.try_get("vlan_id")?,
        outer_tag: row.try_get("outer_tag")?,
        remapped_id: row.try_get("remapped_id")?,
        vlan_mode: row.try_get("vlan_mode")?,
        vlan_display: row.try_get("vlan_display")?,
        bandwidth_name: row.try_get("bandwidth_name")?,
        bandwidth_id: row.try_get("bandwidth_id")?,
        alive: row.try_get("alive")?,
        sync: row.try_get("sync")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_bandwidth(row: &SqliteRow) -> Result<BandwidthRecord> {
    Ok(BandwidthRecord {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        name: row.try_get("name")?,
        downstream: row.try_get("downstream")?,
        upstream: row.try_get("upstream")?,
        deleted: row.try_get("deleted")?,
        sync: row.try_get("sync")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_port(row: &SqliteRow) -> Result<PortRecord> {
    Ok(PortRecord {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        interface: row.try_get("interface")?,
        port_type: row.try_get("port_type")?,
        link: row.try_get("link")?,
        duplex: row.try_get("duplex")?,
        speed: row.try_get("speed")?,
        sfp_vendor: row.try_get("sfp_vendor")?,
        sfp_temperature: row.try_get("sfp_temperature")?,
        sfp_tx_power: row.try_get("sfp_tx_power")?,
        sfp_rx_power: row.try_get("sfp_rx_power")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// Endpoints
// ============================================================================

/// Endpoint values as observed on a device, before they become a row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointValues {
    pub mac_address: String,
    pub name: Option<String>,
    pub conf_endpoint_id: Option<i64>,
    pub conf_port: Option<String>,
    pub conf_subscriber_id: Option<i64>,
    pub detected_port: Option<String>,
    pub phy_rate: Option<i64>,
    pub wire_length: Option<i64>,
    pub port_link_states: Option<String>,
    pub alive: bool,
}

pub async fn list_endpoints_in(conn: &mut SqliteConnection, device_id: i64) -> Result<Vec<EndpointRecord>> {
    let rows = sqlx::query("SELECT * FROM endpoints WHERE device_id = ? ORDER BY mac_address")
        .bind(device_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_endpoint).collect()
}

/// Lookup by MAC across the whole fleet.
pub async fn find_endpoint_by_mac(
    conn: &mut SqliteConnection,
    mac_address: &str,
) -> Result<Option<EndpointRecord>> {
    let row = sqlx::query("SELECT * FROM endpoints WHERE mac_address = ?")
        .bind(mac_address)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_endpoint).transpose()
}

pub async fn insert_endpoint(
    conn: &mut SqliteConnection,
    device_id: i64,
    values: &EndpointValues,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO endpoints (
            device_id, mac_address, name, conf_endpoint_id, conf_port, conf_subscriber_id,
            detected_port, phy_rate, wire_length, port_link_states, alive, quarantined,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(device_id)
    .bind(&values.mac_address)
    .bind(&values.name)
    .bind(values.conf_endpoint_id)
    .bind(&values.conf_port)
    .bind(values.conf_subscriber_id)
    .bind(&values.detected_port)
    .bind(values.phy_rate)
    .bind(values.wire_length)
    .bind(&values.port_link_states)
    .bind(values.alive)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Overwrite an endpoint row, moving it to `device_id` if it was elsewhere.
/// The conf_* columns are written as given so an unprovisioned endpoint
/// clears them.
pub async fn update_endpoint(
    conn: &mut SqliteConnection,
    endpoint_id: i64,
    device_id: i64,
    values: &EndpointValues,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE endpoints SET
            device_id = ?,
            name = COALESCE(?, name),
            conf_endpoint_id = ?,
            conf_port = ?,
            conf_subscriber_id = ?,
            detected_port = ?,
            phy_rate = ?,
            wire_length = ?,
            port_link_states = ?,
            alive = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(device_id)
    .bind(&values.name)
    .bind(values.conf_endpoint_id)
    .bind(&values.conf_port)
    .bind(values.conf_subscriber_id)
    .bind(&values.detected_port)
    .bind(values.phy_rate)
    .bind(values.wire_length)
    .bind(&values.port_link_states)
    .bind(values.alive)
    .bind(now)
    .bind(endpoint_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn mark_endpoints_not_alive(
    conn: &mut SqliteConnection,
    endpoint_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<u64> {
    let mut affected = 0;
    for id in endpoint_ids {
        affected += sqlx::query("UPDATE endpoints SET alive = 0, updated_at = ? WHERE id = ? AND alive = 1")
            .bind(now)
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    Ok(affected)
}

// ============================================================================
// Subscribers
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriberValues {
    pub json_id: Option<i64>,
    pub uid: Option<i64>,
    pub name: Option<String>,
    pub endpoint_mac: Option<String>,
    pub endpoint_id: Option<i64>,
    pub port1: Option<String>,
    pub port2: Option<String>,
    pub vlan_id: Option<i64>,
    pub outer_tag: Option<i64>,
    pub remapped_id: Option<i64>,
    pub vlan_mode: Option<String>,
    pub vlan_display: Option<String>,
    pub bandwidth_name: Option<String>,
    pub bandwidth_id: Option<i64>,
}

pub async fn list_subscribers_in(
    conn: &mut SqliteConnection,
    device_id: i64,
) -> Result<Vec<SubscriberRecord>> {
    let rows = sqlx::query("SELECT * FROM subscribers WHERE device_id = ? ORDER BY id")
        .bind(device_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_subscriber).collect()
}

pub async fn insert_subscriber(
    conn: &mut SqliteConnection,
    device_id: i64,
    values: &SubscriberValues,
    now: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO subscribers (
            device_id, json_id, uid, name, endpoint_mac, endpoint_id, port1, port2,
            vlan_id, outer_tag, remapped_id, vlan_mode, vlan_display,
            bandwidth_name, bandwidth_id, alive, sync, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 1, ?, ?)
        "#,
    )
    .bind(device_id)
    .bind(values.json_id)
    .bind(values.uid)
    .bind(&values.name)
    .bind(&values.endpoint_mac)
    .bind(values.endpoint_id)
    .bind(&values.port1)
    .bind(&values.port2)
    .bind(values.vlan_id)
    .bind(values.outer_tag)
    .bind(values.remapped_id)
    .bind(&values.vlan_mode)
    .bind(&values.vlan_display)
    .bind(&values.bandwidth_name)
    .bind(values.bandwidth_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_subscriber(
    conn: &mut SqliteConnection,
    subscriber_id: i64,
    values: &SubscriberValues,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE subscribers SET
            json_id = ?, uid = ?, name = ?, endpoint_mac = ?, endpoint_id = ?,
            port1 = ?, port2 = ?, vlan_id = ?, outer_tag = ?, remapped_id = ?,
            vlan_mode = ?, vlan_display = ?, bandwidth_name = ?, bandwidth_id = ?,
            alive = 1, sync = 1, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(values.json_id)
    .bind(values.uid)
    .bind(&values.name)
    .bind(&values.endpoint_mac)
    .bind(values.endpoint_id)
    .bind(&values.port1)
    .bind(&values.port2)
    .bind(values.vlan_id)
    .bind(values.outer_tag)
    .bind(values.remapped_id)
    .bind(&values.vlan_mode)
    .bind(&values.vlan_display)
    .bind(&values.bandwidth_name)
    .bind(values.bandwidth_id)
    .bind(now)
    .bind(subscriber_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn mark_subscribers_not_alive(
    conn: &mut SqliteConnection,
    subscriber_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<u64> {
    let mut affected = 0;
    for id in subscriber_ids {
        affected +=
            sqlx::query("UPDATE subscribers SET alive = 0, updated_at = ? WHERE id = ? AND alive = 1")
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await?
                .rows_affected();
    }
    Ok(affected)
}

/// Device-wide cascade used when every sync pass failed.
pub async fn mark_device_inventory_not_alive(
    conn: &mut SqliteConnection,
    device_id: i64,
    now: DateTime<Utc>,
) -> Result<(u64, u64)> {
    let endpoints = sqlx::query(
        "UPDATE endpoints SET alive = 0, updated_at = ? WHERE device_id = ? AND alive = 1",
    )
    .bind(now)
    .bind(device_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let subscribers = sqlx::query(
        "UPDATE subscribers SET alive = 0, updated_at = ? WHERE device_id = ? AND alive = 1",
    )
    .bind(now)
    .bind(device_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok((endpoints, subscribers))
}

// ============================================================================
// Bandwidth profiles
// ============================================================================

pub async fn list_bandwidths_in(
    conn: &mut SqliteConnection,
    device_id: i64,
) -> Result<Vec<BandwidthRecord>> {
    let rows = sqlx::query("SELECT * FROM bandwidths WHERE device_id = ? ORDER BY name")
        .bind(device_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_bandwidth).collect()
}

/// Insert or revive a profile seen on the device; it is live and in sync.
pub async fn upsert_bandwidth(
    conn: &mut SqliteConnection,
    device_id: i64,
    name: &str,
    downstream: Option<i64>,
    upstream: Option<i64>,
    now: DateTime<Utc>,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO bandwidths (device_id, name, downstream, upstream, deleted, sync, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, 1, ?, ?)
        ON CONFLICT(device_id, name) DO UPDATE SET
            downstream = excluded.downstream,
            upstream = excluded.upstream,
            deleted = 0,
            sync = 1,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(device_id)
    .bind(name)
    .bind(downstream)
    .bind(upstream)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn soft_delete_bandwidths(
    conn: &mut SqliteConnection,
    bandwidth_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<u64> {
    let mut affected = 0;
    for id in bandwidth_ids {
        affected +=
            sqlx::query("UPDATE bandwidths SET deleted = 1, updated_at = ? WHERE id = ? AND deleted = 0")
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await?
                .rows_affected();
    }
    Ok(affected)
}

pub async fn find_bandwidth_id(
    conn: &mut SqliteConnection,
    device_id: i64,
    name: &str,
) -> Result<Option<i64>> {
    Ok(sqlx::query_scalar(
        "SELECT id FROM bandwidths WHERE device_id = ? AND name = ? AND deleted = 0",
    )
    .bind(device_id)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?)
}

// ============================================================================
// Ports
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortValues {
    pub interface: String,
    pub port_type: Option<String>,
    pub link: Option<String>,
    pub duplex: Option<String>,
    pub speed: Option<String>,
    pub sfp_vendor: Option<String>,
    pub sfp_temperature: Option<f64>,
    pub sfp_tx_power: Option<f64>,
    pub sfp_rx_power: Option<f64>,
}

pub async fn list_ports_in(conn: &mut SqliteConnection, device_id: i64) -> Result<Vec<PortRecord>> {
    let rows = sqlx::query("SELECT * FROM ports WHERE device_id = ? ORDER BY interface")
        .bind(device_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_port).collect()
}

pub async fn upsert_port(
    conn: &mut SqliteConnection,
    device_id: i64,
    values: &PortValues,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ports (
            device_id, interface, port_type, link, duplex, speed,
            sfp_vendor, sfp_temperature, sfp_tx_power, sfp_rx_power, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(device_id, interface) DO UPDATE SET
            port_type = excluded.port_type,
            link = excluded.link,
            duplex = excluded.duplex,
            speed = excluded.speed,
            sfp_vendor = excluded.sfp_vendor,
            sfp_temperature = excluded.sfp_temperature,
            sfp_tx_power = excluded.sfp_tx_power,
            sfp_rx_power = excluded.sfp_rx_power,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(device_id)
    .bind(&values.interface)
    .bind(&values.port_type)
    .bind(&values.link)
    .bind(&values.duplex)
    .bind(&values.speed)
    .bind(&values.sfp_vendor)
    .bind(values.sfp_temperature)
    .bind(values.sfp_tx_power)
    .bind(values.sfp_rx_power)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl Database {
    pub async fn list_endpoints(&self, device_id: i64) -> Result<Vec<EndpointRecord>> {
        let mut conn = self.pool.acquire().await?;
        list_endpoints_in(&mut conn, device_id).await
    }

    pub async fn get_endpoint_by_mac(&self, mac_address: &str) -> Result<Option<EndpointRecord>> {
        let mut conn = self.pool.acquire().await?;
        find_endpoint_by_mac(&mut conn, mac_address).await
    }

    pub async fn set_endpoint_external_ref(&self, mac_address: &str, external_ref: &str) -> Result<()> {
        sqlx::query("UPDATE endpoints SET external_ref = ?, updated_at = ? WHERE mac_address = ?")
            .bind(external_ref)
            .bind(Utc::now())
            .bind(mac_address)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_subscribers(&self, device_id: i64) -> Result<Vec<SubscriberRecord>> {
        let mut conn = self.pool.acquire().await?;
        list_subscribers_in(&mut conn, device_id).await
    }

    pub async fn list_bandwidths(&self, device_id: i64) -> Result<Vec<BandwidthRecord>> {
        let mut conn = self.pool.acquire().await?;
        list_bandwidths_in(&mut conn, device_id).await
    }

    pub async fn list_ports(&self, device_id: i64) -> Result<Vec<PortRecord>> {
        let mut conn = self.pool.acquire().await?;
        list_ports_in(&mut conn, device_id).await
    }
}

//! The four reconciliation passes. Each runs inside the caller's
//! transaction: diff, write matches and inserts, then apply the absence
//! policy to what the device stopped reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;

use super::mapping::{endpoint_values, port_values, subscriber_values, SubscriberKey};
use super::reconcile::{absence_policy, three_way_diff, AbsencePolicy};
use crate::database::{
    find_bandwidth_id, find_endpoint_by_mac, insert_endpoint, insert_pending_lookup,
    insert_subscriber, list_bandwidths_in, list_endpoints_in, list_ports_in, list_subscribers_in,
    mark_endpoints_not_alive, mark_subscribers_not_alive, soft_delete_bandwidths, update_endpoint,
    update_subscriber, upsert_bandwidth, upsert_port, SyncKind,
};
use crate::errors::SyncError;
use crate::rpc::types::{BandwidthEntry, EndpointBrief, PortEntry, SubscriberEntry};

/// Row counts of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub reported: usize,
    pub updated: usize,
    pub inserted: usize,
    /// Rows the absence policy acted on
    pub absent: usize,
}

async fn apply_absence(
    conn: &mut SqliteConnection,
    kind: SyncKind,
    ids: &[i64],
    now: DateTime<Utc>,
) -> Result<usize, SyncError> {
    let affected = match (absence_policy(kind), kind) {
        (AbsencePolicy::Retain, _) => 0,
        (AbsencePolicy::MarkNotAlive, SyncKind::Endpoints) => {
            mark_endpoints_not_alive(conn, ids, now).await?
        }
        (AbsencePolicy::MarkNotAlive, SyncKind::Subscribers) => {
            mark_subscribers_not_alive(conn, ids, now).await?
        }
        (AbsencePolicy::SoftDelete, SyncKind::Bandwidths) => {
            soft_delete_bandwidths(conn, ids, now).await?
        }
        (policy, kind) => {
            return Err(SyncError::mapping(
                kind.as_str(),
                format!("no storage action for {:?}", policy),
            ))
        }
    };
    Ok(affected as usize)
}

pub async fn apply_endpoints(
    conn: &mut SqliteConnection,
    device_id: i64,
    entries: Vec<EndpointBrief>,
    now: DateTime<Utc>,
) -> Result<PassStats, SyncError> {
    let stored = list_endpoints_in(conn, device_id).await?;
    let incoming: Vec<_> = entries.iter().map(endpoint_values).collect();
    let mut stats = PassStats {
        reported: incoming.len(),
        ..Default::default()
    };

    let diff = three_way_diff(
        &stored,
        incoming,
        |row| Some(row.mac_address.clone()),
        |values| values.mac_address.clone(),
    );

    for (row, values) in &diff.matched {
        update_endpoint(conn, row.id, device_id, values, now).await?;
        stats.updated += 1;
    }

    for values in &diff.new {
        // MACs are fleet-unique: an endpoint known elsewhere moves here
        match find_endpoint_by_mac(conn, &values.mac_address).await? {
            Some(existing) => {
                debug!(
                    "Endpoint {} moved from device {} to {}",
                    values.mac_address, existing.device_id, device_id
                );
                update_endpoint(conn, existing.id, device_id, values, now).await?;
                stats.updated += 1;
            }
            None => {
                insert_endpoint(conn, device_id, values, now).await?;
                insert_pending_lookup(conn, &values.mac_address, device_id, now).await?;
                stats.inserted += 1;
            }
        }
    }

    let missing: Vec<i64> = diff.missing.iter().map(|row| row.id).collect();
    stats.absent = apply_absence(conn, SyncKind::Endpoints, &missing, now).await?;
    Ok(stats)
}

pub async fn apply_subscribers(
    conn: &mut SqliteConnection,
    device_id: i64,
    entries: Vec<SubscriberEntry>,
    now: DateTime<Utc>,
) -> Result<PassStats, SyncError> {
    let mut keyed = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let key = SubscriberKey::of_entry(entry).ok_or_else(|| {
            SyncError::mapping("subscribers", format!("item {} has neither id nor name", index))
        })?;
        let mut values = subscriber_values(entry);
        if let Some(mac) = &values.endpoint_mac {
            values.endpoint_id = find_endpoint_by_mac(conn, mac).await?.map(|e| e.id);
        }
        if let Some(name) = &values.bandwidth_name {
            values.bandwidth_id = find_bandwidth_id(conn, device_id, name).await?;
        }
        keyed.push((key, values));
    }

    let stored = list_subscribers_in(conn, device_id).await?;
    let mut stats = PassStats {
        reported: keyed.len(),
        ..Default::default()
    };

    let diff = three_way_diff(
        &stored,
        keyed,
        |row| SubscriberKey::of_values(row.json_id, row.name.as_deref()),
        |(key, _)| key.clone(),
    );

    for (row, (_, values)) in &diff.matched {
        update_subscriber(conn, row.id, values, now).await?;
        stats.updated += 1;
    }
    for (_, values) in &diff.new {
        insert_subscriber(conn, device_id, values, now).await?;
        stats.inserted += 1;
    }

    let missing: Vec<i64> = diff.missing.iter().map(|row| row.id).collect();
    stats.absent = apply_absence(conn, SyncKind::Subscribers, &missing, now).await?;
    Ok(stats)
}

pub async fn apply_bandwidths(
    conn: &mut SqliteConnection,
    device_id: i64,
    entries: Vec<BandwidthEntry>,
    now: DateTime<Utc>,
) -> Result<PassStats, SyncError> {
    let stored = list_bandwidths_in(conn, device_id).await?;
    let mut stats = PassStats {
        reported: entries.len(),
        ..Default::default()
    };

    let diff = three_way_diff(
        &stored,
        entries,
        |row| Some(row.name.clone()),
        |entry| entry.name.trim().to_string(),
    );

    for (_, entry) in &diff.matched {
        upsert_bandwidth(conn, device_id, entry.name.trim(), entry.downstream, entry.upstream, now).await?;
        stats.updated += 1;
    }
    for entry in &diff.new {
        upsert_bandwidth(conn, device_id, entry.name.trim(), entry.downstream, entry.upstream, now).await?;
        stats.inserted += 1;
    }

    let missing: Vec<i64> = diff
        .missing
        .iter()
        .filter(|row| !row.deleted)
        .map(|row| row.id)
        .collect();
    stats.absent = apply_absence(conn, SyncKind::Bandwidths, &missing, now).await?;
    Ok(stats)
}

pub async fn apply_ports(
    conn: &mut SqliteConnection,
    device_id: i64,
    entries: Vec<PortEntry>,
    now: DateTime<Utc>,
) -> Result<PassStats, SyncError> {
    let stored = list_ports_in(conn, device_id).await?;
    let incoming: Vec<_> = entries.iter().map(port_values).collect();
    let mut stats = PassStats {
        reported: incoming.len(),
        ..Default::default()
    };

    let diff = three_way_diff(
        &stored,
        incoming,
        |row| Some(row.interface.clone()),
        |values| values.interface.clone(),
    );

    for (_, values) in &diff.matched {
        upsert_port(conn, device_id, values, now).await?;
        stats.updated += 1;
    }
    for values in &diff.new {
        upsert_port(conn, device_id, values, now).await?;
        stats.inserted += 1;
    }

    let missing: Vec<i64> = diff.missing.iter().map(|row| row.id).collect();
    stats.absent = apply_absence(conn, SyncKind::Ports, &missing, now).await?;
    Ok(stats)
}

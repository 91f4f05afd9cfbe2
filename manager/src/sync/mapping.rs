//! Mapping device payloads into stored row values.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::database::{EndpointValues, PortValues, SubscriberValues};
use crate::errors::SyncError;
use crate::rpc::types::{EndpointBrief, PortEntry, SubscriberEntry};

/// Decode a getter result into a list. Devices answer with a bare array;
/// an object wrapping a single array is accepted too.
pub fn parse_list<T: DeserializeOwned>(entity: &'static str, result: Value) -> Result<Vec<T>, SyncError> {
    let items = match result {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::Object(mut object) if object.len() == 1 => match object.values_mut().next().map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => return Err(SyncError::mapping(entity, "expected a list")),
        },
        other => {
            return Err(SyncError::mapping(
                entity,
                format!("expected a list, got {}", json_kind(&other)),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item)
                .map_err(|e| SyncError::mapping(entity, format!("item {}: {}", index, e)))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Canonical MAC form: lower case, colon separated.
pub fn normalize_mac(raw: &str) -> String {
    raw.trim().replace('-', ":").to_ascii_lowercase()
}

pub fn endpoint_values(entry: &EndpointBrief) -> EndpointValues {
    // An unprovisioned endpoint has no conf id; its conf_* columns clear
    let provisioned = entry.conf_endpoint_id.is_some();
    EndpointValues {
        mac_address: normalize_mac(&entry.mac),
        name: entry.name.clone(),
        conf_endpoint_id: entry.conf_endpoint_id,
        conf_port: entry.port.clone().filter(|_| provisioned),
        conf_subscriber_id: entry.subscriber_id.filter(|_| provisioned),
        detected_port: entry.detected_port.clone(),
        phy_rate: entry.phy_rate,
        wire_length: entry.wire_length,
        port_link_states: entry
            .port_link_states
            .as_ref()
            .and_then(|states| serde_json::to_string(states).ok()),
        alive: entry.alive.unwrap_or(true),
    }
}

/// Key a subscriber is matched on: the device-native id, else its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriberKey {
    Id(i64),
    Name(String),
}

impl SubscriberKey {
    pub fn of_entry(entry: &SubscriberEntry) -> Option<Self> {
        entry
            .id
            .map(SubscriberKey::Id)
            .or_else(|| entry.name.clone().map(SubscriberKey::Name))
    }

    pub fn of_values(json_id: Option<i64>, name: Option<&str>) -> Option<Self> {
        json_id
            .map(SubscriberKey::Id)
            .or_else(|| name.map(|n| SubscriberKey::Name(n.to_string())))
    }
}

fn present(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

/// Display string for a subscriber's VLAN fields, most specific first:
/// `outer/vlan/(remap)`, `outer/vlan`, `vlan/(remap)`, `vlan`.
pub fn vlan_display(outer_tag: Option<i64>, vlan_id: Option<i64>, remapped_id: Option<i64>) -> Option<String> {
    let vlan = present(vlan_id)?;
    Some(match (present(outer_tag), present(remapped_id)) {
        (Some(outer), Some(remap)) => format!("{}/{}/({})", outer, vlan, remap),
        (Some(outer), None) => format!("{}/{}", outer, vlan),
        (None, Some(remap)) => format!("{}/({})", vlan, remap),
        (None, None) => vlan.to_string(),
    })
}

/// VLAN mode as reported, else inferred from which tags are set.
pub fn vlan_mode(entry: &SubscriberEntry) -> Option<String> {
    if let Some(mode) = &entry.tag_mode {
        let mode = mode.to_ascii_lowercase().replace(['_', ' '], "-");
        return Some(match mode.as_str() {
            "doubletag" | "qinq" => "double-tag".to_string(),
            _ => mode,
        });
    }
    if present(entry.outer_tag).is_some() {
        Some("double-tag".to_string())
    } else if present(entry.remapped_id).is_some() {
        Some("remap".to_string())
    } else if present(entry.vlan_id).is_some() {
        Some("tag".to_string())
    } else {
        None
    }
}

/// Row values for a subscriber; the endpoint and bandwidth ids are
/// resolved by the caller.
pub fn subscriber_values(entry: &SubscriberEntry) -> SubscriberValues {
    SubscriberValues {
        json_id: entry.id,
        uid: entry.uid,
        name: entry.name.clone(),
        endpoint_mac: entry.endpoint_mac.as_deref().map(normalize_mac),
        endpoint_id: None,
        port1: entry.port1.clone(),
        port2: entry.port2.clone(),
        vlan_id: entry.vlan_id,
        outer_tag: entry.outer_tag,
        remapped_id: entry.remapped_id,
        vlan_mode: vlan_mode(entry),
        vlan_display: vlan_display(entry.outer_tag, entry.vlan_id, entry.remapped_id),
        bandwidth_name: entry.bandwidth.clone(),
        bandwidth_id: None,
    }
}

pub fn port_values(entry: &PortEntry) -> PortValues {
    let sfp = entry.sfp.clone().unwrap_or_default();
    PortValues {
        interface: entry.interface.trim().to_string(),
        port_type: entry.port_type.clone(),
        link: entry.link.clone(),
        duplex: entry.duplex.clone(),
        speed: entry.speed.clone(),
        sfp_vendor: sfp.vendor,
        sfp_temperature: sfp.temperature,
        sfp_tx_power: sfp.tx_power,
        sfp_rx_power: sfp.rx_power,
    }
}

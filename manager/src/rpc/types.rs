//! Payload shapes exchanged with devices.
//!
//! Device firmware is loose about number encoding (`5` vs `"5"`) and about
//! key spelling, so the inbound types accept both through aliases and the
//! lenient helpers in [`de`]. A missing required key fails the whole list.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Integer from a JSON number or numeric string; empty values are `None`.
    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// Booleans, 0/1 and the usual state words.
    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => n.as_i64().map(|v| v != 0),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "up" | "yes" | "alive" | "online" => Some(true),
                "false" | "0" | "down" | "no" | "dead" | "offline" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    /// Strings, with numbers rendered and blanks dropped.
    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}

/// One item of `endpoint.brief.get`
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointBrief {
    #[serde(alias = "mac_address", alias = "macAddress")]
    pub mac: String,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub name: Option<String>,
    #[serde(default, alias = "confEndpointId", alias = "endpoint_id", deserialize_with = "de::opt_i64")]
    pub conf_endpoint_id: Option<i64>,
    #[serde(default, alias = "conf_port", deserialize_with = "de::opt_string")]
    pub port: Option<String>,
    #[serde(default, alias = "detectedPort", deserialize_with = "de::opt_string")]
    pub detected_port: Option<String>,
    #[serde(default, alias = "subscriberId", deserialize_with = "de::opt_i64")]
    pub subscriber_id: Option<i64>,
    #[serde(default, alias = "state", deserialize_with = "de::opt_bool")]
    pub alive: Option<bool>,
    #[serde(default, alias = "phyRate", deserialize_with = "de::opt_i64")]
    pub phy_rate: Option<i64>,
    #[serde(default, alias = "wireLength", deserialize_with = "de::opt_i64")]
    pub wire_length: Option<i64>,
    /// Port number to link state
    #[serde(default, alias = "link_states", alias = "portLinkStates")]
    pub port_link_states: Option<BTreeMap<String, String>>,
}

/// One item of `subscriber.get`
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberEntry {
    #[serde(default, alias = "json_id", deserialize_with = "de::opt_i64")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "de::opt_i64")]
    pub uid: Option<i64>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub name: Option<String>,
    #[serde(default, alias = "endpoint", alias = "mac", deserialize_with = "de::opt_string")]
    pub endpoint_mac: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub port1: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub port2: Option<String>,
    #[serde(default, alias = "vlan id", alias = "vlan", deserialize_with = "de::opt_i64")]
    pub vlan_id: Option<i64>,
    #[serde(
        default,
        alias = "outer tag",
        alias = "outer",
        alias = "outer_vlan",
        deserialize_with = "de::opt_i64"
    )]
    pub outer_tag: Option<i64>,
    #[serde(
        default,
        alias = "remapped id",
        alias = "remapped_vlan",
        alias = "remap",
        deserialize_with = "de::opt_i64"
    )]
    pub remapped_id: Option<i64>,
    #[serde(default, alias = "vlan_mode", alias = "mode", deserialize_with = "de::opt_string")]
    pub tag_mode: Option<String>,
    #[serde(default, alias = "bandwidth_name", alias = "bw_profile", deserialize_with = "de::opt_string")]
    pub bandwidth: Option<String>,
}

/// One item of `bandwidth.get`
#[derive(Debug, Clone, Deserialize)]
pub struct BandwidthEntry {
    pub name: String,
    #[serde(default, alias = "ds_rate", alias = "down", deserialize_with = "de::opt_i64")]
    pub downstream: Option<i64>,
    #[serde(default, alias = "us_rate", alias = "up", deserialize_with = "de::opt_i64")]
    pub upstream: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SfpInfo {
    #[serde(default, deserialize_with = "de::opt_string")]
    pub vendor: Option<String>,
    #[serde(default, deserialize_with = "de::opt_f64")]
    pub temperature: Option<f64>,
    #[serde(default, alias = "txPower", deserialize_with = "de::opt_f64")]
    pub tx_power: Option<f64>,
    #[serde(default, alias = "rxPower", deserialize_with = "de::opt_f64")]
    pub rx_power: Option<f64>,
}

/// One item of `port.status.get`
#[derive(Debug, Clone, Deserialize)]
pub struct PortEntry {
    #[serde(alias = "port", alias = "name")]
    pub interface: String,
    #[serde(default, rename = "type", alias = "port_type", deserialize_with = "de::opt_string")]
    pub port_type: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub duplex: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub speed: Option<String>,
    #[serde(default)]
    pub sfp: Option<SfpInfo>,
}

/// Result of `system.uptime.get`
#[derive(Debug, Clone, Deserialize)]
pub struct UptimeInfo {
    #[serde(deserialize_with = "de::opt_i64")]
    pub uptime: Option<i64>,
}

/// Subscriber binding pushed to a device by `subscriber.add`/`subscriber.set`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriberSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    pub endpoint_mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_tag: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remapped_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<String>,
}

/// Bandwidth profile pushed by `bandwidth.add`/`bandwidth.edit_by_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandwidthSpec {
    pub name: String,
    pub downstream: i64,
    pub upstream: i64,
}

/// Endpoint configuration pushed by `endpoint.add`/`endpoint.set`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_numbers_and_aliases() {
        let entry: SubscriberEntry = serde_json::from_value(json!({
            "json_id": "7",
            "name": "flat-12",
            "endpoint": "00:11:22:33:44:55",
            "vlan": 100,
            "outer": "0",
            "remap": ""
        }))
        .unwrap();

        assert_eq!(entry.id, Some(7));
        assert_eq!(entry.vlan_id, Some(100));
        assert_eq!(entry.outer_tag, Some(0));
        assert_eq!(entry.remapped_id, None);
        assert_eq!(entry.endpoint_mac.as_deref(), Some("00:11:22:33:44:55"));
    }

    #[test]
    fn endpoint_requires_mac() {
        let result: Result<Vec<EndpointBrief>, _> =
            serde_json::from_value(json!([{ "mac": "aa" }, { "port": "G.hn 1/1" }]));
        assert!(result.is_err());
    }
}

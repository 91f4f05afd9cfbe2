//! Database record types (entities).
//!
//! This module contains all the record structs used by the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Devices
// ============================================================================

/// One username/password pair for a legacy privilege level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub username: String,
    pub password: String,
}

/// Legacy multi-level credentials, indexed by privilege level 0-15.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelCredentials(pub BTreeMap<u8, CredentialPair>);

impl LevelCredentials {
    pub fn get(&self, level: u8) -> Option<&CredentialPair> {
        self.0.get(&level)
    }

    pub fn set(&mut self, level: u8, pair: CredentialPair) {
        self.0.insert(level, pair);
    }

    /// Pair with the highest privilege level
    pub fn highest(&self) -> Option<&CredentialPair> {
        self.0.values().next_back()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(raw: Option<&str>) -> Self {
        raw.and_then(|s| serde_json::from_str(s).ok())
            .map(LevelCredentials)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: i64,
    pub serial_number: String,
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub port: i64,
    pub scheme: String,
    // Credentials
    #[serde(skip_serializing)]
    pub rpc_username: Option<String>,
    #[serde(skip_serializing)]
    pub rpc_password: Option<String>,
    #[serde(skip_serializing)]
    pub announced_username: Option<String>,
    #[serde(skip_serializing)]
    pub announced_password: Option<String>,
    #[serde(skip_serializing)]
    pub credentials: LevelCredentials,
    // Identity and versions
    pub model: Option<String>,
    pub hardware_version: Option<String>,
    pub mac_address: Option<String>,
    pub software_version: Option<String>,
    pub firmware_version: Option<String>,
    pub swap_software_version: Option<String>,
    pub swap_firmware_version: Option<String>,
    // State
    pub is_online: bool,
    pub uptime: Option<i64>,
    pub read_only: bool,
    pub group_id: Option<i64>,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_announce: Option<DateTime<Utc>>,
    pub last_endpoint_sync: Option<DateTime<Utc>>,
    pub last_subscriber_sync: Option<DateTime<Utc>>,
    pub last_bandwidth_sync: Option<DateTime<Utc>>,
    pub last_port_sync: Option<DateTime<Utc>>,
    pub health_score: Option<f64>,
    pub health_status: Option<String>,
    // Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized device fields taken from one announcement. `None` means the
/// payload did not carry a non-empty value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnouncedDevice {
    pub serial_number: String,
    pub name: Option<String>,
    pub ip_address: Option<String>,
    pub port: Option<i64>,
    pub scheme: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub model: Option<String>,
    pub hardware_version: Option<String>,
    pub mac_address: Option<String>,
    pub software_version: Option<String>,
    pub firmware_version: Option<String>,
    pub swap_software_version: Option<String>,
    pub swap_firmware_version: Option<String>,
    pub uptime: Option<i64>,
}

// ============================================================================
// Inventory entities
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub id: i64,
    pub device_id: i64,
    pub mac_address: String,
    pub name: Option<String>,
    pub conf_endpoint_id: Option<i64>,
    pub conf_port: Option<String>,
    pub conf_subscriber_id: Option<i64>,
    pub detected_port: Option<String>,
    pub phy_rate: Option<i64>,
    pub wire_length: Option<i64>,
    pub port_link_states: Option<String>, // JSON object
    pub alive: bool,
    pub quarantined: bool,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub id: i64,
    pub device_id: i64,
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
    pub alive: bool,
    pub sync: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandwidthRecord {
    pub id: i64,
    pub device_id: i64,
    pub name: String,
    pub downstream: Option<i64>,
    pub upstream: Option<i64>,
    pub deleted: bool,
    pub sync: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortRecord {
    pub id: i64,
    pub device_id: i64,
    pub interface: String,
    pub port_type: Option<String>,
    pub link: Option<String>,
    pub duplex: Option<String>,
    pub speed: Option<String>,
    pub sfp_vendor: Option<String>,
    pub sfp_temperature: Option<f64>,
    pub sfp_tx_power: Option<f64>,
    pub sfp_rx_power: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Alarms
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "CR")]
    Critical,
    #[serde(rename = "MJ")]
    Major,
    #[serde(rename = "MN")]
    Minor,
    #[serde(rename = "NA")]
    NotAlarmed,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CR",
            Severity::Major => "MJ",
            Severity::Minor => "MN",
            Severity::NotAlarmed => "NA",
        }
    }

    /// Lenient parse used for device-supplied values; unknown input is NA.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(Severity::NotAlarmed)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CR" | "CRITICAL" => Ok(Severity::Critical),
            "MJ" | "MAJOR" => Ok(Severity::Major),
            "MN" | "MINOR" => Ok(Severity::Minor),
            "NA" | "NONE" | "NOT_ALARMED" => Ok(Severity::NotAlarmed),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub id: i64,
    pub device_id: i64,
    pub gam_id: String,
    pub condition_type: Option<String>,
    pub interface: Option<String>,
    pub severity: Severity,
    pub service_affecting: bool,
    pub details: Option<String>,
    pub is_manual: bool,
    pub opening_date: DateTime<Utc>,
    pub closing_date: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
}

impl AlarmRecord {
    pub fn is_open(&self) -> bool {
        self.closing_date.is_none()
    }
}

// ============================================================================
// Sync and health history
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Endpoints,
    Subscribers,
    Bandwidths,
    Ports,
}

impl SyncKind {
    pub const ALL: [SyncKind; 4] = [
        SyncKind::Endpoints,
        SyncKind::Subscribers,
        SyncKind::Bandwidths,
        SyncKind::Ports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Endpoints => "endpoints",
            SyncKind::Subscribers => "subscribers",
            SyncKind::Bandwidths => "bandwidths",
            SyncKind::Ports => "ports",
        }
    }

    /// Device column holding the last successful sync of this kind
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            SyncKind::Endpoints => "last_endpoint_sync",
            SyncKind::Subscribers => "last_subscriber_sync",
            SyncKind::Bandwidths => "last_bandwidth_sync",
            SyncKind::Ports => "last_port_sync",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown sync kind '{}'", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAttemptRecord {
    pub device_id: i64,
    pub kind: SyncKind,
    pub success: bool,
    pub duration_ms: i64,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceHealthHistoryRecord {
    pub device_id: i64,
    pub score: f64,
    pub status: String,
    pub success_rate: f64,
    pub avg_response_ms: Option<f64>,
    pub open_alarms: i64,
    pub uptime: Option<i64>,
    pub recorded_at: DateTime<Utc>,
}

// ============================================================================
// External lookups and audit
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStatus {
    Pending,
    Found,
    Expired,
}

impl LookupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupStatus::Pending => "pending",
            LookupStatus::Found => "found",
            LookupStatus::Expired => "expired",
        }
    }
}

impl FromStr for LookupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LookupStatus::Pending),
            "found" => Ok(LookupStatus::Found),
            "expired" => Ok(LookupStatus::Expired),
            other => Err(format!("unknown lookup status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointLookupRecord {
    pub id: i64,
    pub mac_address: String,
    pub device_id: i64,
    pub status: LookupStatus,
    pub attempts: i64,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRecord {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub target: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettingRecord {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

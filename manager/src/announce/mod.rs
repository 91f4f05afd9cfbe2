//! Device announcements.
//!
//! Devices call in periodically with a JSON object whose key casing and
//! field set vary by firmware. Normalization reads every logical field
//! through an ordered alias table, then the ingestor upserts the device and
//! hands the embedded alarm snapshot to the alarm manager.

pub mod fields;
pub mod ingestor;

pub use fields::FieldLookup;
pub use ingestor::{AnnounceContext, AnnounceOutcome, AnnouncementIngestor};

use serde_json::Value;

use crate::database::AnnouncedDevice;
use crate::errors::AnnounceError;

/// Canonical name first, then aliases seen in the field.
pub mod aliases {
    pub const SERIAL_NUMBER: &[&str] = &["SerialNumber", "SN", "Serial"];
    pub const NAME: &[&str] = &["Name", "DeviceName", "Hostname"];
    pub const IP_ADDRESS: &[&str] = &["IPAddress", "IP", "IpAddr"];
    pub const PORT: &[&str] = &["Port", "HttpsPort"];
    pub const SCHEME: &[&str] = &["Scheme", "Protocol"];
    pub const USERNAME: &[&str] = &["UserName", "Username", "User"];
    pub const PASSWORD: &[&str] = &["Password", "Pass"];
    pub const MODEL: &[&str] = &["Model", "ModelName", "ProductClass"];
    pub const HARDWARE_VERSION: &[&str] = &["HardwareVersion", "HWVersion"];
    pub const MAC_ADDRESS: &[&str] = &["MACAddress", "MAC"];
    pub const SOFTWARE_VERSION: &[&str] = &["SoftwareVersion", "SWVersion"];
    pub const FIRMWARE_VERSION: &[&str] = &["FirmwareVersion", "FWVersion"];
    pub const SWAP_SOFTWARE_VERSION: &[&str] = &["SwapSoftwareVersion", "SoftwareVersionSwap"];
    pub const SWAP_FIRMWARE_VERSION: &[&str] = &["SwapFirmwareVersion", "FirmwareVersionSwap"];
    pub const UPTIME: &[&str] = &["Uptime", "UpTime"];
    pub const ACTIVE_ALARMS: &[&str] = &["activeAlarms", "Alarms"];
}

/// An announcement reduced to the fields the controller stores.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAnnouncement {
    pub device: AnnouncedDevice,
    /// `None` when the payload carried no alarm list at all
    pub active_alarms: Option<Vec<Value>>,
}

/// Normalize a raw announcement body.
pub fn normalize(payload: &Value) -> Result<NormalizedAnnouncement, AnnounceError> {
    let object = payload.as_object().ok_or(AnnounceError::NotAnObject)?;
    let fields = FieldLookup::new(object);

    let serial_number = fields
        .string(aliases::SERIAL_NUMBER)
        .ok_or(AnnounceError::MissingSerial)?;

    let scheme = fields
        .string(aliases::SCHEME)
        .map(|s| s.to_ascii_lowercase())
        .filter(|s| s == "http" || s == "https");

    let device = AnnouncedDevice {
        serial_number,
        name: fields.string(aliases::NAME),
        ip_address: fields.string(aliases::IP_ADDRESS),
        port: fields.integer(aliases::PORT).filter(|p| (1..=65535).contains(p)),
        scheme,
        username: fields.string(aliases::USERNAME),
        password: fields.string(aliases::PASSWORD),
        model: fields.string(aliases::MODEL),
        hardware_version: fields.string(aliases::HARDWARE_VERSION),
        mac_address: fields.string(aliases::MAC_ADDRESS),
        software_version: fields.string(aliases::SOFTWARE_VERSION),
        firmware_version: fields.string(aliases::FIRMWARE_VERSION),
        swap_software_version: fields.string(aliases::SWAP_SOFTWARE_VERSION),
        swap_firmware_version: fields.string(aliases::SWAP_FIRMWARE_VERSION),
        uptime: fields.integer(aliases::UPTIME),
    };

    let active_alarms = match fields.present(aliases::ACTIVE_ALARMS) {
        Some(Value::Array(items)) => Some(items.clone()),
        // A single alarm object is treated as a one-item list
        Some(item @ Value::Object(_)) => Some(vec![item.clone()]),
        Some(Value::Null) => Some(Vec::new()),
        _ => None,
    };

    Ok(NormalizedAnnouncement {
        device,
        active_alarms,
    })
}

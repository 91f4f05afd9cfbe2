//! Payload builders and device registration helpers

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};

use super::mock_device::{MockDevice, DEVICE_PASSWORD, DEVICE_USER};
use gam_manager::database::{upsert_announced_device, AnnouncedDevice, Database};

/// Minimal announcement for `serial`
pub fn announcement(serial: &str) -> Value {
    json!({
        "SerialNumber": serial,
        "IPAddress": "10.10.0.5",
        "Model": "GAM-4-CX",
        "SoftwareVersion": "2.4.1",
        "UserName": DEVICE_USER,
        "Password": DEVICE_PASSWORD
    })
}

/// Announcement pointing the controller at a mock device
pub fn announcement_for(serial: &str, device: &MockDevice) -> Value {
    json!({
        "SerialNumber": serial,
        "IPAddress": device.host(),
        "Port": device.port(),
        "Scheme": "http",
        "Model": "GAM-4-CX",
        "UserName": DEVICE_USER,
        "Password": DEVICE_PASSWORD
    })
}

/// Register a device reachable at the mock, returning its id
pub async fn register_device(database: &Database, serial: &str, device: &MockDevice) -> Result<i64> {
    let announced = AnnouncedDevice {
        serial_number: serial.to_string(),
        ip_address: Some(device.host()),
        port: Some(device.port() as i64),
        scheme: Some("http".to_string()),
        username: Some(DEVICE_USER.to_string()),
        password: Some(DEVICE_PASSWORD.to_string()),
        model: Some("GAM-4-CX".to_string()),
        ..Default::default()
    };
    let mut tx = database.begin().await?;
    let (id, _) = upsert_announced_device(&mut tx, &announced, None, Utc::now()).await?;
    tx.commit().await?;
    Ok(id)
}

/// Register a device with no credentials anywhere
pub async fn register_bare_device(database: &Database, serial: &str) -> Result<i64> {
    let announced = AnnouncedDevice {
        serial_number: serial.to_string(),
        ip_address: Some("10.10.0.9".to_string()),
        ..Default::default()
    };
    let mut tx = database.begin().await?;
    let (id, _) = upsert_announced_device(&mut tx, &announced, None, Utc::now()).await?;
    tx.commit().await?;
    Ok(id)
}

pub fn endpoint(mac: &str, conf_id: Option<i64>, port: &str) -> Value {
    json!({
        "mac": mac,
        "conf_endpoint_id": conf_id,
        "port": port,
        "detected_port": port,
        "alive": true,
        "phy_rate": 1200
    })
}

pub fn bandwidth(name: &str, down: i64, up: i64) -> Value {
    json!({ "name": name, "downstream": down, "upstream": up })
}

pub fn subscriber(id: i64, name: &str, endpoint_mac: &str, bandwidth: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "endpoint_mac": endpoint_mac,
        "port1": "G.hn 1/1",
        "vlan_id": 100,
        "bandwidth": bandwidth
    })
}

pub fn port(interface: &str, link: &str) -> Value {
    json!({ "interface": interface, "type": "G.hn", "link": link })
}

pub fn los_alarm(interface: &str, severity: &str) -> Value {
    json!({ "condType": "LOS", "ifDescr": interface, "severity": severity, "serviceAffecting": "SA" })
}

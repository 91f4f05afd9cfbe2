//! Typed wrappers, one per device operation.
//!
//! Getters hand back the raw `result` value; mapping it into the entity
//! model is the job of the sync passes, which report shape problems as
//! mapping failures rather than RPC failures.

use serde_json::{json, Value};

use super::client::GamRpcClient;
use super::types::{BandwidthSpec, EndpointSpec, SubscriberSpec};
use crate::errors::RpcError;

/// Device firmware method names.
pub mod method {
    pub const ENDPOINT_BRIEF_GET: &str = "endpoint.brief.get";
    pub const ENDPOINT_DETAIL_GET: &str = "endpoint.detail.get";
    pub const ENDPOINT_ADD: &str = "endpoint.add";
    pub const ENDPOINT_SET: &str = "endpoint.set";
    pub const ENDPOINT_DEL: &str = "endpoint.del";
    pub const ENDPOINT_LINK_STATUS_GET: &str = "endpoint.linkstatus.get";
    pub const ENDPOINT_POE_SET: &str = "endpoint.poe.set";
    pub const ENDPOINT_REBOOT: &str = "endpoint.reboot";

    pub const SUBSCRIBER_GET: &str = "subscriber.get";
    pub const SUBSCRIBER_ADD: &str = "subscriber.add";
    pub const SUBSCRIBER_SET: &str = "subscriber.set";
    pub const SUBSCRIBER_DEL: &str = "subscriber.del";

    pub const BANDWIDTH_GET: &str = "bandwidth.get";
    pub const BANDWIDTH_ADD: &str = "bandwidth.add";
    pub const BANDWIDTH_EDIT_BY_NAME: &str = "bandwidth.edit_by_name";
    pub const BANDWIDTH_DEL_BY_NAME: &str = "bandwidth.del_by_name";

    pub const PORT_STATUS_GET: &str = "port.status.get";
    pub const PORT_CONFIG_GET: &str = "port.config.get";
    pub const PORT_CONFIG_SET: &str = "port.config.set";

    pub const GHN_GLOBAL_GET: &str = "ghn.global.get";
    pub const GHN_GLOBAL_SET: &str = "ghn.global.set";
    pub const GHN_PORT_GET: &str = "ghn.port.get";
    pub const GHN_PORT_SET: &str = "ghn.port.set";

    pub const SYSTEM_UPTIME_GET: &str = "system.uptime.get";
    pub const TIMEZONE_GET: &str = "system.timezone.get";
    pub const TIMEZONE_SET: &str = "system.timezone.set";
    pub const NTP_GET: &str = "system.ntp.get";
    pub const NTP_SET: &str = "system.ntp.set";

    pub const CONFIG_COPY: &str = "config.copy";
    pub const CONFIG_DOWNLOAD: &str = "config.download";
    pub const CONFIG_UPLOAD: &str = "config.upload";

    pub const FIRMWARE_IMAGE_UPLOAD: &str = "firmware.image_upload";
    pub const FIRMWARE_SWAP: &str = "firmware.swap";
    pub const FIRMWARE_CONFIG_COPY: &str = "firmware.config_copy";

    pub const DISCOVERY_TARGET_GET: &str = "discovery_agent.target.get";
    pub const DISCOVERY_TARGET_SET: &str = "discovery_agent.target.set";
    pub const DISCOVERY_GLOBAL_GET: &str = "discovery_agent.global.get";
    pub const DISCOVERY_GLOBAL_SET: &str = "discovery_agent.global.set";

    pub const SIGNAL_MEASUREMENT_GET: &str = "signal.measurement.get";
}

/// Configuration stores understood by `config.copy`
pub const RUNNING_CONFIG: &str = "running-config";
pub const STARTUP_CONFIG: &str = "startup-config";

impl GamRpcClient {
    // Endpoints

    pub async fn endpoint_brief_get(&self) -> Result<Value, RpcError> {
        self.call(method::ENDPOINT_BRIEF_GET, json!({})).await
    }

    pub async fn endpoint_detail_get(&self, mac: &str) -> Result<Value, RpcError> {
        self.call(method::ENDPOINT_DETAIL_GET, json!({ "mac": mac })).await
    }

    pub async fn endpoint_add(&self, spec: &EndpointSpec) -> Result<Value, RpcError> {
        self.call(method::ENDPOINT_ADD, json!(spec)).await
    }

    pub async fn endpoint_set(&self, spec: &EndpointSpec) -> Result<Value, RpcError> {
        self.call(method::ENDPOINT_SET, json!(spec)).await
    }

    pub async fn endpoint_del(&self, mac: &str) -> Result<Value, RpcError> {
        self.call(method::ENDPOINT_DEL, json!({ "mac": mac })).await
    }

    pub async fn endpoint_link_status_get(&self, mac: &str) -> Result<Value, RpcError> {
        self.call(method::ENDPOINT_LINK_STATUS_GET, json!({ "mac": mac }))
            .await
    }

    pub async fn endpoint_poe_set(&self, mac: &str, port: &str, enabled: bool) -> Result<Value, RpcError> {
        self.call(
            method::ENDPOINT_POE_SET,
            json!({ "mac": mac, "port": port, "enabled": enabled }),
        )
        .await
    }

    pub async fn endpoint_reboot(&self, mac: &str) -> Result<Value, RpcError> {
        self.call(method::ENDPOINT_REBOOT, json!({ "mac": mac })).await
    }

    // Subscribers

    pub async fn subscriber_get(&self) -> Result<Value, RpcError> {
        self.call(method::SUBSCRIBER_GET, json!({})).await
    }

    pub async fn subscriber_add(&self, spec: &SubscriberSpec) -> Result<Value, RpcError> {
        self.call(method::SUBSCRIBER_ADD, json!(spec)).await
    }

    pub async fn subscriber_set(&self, id: i64, spec: &SubscriberSpec) -> Result<Value, RpcError> {
        let mut params = json!(spec);
        params["id"] = json!(id);
        self.call(method::SUBSCRIBER_SET, params).await
    }

    pub async fn subscriber_del(&self, id: i64) -> Result<Value, RpcError> {
        self.call(method::SUBSCRIBER_DEL, json!({ "id": id })).await
    }

    // Bandwidth profiles

    pub async fn bandwidth_get(&self) -> Result<Value, RpcError> {
        self.call(method::BANDWIDTH_GET, json!({})).await
    }

    pub async fn bandwidth_add(&self, spec: &BandwidthSpec) -> Result<Value, RpcError> {
        self.call(method::BANDWIDTH_ADD, json!(spec)).await
    }

    pub async fn bandwidth_edit_by_name(&self, spec: &BandwidthSpec) -> Result<Value, RpcError> {
        self.call(method::BANDWIDTH_EDIT_BY_NAME, json!(spec)).await
    }

    pub async fn bandwidth_del_by_name(&self, name: &str) -> Result<Value, RpcError> {
        self.call(method::BANDWIDTH_DEL_BY_NAME, json!({ "name": name }))
            .await
    }

    // Ports

    pub async fn port_status_get(&self) -> Result<Value, RpcError> {
        self.call(method::PORT_STATUS_GET, json!({})).await
    }

    pub async fn port_config_get(&self, interface: &str) -> Result<Value, RpcError> {
        self.call(method::PORT_CONFIG_GET, json!({ "interface": interface }))
            .await
    }

    pub async fn port_config_set(&self, interface: &str, config: Value) -> Result<Value, RpcError> {
        self.call(
            method::PORT_CONFIG_SET,
            json!({ "interface": interface, "config": config }),
        )
        .await
    }

    // G.hn

    pub async fn ghn_global_get(&self) -> Result<Value, RpcError> {
        self.call(method::GHN_GLOBAL_GET, json!({})).await
    }

    pub async fn ghn_global_set(&self, config: Value) -> Result<Value, RpcError> {
        self.call(method::GHN_GLOBAL_SET, config).await
    }

    pub async fn ghn_port_get(&self, port: &str) -> Result<Value, RpcError> {
        self.call(method::GHN_PORT_GET, json!({ "port": port })).await
    }

    pub async fn ghn_port_set(&self, port: &str, config: Value) -> Result<Value, RpcError> {
        self.call(method::GHN_PORT_SET, json!({ "port": port, "config": config }))
            .await
    }

    // System

    pub async fn system_uptime_get(&self) -> Result<Value, RpcError> {
        self.call(method::SYSTEM_UPTIME_GET, json!({})).await
    }

    pub async fn timezone_get(&self) -> Result<Value, RpcError> {
        self.call(method::TIMEZONE_GET, json!({})).await
    }

    pub async fn timezone_set(&self, timezone: &str) -> Result<Value, RpcError> {
        self.call(method::TIMEZONE_SET, json!({ "timezone": timezone }))
            .await
    }

    pub async fn ntp_get(&self) -> Result<Value, RpcError> {
        self.call(method::NTP_GET, json!({})).await
    }

    pub async fn ntp_set(&self, config: Value) -> Result<Value, RpcError> {
        self.call(method::NTP_SET, config).await
    }

    // Configuration

    pub async fn config_copy(&self, source: &str, destination: &str) -> Result<Value, RpcError> {
        self.call(
            method::CONFIG_COPY,
            json!({ "source": source, "destination": destination }),
        )
        .await
    }

    /// Persist the running configuration so it survives a reboot.
    pub async fn save_config(&self) -> Result<Value, RpcError> {
        self.config_copy(RUNNING_CONFIG, STARTUP_CONFIG).await
    }

    pub async fn config_download(&self, url: &str) -> Result<Value, RpcError> {
        self.call(method::CONFIG_DOWNLOAD, json!({ "url": url })).await
    }

    pub async fn config_upload(&self, url: &str) -> Result<Value, RpcError> {
        self.call(method::CONFIG_UPLOAD, json!({ "url": url })).await
    }

    // Firmware

    pub async fn firmware_image_upload(&self, url: &str) -> Result<Value, RpcError> {
        self.call(method::FIRMWARE_IMAGE_UPLOAD, json!({ "url": url }))
            .await
    }

    pub async fn firmware_swap(&self) -> Result<Value, RpcError> {
        self.call(method::FIRMWARE_SWAP, json!({})).await
    }

    pub async fn firmware_config_copy(&self) -> Result<Value, RpcError> {
        self.call(method::FIRMWARE_CONFIG_COPY, json!({})).await
    }

    // Discovery agent

    pub async fn discovery_target_get(&self) -> Result<Value, RpcError> {
        self.call(method::DISCOVERY_TARGET_GET, json!({})).await
    }

    pub async fn discovery_target_set(&self, config: Value) -> Result<Value, RpcError> {
        self.call(method::DISCOVERY_TARGET_SET, config).await
    }

    pub async fn discovery_global_get(&self) -> Result<Value, RpcError> {
        self.call(method::DISCOVERY_GLOBAL_GET, json!({})).await
    }

    pub async fn discovery_global_set(&self, config: Value) -> Result<Value, RpcError> {
        self.call(method::DISCOVERY_GLOBAL_SET, config).await
    }

    // Diagnostics

    /// The one call that takes a numeric port index instead of the
    /// device-native string; see [`super::ports::port_index`].
    pub async fn signal_measurement_get(&self, port_index: u32) -> Result<Value, RpcError> {
        self.call(method::SIGNAL_MEASUREMENT_GET, json!({ "port": port_index }))
            .await
    }
}

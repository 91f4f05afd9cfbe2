//! JSON-RPC 2.0 client bound to a single device.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::rpc;
use crate::database::DeviceRecord;
use crate::errors::{ClientError, RpcError};

/// Transport settings shared by every device client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: rpc::DEFAULT_CALL_TIMEOUT,
        }
    }
}

impl ClientOptions {
    pub fn with_timeout_secs(seconds: u64) -> Self {
        Self {
            timeout: Duration::from_secs(seconds.max(1)),
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a Value,
    id: u64,
}

/// Credential pair used for a device: per-device override first, then the
/// pair the device announced with, then the highest legacy level.
pub fn resolve_credentials(device: &DeviceRecord) -> Option<(String, String)> {
    if let Some(username) = device.rpc_username.as_deref().filter(|u| !u.is_empty()) {
        return Some((
            username.to_string(),
            device.rpc_password.clone().unwrap_or_default(),
        ));
    }
    if let Some(username) = device.announced_username.as_deref().filter(|u| !u.is_empty()) {
        return Some((
            username.to_string(),
            device.announced_password.clone().unwrap_or_default(),
        ));
    }
    device
        .credentials
        .highest()
        .map(|pair| (pair.username.clone(), pair.password.clone()))
}

pub struct GamRpcClient {
    http: Client,
    url: String,
    host: String,
    username: String,
    password: String,
    next_id: AtomicU64,
}

impl GamRpcClient {
    /// Build a client for a stored device.
    pub fn for_device(device: &DeviceRecord, options: &ClientOptions) -> Result<Self, ClientError> {
        let host = device
            .ip_address
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| ClientError::MissingAddress {
                serial: device.serial_number.clone(),
            })?;

        let scheme = device.scheme.to_ascii_lowercase();
        if scheme != "https" && scheme != "http" {
            return Err(ClientError::UnsupportedScheme {
                serial: device.serial_number.clone(),
                scheme: device.scheme.clone(),
            });
        }

        let (username, password) =
            resolve_credentials(device).ok_or_else(|| ClientError::MissingCredentials {
                serial: device.serial_number.clone(),
            })?;

        let base_url = format!("{}://{}:{}", scheme, host.trim(), device.port);
        Self::new(&base_url, username, password, options)
    }

    /// Build a client for an explicit base URL such as `https://10.0.0.5:443`.
    pub fn new(
        base_url: &str,
        username: String,
        password: String,
        options: &ClientOptions,
    ) -> Result<Self, ClientError> {
        // Devices ship self-signed certificates
        let http = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(rpc::CONNECT_TIMEOUT.min(options.timeout))
            .user_agent(rpc::USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        let base = base_url.trim_end_matches('/');
        let host = base
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(base)
            .to_string();

        Ok(Self {
            http,
            url: format!("{}{}", base, rpc::ENDPOINT_PATH),
            host,
            username,
            password,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Perform one JSON-RPC call and return its `result`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: rpc::JSONRPC_VERSION,
            method,
            params: &params,
            id,
        };

        debug!("RPC {} -> {} (id {})", method, self.host, id);

        let response = self
            .http
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("RPC {} to {} returned HTTP {}", method, self.host, status);
            return Err(RpcError::HttpStatus {
                host: self.host.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| RpcError::Transport {
            host: self.host.clone(),
            reason: e.to_string(),
        })?;

        self.parse_envelope(method, status, &body)
    }

    fn parse_envelope(&self, method: &str, status: StatusCode, body: &[u8]) -> Result<Value, RpcError> {
        let envelope: Value = serde_json::from_slice(body).map_err(|e| RpcError::Decode {
            host: self.host.clone(),
            reason: format!("HTTP {} body is not JSON: {}", status.as_u16(), e),
        })?;

        let Value::Object(mut fields) = envelope else {
            return Err(RpcError::Decode {
                host: self.host.clone(),
                reason: "response is not a JSON object".to_string(),
            });
        };

        // A non-null error wins even when a result is also present
        match fields.remove("error") {
            None | Some(Value::Null) => {}
            Some(error) => {
                let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                return Err(RpcError::Protocol {
                    method: method.to_string(),
                    code,
                    message,
                });
            }
        }

        fields.remove("result").ok_or_else(|| RpcError::Decode {
            host: self.host.clone(),
            reason: "response has neither result nor error".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{CredentialPair, LevelCredentials};
    use chrono::Utc;

    fn device() -> DeviceRecord {
        DeviceRecord {
            id: 1,
            serial_number: "SN1".into(),
            name: None,
            ip_address: Some("10.0.0.5".into()),
            port: 443,
            scheme: "https".into(),
            rpc_username: None,
            rpc_password: None,
            announced_username: None,
            announced_password: None,
            credentials: LevelCredentials::default(),
            model: None,
            hardware_version: None,
            mac_address: None,
            software_version: None,
            firmware_version: None,
            swap_software_version: None,
            swap_firmware_version: None,
            is_online: true,
            uptime: None,
            read_only: false,
            group_id: None,
            last_seen: None,
            last_announce: None,
            last_endpoint_sync: None,
            last_subscriber_sync: None,
            last_bandwidth_sync: None,
            last_port_sync: None,
            health_score: None,
            health_status: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn credential_precedence() {
        let mut d = device();
        assert_eq!(resolve_credentials(&d), None);

        d.credentials.set(
            15,
            CredentialPair {
                username: "legacy".into(),
                password: "l".into(),
            },
        );
        assert_eq!(resolve_credentials(&d).map(|c| c.0), Some("legacy".to_string()));

        d.announced_username = Some("announced".into());
        d.announced_password = Some("a".into());
        assert_eq!(resolve_credentials(&d).map(|c| c.0), Some("announced".to_string()));

        d.rpc_username = Some("override".into());
        assert_eq!(resolve_credentials(&d).map(|c| c.0), Some("override".to_string()));
    }

    #[test]
    fn construction_requires_address_and_credentials() {
        let mut d = device();
        assert!(matches!(
            GamRpcClient::for_device(&d, &ClientOptions::default()),
            Err(ClientError::MissingCredentials { .. })
        ));

        d.announced_username = Some("admin".into());
        d.ip_address = None;
        assert!(matches!(
            GamRpcClient::for_device(&d, &ClientOptions::default()),
            Err(ClientError::MissingAddress { .. })
        ));
    }

    #[test]
    fn error_field_wins_over_result() {
        let client = GamRpcClient::new(
            "https://10.0.0.5:443",
            "admin".into(),
            "pw".into(),
            &ClientOptions::default(),
        )
        .unwrap();

        let body = br#"{"jsonrpc":"2.0","id":1,"result":[],"error":{"code":-32000,"message":"busy"}}"#;
        match client.parse_envelope("endpoint.brief.get", StatusCode::OK, body) {
            Err(RpcError::Protocol { code, message, .. }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "busy");
            }
            other => panic!("expected protocol error, got {:?}", other),
        }

        let ok = br#"{"jsonrpc":"2.0","id":2,"result":{"uptime":5},"error":null}"#;
        let result = client.parse_envelope("system.uptime.get", StatusCode::OK, ok).unwrap();
        assert_eq!(result["uptime"], 5);
    }
}

//! Mock GAM device for testing
//!
//! Answers JSON-RPC calls on `/jsonrpc`, one mock per method, so tests can
//! make individual passes succeed or fail.

use serde_json::{json, Value};
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const DEVICE_USER: &str = "admin";
pub const DEVICE_PASSWORD: &str = "gam-secret";

pub struct MockDevice {
    pub server: MockServer,
    pub base_url: String,
}

impl MockDevice {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    pub fn host(&self) -> String {
        self.server.address().ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.server.address().port()
    }

    fn for_method(rpc_method: &str) -> wiremock::MockBuilder {
        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .and(body_partial_json(json!({ "method": rpc_method })))
    }

    /// Successful call returning `result`
    pub async fn respond(&self, rpc_method: &str, result: Value) {
        Self::for_method(rpc_method)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": result
            })))
            .mount(&self.server)
            .await;
    }

    /// JSON-RPC error object with HTTP 200
    pub async fn respond_rpc_error(&self, rpc_method: &str, code: i64, message: &str) {
        Self::for_method(rpc_method)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": code, "message": message }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn respond_status(&self, rpc_method: &str, status: u16) {
        Self::for_method(rpc_method)
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Every call fails with HTTP 503
    pub async fn fail_everything(&self) {
        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&self.server)
            .await;
    }

    /// Mount the four getters and uptime with the given inventory
    pub async fn serve_inventory(&self, endpoints: Value, bandwidths: Value, subscribers: Value, ports: Value) {
        self.respond("endpoint.brief.get", endpoints).await;
        self.respond("bandwidth.get", bandwidths).await;
        self.respond("subscriber.get", subscribers).await;
        self.respond("port.status.get", ports).await;
        self.respond("system.uptime.get", json!({ "uptime": 90_000 })).await;
    }

    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// JSON-RPC method names received so far, in order
    pub async fn received_methods(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|request| request.body_json::<Value>().ok())
            .filter_map(|body| body.get("method").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

// Device announcement endpoint

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::{debug, error, warn};

use crate::announce::AnnounceContext;
use crate::constants::limits::MAX_ANNOUNCE_BODY_BYTES;
use crate::errors::AnnounceError;
use crate::web::AppState;

/// Decode an `Authorization: Basic ...` header into its user/password pair.
pub fn basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = raw
        .strip_prefix("Basic ")
        .or_else(|| raw.strip_prefix("basic "))?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

fn reply(status: StatusCode, body: Value) -> (StatusCode, Json<Value>) {
    (status, Json(body))
}

fn rejection(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    reply(status, json!({ "status": "error", "message": message.into() }))
}

/// `PUT /api/devices/announce`
///
/// Devices expect a bare `{status, serial_number}` reply rather than the
/// admin envelope.
pub async fn announce_device(State(state): State<AppState>, request: Request) -> (StatusCode, Json<Value>) {
    let (parts, body) = request.into_parts();
    let context = AnnounceContext {
        observed_address: parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
        forwarded_for: forwarded_for(&parts.headers),
        basic_auth: basic_auth(&parts.headers),
    };

    let bytes = match axum::body::to_bytes(body, MAX_ANNOUNCE_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Announcement body rejected: {}", e);
            return rejection(StatusCode::PAYLOAD_TOO_LARGE, "announcement body too large");
        }
    };

    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("Malformed announcement from {:?}: {}", context.observed_address, e);
            return rejection(StatusCode::BAD_REQUEST, format!("malformed JSON: {}", e));
        }
    };

    match state.ingestor.ingest(&payload, &context).await {
        Ok(outcome) => reply(
            StatusCode::OK,
            json!({ "status": "ok", "serial_number": outcome.serial_number }),
        ),
        Err(AnnounceError::Unauthorized) => {
            warn!("Announcement with rejected credentials from {:?}", context.observed_address);
            rejection(StatusCode::UNAUTHORIZED, AnnounceError::Unauthorized.to_string())
        }
        Err(e @ (AnnounceError::NotAnObject | AnnounceError::MissingSerial)) => {
            rejection(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ AnnounceError::Storage(_)) => {
            error!("Failed to ingest announcement: {}", e);
            rejection(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

//! Error taxonomy for device communication.
//!
//! Transport failures, protocol failures and reconciliation failures are
//! kept as distinct variants so callers can tell a device that could not be
//! reached from a device that answered with an error.

use thiserror::Error;

/// Failure of a single JSON-RPC call to a device
#[derive(Debug, Error)]
pub enum RpcError {
    /// Connection refused, DNS failure, timeout or TLS error
    #[error("transport error reaching {host}: {reason}")]
    Transport { host: String, reason: String },

    /// Device answered with a non-2xx HTTP status
    #[error("device {host} returned HTTP {status}")]
    HttpStatus { host: String, status: u16 },

    /// Device answered with a JSON-RPC error object
    #[error("RPC error {code} from {method}: {message}")]
    Protocol {
        method: String,
        code: i64,
        message: String,
    },

    /// Body was not a valid JSON-RPC response
    #[error("invalid RPC response from {host}: {reason}")]
    Decode { host: String, reason: String },
}

impl RpcError {
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Transport { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, RpcError::Protocol { .. })
    }
}

/// Reasons a client for a device cannot be built
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("device {serial} has no network address")]
    MissingAddress { serial: String },

    #[error("device {serial} has no usable credentials")]
    MissingCredentials { serial: String },

    #[error("unsupported scheme '{scheme}' for device {serial}")]
    UnsupportedScheme { serial: String, scheme: String },

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

/// Failure of one reconciliation pass
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Payload arrived but could not be mapped into the entity model
    #[error("cannot map {entity} payload: {reason}")]
    Mapping { entity: &'static str, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl SyncError {
    pub fn mapping(entity: &'static str, reason: impl Into<String>) -> Self {
        SyncError::Mapping {
            entity,
            reason: reason.into(),
        }
    }
}

/// Hard failure of a whole-device sync. Per-pass failures are reported in
/// the sync report instead.
#[derive(Debug, Error)]
pub enum DeviceSyncError {
    #[error("device {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Rejected or failed announcement
#[derive(Debug, Error)]
pub enum AnnounceError {
    #[error("announcement body is not a JSON object")]
    NotAnObject,

    #[error("announcement has no serial number")]
    MissingSerial,

    #[error("announcement credentials rejected")]
    Unauthorized,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("alarm {0} not found")]
    NotFound(i64),

    #[error("alarm '{gam_id}' is already open on this device")]
    AlreadyOpen { gam_id: String },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Unknown device-native port identifier
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("unknown port identifier '{0}'")]
    UnknownName(String),

    #[error("no port has index {0}")]
    UnknownIndex(u32),
}

/// Errors surfaced by administrative device operations
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("device {0} is read-only")]
    ReadOnly(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Port(#[from] PortError),

    /// A multi-step operation stopped at `step`; earlier steps stay applied
    #[error("step '{step}' failed: {source}")]
    StepFailed {
        step: &'static str,
        completed: Vec<&'static str>,
        #[source]
        source: RpcError,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<DeviceSyncError> for OperationError {
    fn from(err: DeviceSyncError) -> Self {
        match err {
            DeviceSyncError::NotFound(id) => OperationError::DeviceNotFound(id.to_string()),
            DeviceSyncError::Client(e) => OperationError::Client(e),
            DeviceSyncError::Storage(e) => OperationError::Storage(e),
        }
    }
}

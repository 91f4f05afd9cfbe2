pub mod manager;
pub mod settings;

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, rpc};

pub use manager::ConfigManager;
pub use settings::{RuntimeSettings, SettingsStore};

/// Static configuration loaded from `config/main.toml` at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_seconds: u64,
    #[serde(default)]
    pub announce: AnnounceAuthConfig,
    /// Seed values for the runtime settings table; existing rows win
    #[serde(default)]
    pub settings: RuntimeSettings,
}

/// Basic Auth account devices present when announcing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnounceAuthConfig {
    /// When false, legacy devices may announce without credentials
    #[serde(default)]
    pub auth_required: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            rpc_timeout_seconds: default_rpc_timeout(),
            announce: AnnounceAuthConfig::default(),
            settings: RuntimeSettings::default(),
        }
    }
}

fn default_host() -> String {
    defaults::HTTP_HOST.to_string()
}

fn default_port() -> u16 {
    defaults::HTTP_PORT
}

fn default_database_path() -> String {
    defaults::DATABASE_PATH.to_string()
}

fn default_rpc_timeout() -> u64 {
    rpc::DEFAULT_CALL_TIMEOUT.as_secs()
}

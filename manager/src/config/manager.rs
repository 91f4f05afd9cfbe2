use super::Config;
use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_dir: String) -> Result<Self> {
        let config = Self::load_configuration(&config_dir).await?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_dir: &str) -> Result<Config> {
        let main_config_path = format!("{}/main.toml", config_dir);

        if !Path::new(&main_config_path).exists() {
            warn!(
                "No configuration at {}, starting with built-in defaults",
                main_config_path
            );
            return Ok(Config::default());
        }

        let main_config_content = fs::read_to_string(&main_config_path)
            .await
            .map_err(|e| anyhow!("Failed to read main config {}: {}", main_config_path, e))?;

        let config: Config = toml::from_str(&main_config_content)
            .map_err(|e| anyhow!("Failed to parse main config: {}", e))?;

        if config.announce.auth_required
            && (config.announce.username.is_none() || config.announce.password.is_none())
        {
            return Err(anyhow!(
                "announce.auth_required is set but announce.username/password are missing"
            ));
        }

        info!(
            "Loaded configuration: listen {}:{}, database {}, rpc timeout {}s, announce auth {}",
            config.host,
            config.port,
            config.database_path,
            config.rpc_timeout_seconds,
            if config.announce.auth_required {
                "required"
            } else {
                "optional"
            }
        );

        Ok(config)
    }
}

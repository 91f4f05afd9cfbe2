//! Loading `config/main.toml`

mod common;

use common::fixtures::*;
use gam_manager::ConfigManager;

#[tokio::test]
async fn test_loads_values_from_main_toml() {
    let config = TestConfigBuilder::new()
        .with_line("host = \"127.0.0.1\"")
        .with_line("port = 9100")
        .with_line("database_path = \"/var/lib/gam/gam.db\"")
        .with_line("rpc_timeout_seconds = 4")
        .with_announce_auth(true, Some("fleet"), Some("pw"))
        .with_setting("polling_interval_seconds", 120)
        .build();

    let manager = ConfigManager::new(config.config_dir_string()).await.unwrap();
    let loaded = manager.get_current_config();

    assert_eq!(loaded.host, "127.0.0.1");
    assert_eq!(loaded.port, 9100);
    assert_eq!(loaded.database_path, "/var/lib/gam/gam.db");
    assert_eq!(loaded.rpc_timeout_seconds, 4);
    assert!(loaded.announce.auth_required);
    assert_eq!(loaded.announce.username.as_deref(), Some("fleet"));
    assert_eq!(loaded.settings.polling_interval_seconds, 120);
    // Unlisted settings keep their defaults
    assert_eq!(loaded.settings.considered_active_seconds, 600);
}

#[tokio::test]
async fn test_missing_file_uses_defaults() {
    let config = TestConfigBuilder::empty();
    let loaded = ConfigManager::new(config.config_dir_string())
        .await
        .unwrap()
        .get_current_config();

    assert_eq!(loaded.host, "0.0.0.0");
    assert_eq!(loaded.port, 8095);
    assert!(!loaded.announce.auth_required);
    assert_eq!(loaded.settings.max_concurrent_syncs, 4);
}

#[tokio::test]
async fn test_required_auth_needs_credentials() {
    let config = TestConfigBuilder::new()
        .with_announce_auth(true, Some("fleet"), None)
        .build();

    let err = ConfigManager::new(config.config_dir_string()).await.err().unwrap();
    assert!(err.to_string().contains("announce"));
}

#[tokio::test]
async fn test_invalid_toml_is_an_error() {
    let config = TestConfigBuilder::new().with_line("port = \"not a number\"").build();
    assert!(ConfigManager::new(config.config_dir_string()).await.is_err());
}

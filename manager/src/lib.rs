pub mod alarms;
pub mod announce;
pub mod config;
pub mod constants;
pub mod database;
pub mod errors;
pub mod health;
pub mod rpc;
pub mod scheduler;
pub mod services;
pub mod sync;
pub mod web;

// Re-export commonly used types
pub use alarms::AlarmManager;
pub use announce::AnnouncementIngestor;
pub use config::{Config, ConfigManager, RuntimeSettings, SettingsStore};
pub use database::Database;
pub use health::HealthScorer;
pub use rpc::GamRpcClient;
pub use scheduler::{BackgroundScheduler, DisabledLookup, EndpointLookup, SchedulerContext};
pub use services::DeviceService;
pub use sync::SyncEngine;

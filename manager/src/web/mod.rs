pub mod handlers;
pub mod server;

pub use server::{create_router, start_web_server};

use std::sync::Arc;

use crate::alarms::AlarmManager;
use crate::announce::AnnouncementIngestor;
use crate::config::{Config, SettingsStore};
use crate::database::Database;
use crate::health::HealthScorer;
use crate::services::DeviceService;

// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub settings: SettingsStore,
    pub ingestor: Arc<AnnouncementIngestor>,
    pub alarms: AlarmManager,
    pub health: Arc<HealthScorer>,
    pub device_service: Arc<DeviceService>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        database: Arc<Database>,
        settings: SettingsStore,
        alarms: AlarmManager,
        health: Arc<HealthScorer>,
        device_service: Arc<DeviceService>,
    ) -> Self {
        let ingestor = Arc::new(AnnouncementIngestor::new(
            database.clone(),
            alarms.clone(),
            config.announce.clone(),
        ));

        Self {
            config,
            database,
            settings,
            ingestor,
            alarms,
            health,
            device_service,
        }
    }
}

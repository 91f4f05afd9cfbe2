use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use gam_manager::rpc::ClientOptions;
use gam_manager::web::{start_web_server, AppState};
use gam_manager::{
    AlarmManager, BackgroundScheduler, ConfigManager, Database, DeviceService, DisabledLookup,
    HealthScorer, SchedulerContext, SettingsStore, SyncEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with reduced verbosity
    let env_filter = EnvFilter::from_default_env()
        .add_directive("gam_manager=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting GAM device manager");

    // Load configuration
    let config_manager = ConfigManager::new("config".to_string()).await?;
    let config = config_manager.get_current_config();

    // Initialize database
    let database = Arc::new(Database::new(&config.database_path).await?);
    info!("Database initialized at {}", config.database_path);

    let settings = SettingsStore::new(database.clone(), config.settings.clone());
    settings.seed_defaults().await?;
    info!("Runtime settings: {:?}", settings.current().await);

    let client_options = ClientOptions::with_timeout_secs(config.rpc_timeout_seconds);
    let sync_engine = Arc::new(SyncEngine::new(database.clone(), client_options.clone()));
    let alarms = AlarmManager::new(database.clone());
    let health = Arc::new(HealthScorer::new(database.clone()));
    let device_service = Arc::new(DeviceService::new(
        database.clone(),
        sync_engine.clone(),
        client_options,
    ));

    let cancel = CancellationToken::new();

    // Start background loops
    let scheduler = BackgroundScheduler::start(
        SchedulerContext {
            database: database.clone(),
            settings: settings.clone(),
            sync_engine,
            alarms: alarms.clone(),
            health: health.clone(),
        },
        Arc::new(DisabledLookup),
        cancel.clone(),
    )
    .await?;

    // Cancel everything on Ctrl-C
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
        shutdown.cancel();
    });

    let state = AppState::new(config, database, settings, alarms, health, device_service);
    let served = start_web_server(state, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = scheduler.shutdown().await {
        error!("Scheduler shutdown failed: {}", e);
    }

    served
}

//! Database layer for the GAM device manager.
//!
//! This module provides SQLite persistence for:
//! - Devices and their inventory (endpoints, subscribers, bandwidth profiles, ports)
//! - Alarms and their open/closed lifecycle
//! - Sync attempts and hourly health history
//! - External lookup attempts, audit log and runtime settings
//!
//! The module is organized into submodules:
//! - `records` - All record types (entities)
//! - `devices` - Device rows, liveness and poll timestamps
//! - `inventory` - Endpoint, subscriber, bandwidth and port rows
//! - `alarms` - Alarm rows
//! - `health` - Sync attempts and health history
//! - `retention` - Audit log, external lookups and purge queries
//! - `config` - Runtime settings
//!
//! Functions taking a `&mut SqliteConnection` are building blocks for
//! callers that compose several statements into one transaction.

mod alarms;
mod config;
mod devices;
mod health;
mod inventory;
mod retention;
mod records;

pub use alarms::*;
pub use devices::*;
pub use health::{record_sync_attempt, SyncStats};
pub use inventory::*;
pub use records::*;
pub use retention::*;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};

pub struct Database {
    pool: Pool<Sqlite>,
}

const TABLES: &[(&str, &str)] = &[
    (
        "devices",
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            serial_number TEXT UNIQUE NOT NULL,
            name TEXT,
            ip_address TEXT,
            port INTEGER NOT NULL DEFAULT 443,
            scheme TEXT NOT NULL DEFAULT 'https',
            rpc_username TEXT,
            rpc_password TEXT,
            announced_username TEXT,
            announced_password TEXT,
            credentials TEXT,
            model TEXT,
            hardware_version TEXT,
            mac_address TEXT,
            software_version TEXT,
            firmware_version TEXT,
            swap_software_version TEXT,
            swap_firmware_version TEXT,
            is_online BOOLEAN NOT NULL DEFAULT 0,
            uptime INTEGER,
            read_only BOOLEAN NOT NULL DEFAULT 0,
            group_id INTEGER,
            last_seen DATETIME,
            last_announce DATETIME,
            last_endpoint_sync DATETIME,
            last_subscriber_sync DATETIME,
            last_bandwidth_sync DATETIME,
            last_port_sync DATETIME,
            health_score REAL,
            health_status TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "endpoints",
        r#"
        CREATE TABLE IF NOT EXISTS endpoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            mac_address TEXT UNIQUE NOT NULL,
            name TEXT,
            conf_endpoint_id INTEGER,
            conf_port TEXT,
            conf_subscriber_id INTEGER,
            detected_port TEXT,
            phy_rate INTEGER,
            wire_length INTEGER,
            port_link_states TEXT,
            alive BOOLEAN NOT NULL DEFAULT 0,
            quarantined BOOLEAN NOT NULL DEFAULT 0,
            external_ref TEXT,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "subscribers",
        r#"
        CREATE TABLE IF NOT EXISTS subscribers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            json_id INTEGER,
            uid INTEGER,
            name TEXT,
            endpoint_mac TEXT,
            endpoint_id INTEGER REFERENCES endpoints(id) ON DELETE SET NULL,
            port1 TEXT,
            port2 TEXT,
            vlan_id INTEGER,
            outer_tag INTEGER,
            remapped_id INTEGER,
            vlan_mode TEXT,
            vlan_display TEXT,
            bandwidth_name TEXT,
            bandwidth_id INTEGER REFERENCES bandwidths(id) ON DELETE SET NULL,
            alive BOOLEAN NOT NULL DEFAULT 0,
            sync BOOLEAN NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "bandwidths",
        r#"
        CREATE TABLE IF NOT EXISTS bandwidths (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            downstream INTEGER,
            upstream INTEGER,
            deleted BOOLEAN NOT NULL DEFAULT 0,
            sync BOOLEAN NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            UNIQUE(device_id, name)
        )
        "#,
    ),
    (
        "ports",
        r#"
        CREATE TABLE IF NOT EXISTS ports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            interface TEXT NOT NULL,
            port_type TEXT,
            link TEXT,
            duplex TEXT,
            speed TEXT,
            sfp_vendor TEXT,
            sfp_temperature REAL,
            sfp_tx_power REAL,
            sfp_rx_power REAL,
            updated_at DATETIME NOT NULL,
            UNIQUE(device_id, interface)
        )
        "#,
    ),
    (
        "alarms",
        r#"
        CREATE TABLE IF NOT EXISTS alarms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            gam_id TEXT NOT NULL,
            condition_type TEXT,
            interface TEXT,
            severity TEXT NOT NULL,
            service_affecting BOOLEAN NOT NULL DEFAULT 0,
            details TEXT,
            is_manual BOOLEAN NOT NULL DEFAULT 0,
            opening_date DATETIME NOT NULL,
            closing_date DATETIME,
            acknowledged_at DATETIME,
            acknowledged_by TEXT
        )
        "#,
    ),
    (
        "sync_attempts",
        r#"
        CREATE TABLE IF NOT EXISTS sync_attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            success BOOLEAN NOT NULL,
            duration_ms INTEGER NOT NULL,
            error TEXT,
            attempted_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "device_health_history",
        r#"
        CREATE TABLE IF NOT EXISTS device_health_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            score REAL NOT NULL,
            status TEXT NOT NULL,
            success_rate REAL NOT NULL,
            avg_response_ms REAL,
            open_alarms INTEGER NOT NULL,
            uptime INTEGER,
            recorded_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "endpoint_lookups",
        r#"
        CREATE TABLE IF NOT EXISTS endpoint_lookups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mac_address TEXT NOT NULL,
            device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            external_ref TEXT,
            created_at DATETIME NOT NULL,
            last_attempt_at DATETIME
        )
        "#,
    ),
    (
        "audit_log",
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp DATETIME NOT NULL,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            target TEXT NOT NULL,
            details TEXT
        )
        "#,
    ),
    (
        "global_settings",
        r#"
        CREATE TABLE IF NOT EXISTS global_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_endpoints_device ON endpoints(device_id)",
    "CREATE INDEX IF NOT EXISTS idx_subscribers_device ON subscribers(device_id)",
    "CREATE INDEX IF NOT EXISTS idx_subscribers_endpoint_mac ON subscribers(endpoint_mac)",
    // At most one open alarm per (device, gam_id)
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_alarms_open ON alarms(device_id, gam_id) WHERE closing_date IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_alarms_device_closing ON alarms(device_id, closing_date)",
    "CREATE INDEX IF NOT EXISTS idx_sync_attempts_device_time ON sync_attempts(device_id, attempted_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_health_history_device_time ON device_health_history(device_id, recorded_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_lookups_status ON endpoint_lookups(status, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp)",
];

impl Database {
    /// Expose pool for integration test queries
    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        info!("=== Starting database initialization ===");
        info!("Database path: {}", database_path);

        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("FAILED to create parent directory {:?}: {}", parent, e);
                    return Err(e.into());
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", database_path))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = match SqlitePoolOptions::new().connect_with(options).await {
            Ok(pool) => {
                info!("Successfully connected to SQLite database");
                pool
            }
            Err(e) => {
                error!("FAILED to connect to database {}: {}", database_path, e);
                return Err(e.into());
            }
        };

        let database = Self { pool };
        database.initialize_tables().await?;

        info!("=== Database initialization completed successfully ===");
        Ok(database)
    }

    /// Single-connection in-memory database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.initialize_tables().await?;
        Ok(database)
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    async fn initialize_tables(&self) -> Result<()> {
        for (step, (table, sql)) in TABLES.iter().enumerate() {
            info!("Step {}: Creating {} table...", step + 1, table);
            if let Err(e) = sqlx::query(sql).execute(&self.pool).await {
                error!("FAILED to create {} table: {}", table, e);
                return Err(e.into());
            }
        }

        for sql in INDEXES {
            if let Err(e) = sqlx::query(sql).execute(&self.pool).await {
                error!("FAILED to create index: {}", e);
                error!("SQL was: {}", sql);
                return Err(e.into());
            }
        }

        info!("All database tables and indexes created successfully");
        Ok(())
    }
}

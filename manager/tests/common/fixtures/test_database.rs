//! Test database utilities for in-memory SQLite testing

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use gam_manager::database::Database;

/// In-memory database with the production schema
pub struct TestDatabase {
    database: Arc<Database>,
}

impl TestDatabase {
    pub async fn new() -> Result<Self> {
        Ok(Self {
            database: Arc::new(Database::in_memory().await?),
        })
    }

    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    pub fn pool(&self) -> &SqlitePool {
        self.database.pool()
    }

    /// Pretend the device was last heard from at `last_seen`
    pub async fn set_last_seen(&self, device_id: i64, last_seen: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE devices SET last_seen = ? WHERE id = ?")
            .bind(last_seen)
            .bind(device_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn set_last_endpoint_sync(
        &self,
        device_id: i64,
        synced_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE devices SET last_endpoint_sync = ? WHERE id = ?")
            .bind(synced_at)
            .bind(device_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.pool())
            .await?;
        Ok(count.0)
    }
}

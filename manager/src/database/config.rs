//! Global settings database operations.
//!
//! Runtime settings are plain key/value rows; the typed view lives in
//! `config::settings`.

use anyhow::Result;
use chrono::Utc;
use sqlx::Row;
use std::collections::HashMap;

use super::records::GlobalSettingRecord;
use super::Database;

impl Database {
    pub async fn get_all_settings(&self) -> Result<Vec<GlobalSettingRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT key, value, updated_at
            FROM global_settings
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut settings = Vec::new();
        for row in rows {
            settings.push(GlobalSettingRecord {
                key: row.try_get("key")?,
                value: row.try_get("value")?,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(settings)
    }

    pub async fn get_global_settings(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .get_all_settings()
            .await?
            .into_iter()
            .map(|s| (s.key, s.value))
            .collect())
    }

    pub async fn set_global_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO global_settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

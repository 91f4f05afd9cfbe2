use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::normalize;
use crate::alarms::{AlarmManager, AlarmReconcileSummary};
use crate::config::AnnounceAuthConfig;
use crate::database::{upsert_announced_device, Database};
use crate::errors::AnnounceError;

/// Request facts the payload does not carry.
#[derive(Debug, Clone, Default)]
pub struct AnnounceContext {
    /// Peer address of the TCP connection
    pub observed_address: Option<String>,
    /// First hop of `X-Forwarded-For`, when behind a proxy
    pub forwarded_for: Option<String>,
    /// Decoded HTTP Basic Auth pair
    pub basic_auth: Option<(String, String)>,
}

impl AnnounceContext {
    fn source_address(&self) -> Option<&str> {
        self.forwarded_for
            .as_deref()
            .or(self.observed_address.as_deref())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnounceOutcome {
    pub device_id: i64,
    pub serial_number: String,
    pub created: bool,
    pub alarms: Option<AlarmReconcileSummary>,
}

pub struct AnnouncementIngestor {
    database: Arc<Database>,
    alarms: AlarmManager,
    auth: AnnounceAuthConfig,
}

impl AnnouncementIngestor {
    pub fn new(database: Arc<Database>, alarms: AlarmManager, auth: AnnounceAuthConfig) -> Self {
        Self {
            database,
            alarms,
            auth,
        }
    }

    /// Check the announcement Basic Auth pair against the configured account.
    /// With `auth_required` off, missing credentials are accepted but wrong
    /// ones are still rejected.
    pub fn authorize(&self, basic_auth: Option<&(String, String)>) -> Result<(), AnnounceError> {
        let (Some(expected_user), Some(expected_pass)) =
            (self.auth.username.as_deref(), self.auth.password.as_deref())
        else {
            return if self.auth.auth_required {
                Err(AnnounceError::Unauthorized)
            } else {
                Ok(())
            };
        };

        match basic_auth {
            Some((user, pass)) if user == expected_user && pass == expected_pass => Ok(()),
            Some(_) => Err(AnnounceError::Unauthorized),
            None if self.auth.auth_required => Err(AnnounceError::Unauthorized),
            None => Ok(()),
        }
    }

    /// Upsert the announcing device, then fold in its alarm snapshot.
    #[instrument(skip(self, payload, context))]
    pub async fn ingest(
        &self,
        payload: &Value,
        context: &AnnounceContext,
    ) -> Result<AnnounceOutcome, AnnounceError> {
        self.authorize(context.basic_auth.as_ref())?;

        let mut announcement = normalize(payload)?;
        let device = &mut announcement.device;

        // Devices that put no credentials in the body present them as Basic Auth
        if device.username.is_none() {
            if let Some((user, pass)) = &context.basic_auth {
                device.username = Some(user.clone());
                device.password = Some(pass.clone());
            }
        }

        let now = Utc::now();
        let mut tx = self.database.begin().await?;
        let (device_id, created) =
            upsert_announced_device(&mut tx, device, context.source_address(), now).await?;
        tx.commit()
            .await
            .context("committing announced device")?;

        if created {
            info!("Device {} registered via announcement", device.serial_number);
        } else {
            debug!("Device {} announced", device.serial_number);
        }

        if let Err(e) = self.alarms.clear_offline(device_id, &device.serial_number).await {
            warn!("Failed to clear offline alarm for {}: {}", device.serial_number, e);
        }

        let alarms = match &announcement.active_alarms {
            Some(snapshot) => Some(self.alarms.reconcile(device_id, snapshot).await?),
            None => None,
        };

        Ok(AnnounceOutcome {
            device_id,
            serial_number: announcement.device.serial_number,
            created,
            alarms,
        })
    }
}

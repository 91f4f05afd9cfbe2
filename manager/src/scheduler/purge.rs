//! Retention purge of audit rows, closed alarms and sync attempts.

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{cutoff_before, SchedulerContext};
use crate::config::RuntimeSettings;
use crate::database::PurgeCounts;

pub async fn run(ctx: SchedulerContext, cancel: CancellationToken) {
    info!("Purge task started");

    loop {
        // Re-read each round so a changed interval applies to the next wait
        let wait = ctx.settings.current().await.purge_interval();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        let settings = ctx.settings.current().await;
        match purge_once(&ctx, &settings).await {
            Ok(counts) if counts.total() > 0 => info!(
                "Purge removed {} audit rows, {} closed alarms, {} sync attempts",
                counts.audit_rows, counts.closed_alarms, counts.sync_attempts
            ),
            Ok(_) => debug!("Purge found nothing to remove"),
            Err(e) => error!("Purge failed: {}", e),
        }
    }

    info!("Purge task stopped");
}

pub async fn purge_once(ctx: &SchedulerContext, settings: &RuntimeSettings) -> Result<PurgeCounts> {
    let now = Utc::now();
    ctx.database
        .purge_expired(
            cutoff_before(now, TimeDelta::try_days(settings.audit_retention_days)),
            cutoff_before(now, TimeDelta::try_days(settings.alarm_retention_days)),
            cutoff_before(now, TimeDelta::try_days(settings.sync_attempt_retention_days)),
        )
        .await
}

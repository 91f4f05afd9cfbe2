use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::health::HealthScorer;

/// Add the hourly health snapshot job (6-field cron: sec min hour day month dow).
pub async fn schedule(scheduler: &JobScheduler, health: Arc<HealthScorer>, schedule: &str) -> Result<()> {
    let job = Job::new_async(schedule, move |_uuid, _scheduler| {
        let health = health.clone();
        Box::pin(async move {
            match health.snapshot_all().await {
                Ok(count) => info!("Scheduled health snapshot stored {} rows", count),
                Err(e) => error!("Scheduled health snapshot failed: {}", e),
            }
        })
    })
    .map_err(|e| anyhow!("Failed to create health snapshot job for '{}': {}", schedule, e))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| anyhow!("Failed to add health snapshot job to scheduler: {}", e))?;

    Ok(())
}

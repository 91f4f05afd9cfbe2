//! Periodic full sync of online devices.

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{cutoff_before, seconds_span, SchedulerContext};
use crate::config::RuntimeSettings;
use crate::constants::scheduler::POLLER_TICK;

pub async fn run(ctx: SchedulerContext, cancel: CancellationToken) {
    let mut ticker = interval(POLLER_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Poller started ({}s tick)", POLLER_TICK.as_secs());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let settings = ctx.settings.current().await;
        if let Err(e) = poll_once(&ctx, &settings).await {
            error!("Poller iteration failed: {}", e);
        }
    }

    info!("Poller stopped");
}

/// Sync every online device whose endpoint pass is older than the polling
/// interval. Devices run concurrently up to `max_concurrent_syncs`; each
/// device's failure stays its own. Returns the number of devices synced.
#[instrument(skip_all)]
pub async fn poll_once(ctx: &SchedulerContext, settings: &RuntimeSettings) -> Result<usize> {
    let cutoff = cutoff_before(Utc::now(), seconds_span(settings.polling_interval_seconds));
    let due = ctx.database.devices_due_for_poll(cutoff).await?;
    if due.is_empty() {
        return Ok(0);
    }

    debug!("{} devices due for polling", due.len());
    let completed = AtomicUsize::new(0);

    stream::iter(due)
        .for_each_concurrent(settings.max_concurrent_syncs.max(1), |device| {
            let completed = &completed;
            async move {
                match ctx.sync_engine.sync_device(device.id).await {
                    Ok(report) => {
                        completed.fetch_add(1, Ordering::Relaxed);
                        if !report.online {
                            warn!("Poll of {} failed on every pass", device.serial_number);
                        }
                    }
                    Err(e) => warn!("Cannot poll {}: {}", device.serial_number, e),
                }
            }
        })
        .await;

    Ok(completed.into_inner())
}

//! Marks devices offline when they stop announcing.

use anyhow::Result;
use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{cutoff_before, seconds_span, SchedulerContext};
use crate::config::RuntimeSettings;
use crate::constants::scheduler::OFFLINE_DETECTOR_TICK;

pub async fn run(ctx: SchedulerContext, cancel: CancellationToken) {
    let mut ticker = interval(OFFLINE_DETECTOR_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Offline detector started ({}s tick)", OFFLINE_DETECTOR_TICK.as_secs());

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let settings = ctx.settings.current().await;
        if let Err(e) = detect_once(&ctx, &settings).await {
            error!("Offline detection failed: {}", e);
        }
    }

    info!("Offline detector stopped");
}

/// Online devices not seen within `considered_active_seconds` go offline
/// and get one open offline alarm. Returns how many went offline.
pub async fn detect_once(ctx: &SchedulerContext, settings: &RuntimeSettings) -> Result<usize> {
    let cutoff = cutoff_before(Utc::now(), seconds_span(settings.considered_active_seconds));
    let stale = ctx.database.stale_online_devices(cutoff).await?;

    let mut marked = 0;
    for device in &stale {
        if let Err(e) = ctx.database.set_device_offline(device.id).await {
            error!("Failed to mark {} offline: {}", device.serial_number, e);
            continue;
        }
        marked += 1;
        match ctx.alarms.raise_offline(device.id, &device.serial_number).await {
            Ok(true) => warn!("Device {} went offline", device.serial_number),
            Ok(false) => {}
            Err(e) => error!("Failed to raise offline alarm for {}: {}", device.serial_number, e),
        }
    }

    Ok(marked)
}

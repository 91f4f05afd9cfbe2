//! Retry of pending external endpoint lookups.

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{cutoff_before, SchedulerContext};
use crate::config::RuntimeSettings;
use crate::database::LookupStatus;

/// Resolves an endpoint MAC to a reference in an external inventory.
/// `Ok(None)` means not known yet; the lookup stays pending.
pub trait EndpointLookup: Send + Sync {
    fn lookup(&self, mac_address: &str) -> impl Future<Output = Result<Option<String>>> + Send;
}

/// Used when no external inventory is configured. Lookups stay pending
/// until they expire.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLookup;

impl EndpointLookup for DisabledLookup {
    fn lookup(&self, _mac_address: &str) -> impl Future<Output = Result<Option<String>>> + Send {
        std::future::ready(Ok(None))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LookupRunSummary {
    pub attempted: usize,
    pub found: usize,
    pub expired: u64,
}

pub async fn run<L: EndpointLookup>(ctx: SchedulerContext, lookup: Arc<L>, cancel: CancellationToken) {
    info!("Endpoint lookup retry started");

    loop {
        let wait = ctx.settings.current().await.lookup_interval();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        let settings = ctx.settings.current().await;
        match retry_once(&ctx, lookup.as_ref(), &settings).await {
            Ok(summary) if summary.attempted > 0 || summary.expired > 0 => debug!(
                "Lookup retry: {} attempted, {} found, {} expired",
                summary.attempted, summary.found, summary.expired
            ),
            Ok(_) => {}
            Err(e) => error!("Lookup retry failed: {}", e),
        }
    }

    info!("Endpoint lookup retry stopped");
}

/// Expire lookups past the retry horizon, then try every pending one once.
pub async fn retry_once<L: EndpointLookup>(
    ctx: &SchedulerContext,
    lookup: &L,
    settings: &RuntimeSettings,
) -> Result<LookupRunSummary> {
    let now = Utc::now();
    let mut summary = LookupRunSummary {
        expired: ctx
            .database
            .expire_lookups_before(cutoff_before(
                now,
                TimeDelta::try_hours(settings.lookup_retry_horizon_hours),
            ))
            .await?,
        ..Default::default()
    };

    for pending in ctx.database.list_lookups(LookupStatus::Pending).await? {
        ctx.database.record_lookup_attempt(pending.id, Utc::now()).await?;
        summary.attempted += 1;

        match lookup.lookup(&pending.mac_address).await {
            Ok(Some(external_ref)) => {
                ctx.database.complete_lookup(pending.id, &external_ref).await?;
                ctx.database
                    .set_endpoint_external_ref(&pending.mac_address, &external_ref)
                    .await?;
                summary.found += 1;
                info!("Endpoint {} resolved to {}", pending.mac_address, external_ref);
            }
            Ok(None) => {}
            Err(e) => warn!("Lookup of {} failed: {}", pending.mac_address, e),
        }
    }

    Ok(summary)
}

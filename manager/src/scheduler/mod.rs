//! Background loops that keep the fleet view current.
//!
//! - **poller**: full sync of online devices whose inventory is stale
//! - **offline**: devices that stopped announcing go offline with an alarm
//! - **purge**: retention of audit rows, closed alarms and sync attempts
//! - **lookup**: retry of pending external endpoint lookups
//! - **health snapshot**: hourly cron job appending health history
//!
//! Every loop re-reads the runtime settings at the top of each iteration
//! and stops when the shared [`CancellationToken`] fires. An iteration that
//! already started runs to completion.

pub mod health_snapshot;
pub mod lookup;
pub mod offline;
pub mod poller;
pub mod purge;

pub use lookup::{DisabledLookup, EndpointLookup, LookupRunSummary};

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::JobScheduler;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::alarms::AlarmManager;
use crate::config::SettingsStore;
use crate::constants::scheduler::HEALTH_SNAPSHOT_SCHEDULE;
use crate::database::Database;
use crate::health::HealthScorer;
use crate::sync::SyncEngine;

/// `now - span` for a cutoff query. A span that does not fit chrono's range
/// yields the Unix epoch, which no stored timestamp precedes.
pub(crate) fn cutoff_before(now: DateTime<Utc>, span: Option<TimeDelta>) -> DateTime<Utc> {
    span.and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub(crate) fn seconds_span(seconds: u64) -> Option<TimeDelta> {
    i64::try_from(seconds).ok().and_then(TimeDelta::try_seconds)
}

/// Everything a loop needs, cheap to clone into each task.
#[derive(Clone)]
pub struct SchedulerContext {
    pub database: Arc<Database>,
    pub settings: SettingsStore,
    pub sync_engine: Arc<SyncEngine>,
    pub alarms: AlarmManager,
    pub health: Arc<HealthScorer>,
}

pub struct BackgroundScheduler {
    tasks: Vec<JoinHandle<()>>,
    cron: JobScheduler,
    cancel: CancellationToken,
}

impl BackgroundScheduler {
    #[instrument(skip_all)]
    pub async fn start<L>(
        ctx: SchedulerContext,
        lookup: Arc<L>,
        cancel: CancellationToken,
    ) -> Result<Self>
    where
        L: EndpointLookup + 'static,
    {
        let tasks = vec![
            tokio::spawn(poller::run(ctx.clone(), cancel.child_token())),
            tokio::spawn(offline::run(ctx.clone(), cancel.child_token())),
            tokio::spawn(purge::run(ctx.clone(), cancel.child_token())),
            tokio::spawn(lookup::run(ctx.clone(), lookup, cancel.child_token())),
        ];

        let cron = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create JobScheduler: {}", e))?;
        health_snapshot::schedule(&cron, ctx.health.clone(), HEALTH_SNAPSHOT_SCHEDULE).await?;
        cron.start()
            .await
            .map_err(|e| anyhow!("Failed to start JobScheduler: {}", e))?;

        info!("Background scheduler started: {} loops and the health snapshot job", tasks.len());
        Ok(Self { tasks, cron, cancel })
    }

    /// Cancel the loops and wait for in-flight iterations to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }
        self.cron
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop JobScheduler: {}", e))?;
        info!("Background scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_subtracts_in_range_spans() {
        let now = Utc::now();
        assert_eq!(
            cutoff_before(now, TimeDelta::try_days(2)),
            now - TimeDelta::days(2)
        );
        assert_eq!(cutoff_before(now, seconds_span(30)), now - TimeDelta::seconds(30));
    }

    #[test]
    fn oversized_spans_fall_back_to_epoch() {
        let now = Utc::now();
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(cutoff_before(now, TimeDelta::try_days(i64::MAX)), epoch);
        assert_eq!(cutoff_before(now, TimeDelta::try_days(100_000_000)), epoch);
        assert_eq!(cutoff_before(now, seconds_span(u64::MAX)), epoch);
    }
}

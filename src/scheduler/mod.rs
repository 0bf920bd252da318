//! Periodic refresh scheduler.
//!
//! Re-runs the full read-and-aggregate pipeline on a fixed interval until
//! cancelled. On-demand refreshes can still be issued directly against the
//! aggregator; overlap between the two is suppressed inside
//! [`TokenAggregator::refresh`].

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::aggregator::TokenAggregator;
use crate::config::RefreshSettings;

/// Scheduler driving the aggregator's periodic refresh job.
pub struct RefreshScheduler {
    aggregator: Arc<TokenAggregator>,
    settings: RefreshSettings,
}

impl RefreshScheduler {
    pub fn new(aggregator: Arc<TokenAggregator>, settings: RefreshSettings) -> Self {
        Self { aggregator, settings }
    }

    /// Starts the scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        self.register_refresh_job(&scheduler).await?;

        scheduler.start().await?;
        info!("Refresh scheduler started");

        // Wait for cancellation
        cancellation_token.cancelled().await;
        info!("Refresh scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_refresh_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let aggregator = self.aggregator.clone();
        let interval = self.settings.interval_secs;

        let job = Job::new_repeated_async(
            std::time::Duration::from_secs(interval),
            move |_uuid, _lock| {
                let aggregator = aggregator.clone();
                Box::pin(async move {
                    if let Err(e) = aggregator.refresh().await {
                        error!("Refresh cycle failed: {:#}", e);
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered refresh job (every {}s)", interval);
        Ok(())
    }
}

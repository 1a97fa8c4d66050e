use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background work
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        if self.context.config.runner.enabled {
            tokio::spawn(Self::runner_tick_job(Arc::clone(&self)));
        } else {
            info!("Built-in runner loop disabled; relying on the HTTP tick trigger");
        }

        tokio::spawn(Self::stale_processing_sweep_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Drive the execution runner on the configured cadence
    async fn runner_tick_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(
            scheduler.context.config.runner.interval_secs,
        ));

        loop {
            interval.tick().await;

            match scheduler.context.runner.tick().await {
                Ok(summary) => {
                    if summary.processed > 0 || summary.periodic > 0 {
                        info!(
                            "Runner tick processed {} scheduled, {} periodic",
                            summary.processed, summary.periodic
                        );
                    }
                }
                Err(e) => error!("Runner tick failed: {}", e),
            }
        }
    }

    /// Fail items stuck in `processing` (runs every 5 minutes)
    async fn stale_processing_sweep_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;

            match tasks::sweep_stale_processing(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Swept {} stale processing items", count);
                    }
                }
                Err(e) => error!("Stale processing sweep failed: {}", e),
            }
        }
    }
}

/// Dripfeed - social posting automation service
///
/// Runs warmup sequences and periodic posts for connected social accounts:
/// plans schedules at enrollment, publishes due items on a fixed cadence
/// and keeps the two automation types mutually exclusive per account.

mod api;
mod config;
mod content;
mod context;
mod db;
mod error;
mod jobs;
mod publish;
mod runner;
mod server;
mod warmup;

use config::ServerConfig;
use context::AppContext;
use error::AutomationResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AutomationResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dripfeed=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ServerConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;
    let ctx = Arc::new(ctx);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    // Start server
    server::serve((*ctx).clone()).await?;

    Ok(())
}

/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    content::ContentResolver,
    db,
    error::{AutomationError, AutomationResult},
    publish::{HttpPublisher, Publisher},
    runner::ExecutionRunner,
    warmup::WarmupManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub warmups: WarmupManager,
    pub resolver: ContentResolver,
    pub runner: Arc<ExecutionRunner>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AutomationResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let warmups = WarmupManager::new(pool.clone());
        let resolver = ContentResolver::new(pool.clone());

        let publisher: Arc<dyn Publisher> = Arc::new(
            HttpPublisher::new(&config.publish)
                .map_err(|e| AutomationError::Internal(e.to_string()))?,
        );

        let runner = Arc::new(ExecutionRunner::new(
            pool.clone(),
            resolver.clone(),
            warmups.clone(),
            publisher,
            config.runner.batch_size,
        ));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            warmups,
            resolver,
            runner,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> AutomationResult<()> {
        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory)
                .await
                .map_err(|e| {
                    AutomationError::Internal(format!(
                        "Failed to create directory {:?}: {}",
                        config.storage.data_directory, e
                    ))
                })?;
        }

        Ok(())
    }
}

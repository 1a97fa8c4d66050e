/// Configuration management for the automation service
use crate::error::{AutomationError, AutomationResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub runner: RunnerConfig,
    pub publish: PublishConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Execution runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Drive the runner from an in-process interval loop. Disable when an
    /// external cron hits POST /api/runner/tick instead.
    pub enabled: bool,
    pub interval_secs: u64,
    pub batch_size: i64,
    /// Items stuck in `processing` longer than this are failed by the sweep
    pub processing_ttl_secs: u64,
}

/// Publish collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AutomationResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("DRIPFEED_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DRIPFEED_PORT")
            .unwrap_or_else(|_| "3420".to_string())
            .parse()
            .map_err(|_| AutomationError::Validation("Invalid port number".to_string()))?;
        let version = env::var("DRIPFEED_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("DRIPFEED_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("DRIPFEED_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("dripfeed.sqlite"));

        let runner_enabled = env::var("DRIPFEED_RUNNER_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let interval_secs = env::var("DRIPFEED_RUNNER_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);
        let batch_size = env::var("DRIPFEED_RUNNER_BATCH_SIZE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);
        let processing_ttl_secs = env::var("DRIPFEED_PROCESSING_TTL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);

        let publish_base_url = env::var("DRIPFEED_PUBLISH_BASE_URL")
            .map_err(|_| AutomationError::Validation("Publish base URL required".to_string()))?;
        let publish_timeout_secs = env::var("DRIPFEED_PUBLISH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            runner: RunnerConfig {
                enabled: runner_enabled,
                interval_secs,
                batch_size,
                processing_ttl_secs,
            },
            publish: PublishConfig {
                base_url: publish_base_url,
                timeout_secs: publish_timeout_secs,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AutomationResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AutomationError::Validation(
                "Hostname cannot be empty".to_string(),
            ));
        }

        if self.runner.batch_size <= 0 {
            return Err(AutomationError::Validation(
                "Runner batch size must be positive".to_string(),
            ));
        }

        if self.runner.interval_secs == 0 {
            return Err(AutomationError::Validation(
                "Runner interval must be at least one second".to_string(),
            ));
        }

        if self.publish.base_url.is_empty() {
            return Err(AutomationError::Validation(
                "Publish base URL cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Publish collaborator
///
/// The external service that actually posts to the social platform. The
/// pipeline only depends on the `Publisher` trait; production wires in the
/// HTTP client, tests wire in a scripted mock.
use crate::config::PublishConfig;
use crate::db::models::PostType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by the publish collaborator; recorded verbatim on the item
#[derive(Error, Debug)]
#[error("{message}")]
pub struct PublishError {
    pub message: String,
}

impl PublishError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One publish request
#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
    /// Account's publishing credential
    pub credential: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub image_urls: Vec<String>,
    pub post_type: PostType,
    /// Scheduled-post id, passed so a crashed-and-rerun publish can be
    /// deduplicated server-side
    pub idempotency_key: String,
}

/// Receipt from a successful publish
#[derive(Debug, Clone, Deserialize)]
pub struct PublishReceipt {
    pub post_id: String,
}

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, PublishError>;
}

/// reqwest-backed publisher posting JSON to the configured endpoint
pub struct HttpPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPublisher {
    pub fn new(config: &PublishConfig) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PublishError::new(format!("HTTP client init: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, PublishError> {
        let url = format!("{}/v1/posts", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&request.credential)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PublishError::new(format!("publish request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::new(format!(
                "publish rejected ({}): {}",
                status, body
            )));
        }

        response
            .json::<PublishReceipt>()
            .await
            .map_err(|e| PublishError::new(format!("publish response decode: {}", e)))
    }
}

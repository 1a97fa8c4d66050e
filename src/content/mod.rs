/// Content resolution
///
/// Turns the content specification stored on a post template into concrete
/// text and image URLs at execution time. Resolution is a pure read and is
/// deliberately not memoized: a retry of the same item may draw a different
/// random pick.
use crate::db::models::{Image, Phrase};
use crate::error::{AutomationError, AutomationResult};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Carousels must carry between 2 and 10 images
pub const CAROUSEL_MIN: usize = 2;
pub const CAROUSEL_MAX: usize = 10;

/// Where a post's text comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TextSource {
    /// Literal text stored on the template
    Custom { text: String },
    /// One stored phrase by id
    Specific { phrase_id: String },
    /// Uniform pick over the owner's phrase library
    Random,
    /// Uniform pick restricted to a folder
    RandomFolder { folder_id: String },
}

/// Where a post's image(s) come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    /// One stored image by id
    Specific { image_id: String },
    /// Uniform pick over the owner's image library
    Random,
    /// Uniform pick restricted to a folder
    RandomFolder { folder_id: String },
    /// Ordered list of specific images, 2..=10 of them
    Carousel { image_ids: Vec<String> },
}

/// Content specification stored (as JSON) on post templates and periodic posts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageSource>,
}

impl ContentSpec {
    /// Parse the JSON column form
    pub fn from_json(raw: &str) -> AutomationResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AutomationError::Internal(format!("Invalid content spec: {}", e)))
    }

    pub fn to_json(&self) -> AutomationResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AutomationError::Internal(format!("Content spec encode: {}", e)))
    }
}

/// Concrete content ready to hand to the publish collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContent {
    pub text: Option<String>,
    pub image_urls: Vec<String>,
}

/// Resolves content specs against the owner's stored libraries
#[derive(Clone)]
pub struct ContentResolver {
    db: SqlitePool,
}

impl ContentResolver {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Resolve a spec to concrete text and image URLs
    pub async fn resolve(
        &self,
        spec: &ContentSpec,
        owner_id: &str,
    ) -> AutomationResult<ResolvedContent> {
        let text = match &spec.text {
            Some(source) => Some(self.resolve_text(source, owner_id).await?),
            None => None,
        };

        let image_urls = match &spec.images {
            Some(source) => self.resolve_images(source, owner_id).await?,
            None => Vec::new(),
        };

        Ok(ResolvedContent { text, image_urls })
    }

    async fn resolve_text(&self, source: &TextSource, owner_id: &str) -> AutomationResult<String> {
        match source {
            TextSource::Custom { text } => Ok(text.clone()),
            TextSource::Specific { phrase_id } => {
                let phrase = sqlx::query_as::<_, Phrase>(
                    "SELECT * FROM phrase WHERE id = ? AND owner_id = ?",
                )
                .bind(phrase_id)
                .bind(owner_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| {
                    AutomationError::ContentNotFound(format!("phrase {}", phrase_id))
                })?;
                Ok(phrase.text)
            }
            TextSource::Random => self.random_phrase(owner_id, None).await,
            TextSource::RandomFolder { folder_id } => {
                self.random_phrase(owner_id, Some(folder_id)).await
            }
        }
    }

    async fn resolve_images(
        &self,
        source: &ImageSource,
        owner_id: &str,
    ) -> AutomationResult<Vec<String>> {
        match source {
            ImageSource::Specific { image_id } => {
                Ok(vec![self.image_url(image_id, owner_id).await?])
            }
            ImageSource::Random => Ok(vec![self.random_image(owner_id, None).await?]),
            ImageSource::RandomFolder { folder_id } => {
                Ok(vec![self.random_image(owner_id, Some(folder_id)).await?])
            }
            ImageSource::Carousel { image_ids } => {
                if image_ids.len() < CAROUSEL_MIN || image_ids.len() > CAROUSEL_MAX {
                    return Err(AutomationError::InvalidCarouselSize(image_ids.len()));
                }

                // Caller order is the carousel order
                let mut urls = Vec::with_capacity(image_ids.len());
                for image_id in image_ids {
                    urls.push(self.image_url(image_id, owner_id).await?);
                }
                Ok(urls)
            }
        }
    }

    async fn image_url(&self, image_id: &str, owner_id: &str) -> AutomationResult<String> {
        let image =
            sqlx::query_as::<_, Image>("SELECT * FROM image WHERE id = ? AND owner_id = ?")
                .bind(image_id)
                .bind(owner_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AutomationError::ContentNotFound(format!("image {}", image_id)))?;
        Ok(image.url)
    }

    async fn random_phrase(
        &self,
        owner_id: &str,
        folder_id: Option<&str>,
    ) -> AutomationResult<String> {
        let phrase = match folder_id {
            Some(folder) => {
                sqlx::query_as::<_, Phrase>(
                    "SELECT * FROM phrase WHERE owner_id = ? AND folder_id = ? ORDER BY RANDOM() LIMIT 1",
                )
                .bind(owner_id)
                .bind(folder)
                .fetch_optional(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Phrase>(
                    "SELECT * FROM phrase WHERE owner_id = ? ORDER BY RANDOM() LIMIT 1",
                )
                .bind(owner_id)
                .fetch_optional(&self.db)
                .await?
            }
        };

        phrase
            .map(|p| p.text)
            .ok_or_else(|| AutomationError::NoContentAvailable("no phrases in pool".to_string()))
    }

    async fn random_image(
        &self,
        owner_id: &str,
        folder_id: Option<&str>,
    ) -> AutomationResult<String> {
        let image = match folder_id {
            Some(folder) => {
                sqlx::query_as::<_, Image>(
                    "SELECT * FROM image WHERE owner_id = ? AND folder_id = ? ORDER BY RANDOM() LIMIT 1",
                )
                .bind(owner_id)
                .bind(folder)
                .fetch_optional(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Image>(
                    "SELECT * FROM image WHERE owner_id = ? ORDER BY RANDOM() LIMIT 1",
                )
                .bind(owner_id)
                .fetch_optional(&self.db)
                .await?
            }
        };

        image
            .map(|i| i.url)
            .ok_or_else(|| AutomationError::NoContentAvailable("no images in pool".to_string()))
    }
}

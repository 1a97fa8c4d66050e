/// Database models for the automation pipeline
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Warming progress of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WarmingStatus {
    NotWarmed,
    Warming,
    Warmed,
}

/// Lifecycle of a warmup run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
}

/// Lifecycle of a single scheduled post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
}

impl PostStatus {
    /// Terminal statuses count toward day completion
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PostStatus::Success | PostStatus::Failed | PostStatus::Cancelled
        )
    }
}

/// Kind of content a post carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Text,
    Image,
    TextImage,
    Carousel,
}

/// A publishable third-party social account
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Dashboard user owning this account and its content libraries
    pub owner_id: String,
    pub handle: String,
    /// Opaque publishing credential passed to the publish collaborator
    pub credential: String,
    pub warming_status: WarmingStatus,
    pub active_run_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A reusable multi-day posting template
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Sequence {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub total_days: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// One day inside a sequence
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SequenceDay {
    pub id: String,
    pub sequence_id: String,
    pub day_index: i64,
    pub is_rest: bool,
}

/// A content placement inside a sequence day
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PostTemplate {
    pub id: String,
    pub day_id: String,
    pub order_index: i64,
    /// "HH:MM", interpreted against the day's calendar date
    pub time_of_day: String,
    pub post_type: PostType,
    pub intelligent_delay: bool,
    /// JSON-encoded ContentSpec
    pub content_spec: String,
}

/// One account's traversal of one sequence
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub account_id: String,
    pub sequence_id: String,
    pub status: RunStatus,
    pub current_day: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A concrete, timestamped instance of a post template for a run
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub run_id: String,
    pub account_id: String,
    pub template_id: String,
    pub day_index: i64,
    pub order_index: i64,
    pub post_type: PostType,
    pub content_spec: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: PostStatus,
    pub attempts: i64,
    pub error: Option<String>,
    pub processing_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
}

/// Snapshot of a periodic post deactivated for the duration of a run
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PausedAutomation {
    pub id: String,
    pub run_id: String,
    pub account_id: String,
    pub periodic_post_id: String,
    pub paused_at: DateTime<Utc>,
}

/// Standalone recurring post definition, independent of any sequence
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PeriodicPost {
    pub id: String,
    pub account_id: String,
    pub interval_minutes: i64,
    pub post_type: PostType,
    pub content_spec: String,
    pub active: bool,
    pub times_posted: i64,
    pub last_posted_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// A stored text snippet in the owner's content library
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Phrase {
    pub id: String,
    pub owner_id: String,
    pub text: String,
    pub folder_id: Option<String>,
}

/// A stored image in the owner's content library; `url` is already public
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub owner_id: String,
    pub url: String,
    pub folder_id: Option<String>,
}

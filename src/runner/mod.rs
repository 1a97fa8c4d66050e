/// Execution runner
///
/// Scans due work on a fixed cadence: scheduled warmup posts and standalone
/// periodic posts. All state transitions are status-guarded updates, so any
/// number of overlapping ticks (background loop plus the HTTP trigger, or
/// doubled cron) stay correct; a lost guard just means another invocation
/// already took the item.
use crate::content::{ContentResolver, ContentSpec, ResolvedContent};
use crate::db::models::{Account, PeriodicPost, PostStatus, Run, RunStatus, ScheduledPost};
use crate::error::{AutomationError, AutomationResult};
use crate::publish::{PublishRequest, Publisher};
use crate::warmup::{progress, WarmupManager};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome counters for one tick
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TickSummary {
    /// Items that reached a terminal state this tick
    pub processed: u64,
    /// Scheduled posts published successfully
    pub published: u64,
    /// Scheduled posts that failed (content or publish)
    pub failed: u64,
    /// Items skipped: lost claims and stale items from terminal runs
    pub skipped: u64,
    /// Periodic posts published
    pub periodic: u64,
}

pub struct ExecutionRunner {
    db: SqlitePool,
    resolver: ContentResolver,
    warmups: WarmupManager,
    publisher: Arc<dyn Publisher>,
    batch_size: i64,
}

impl ExecutionRunner {
    pub fn new(
        db: SqlitePool,
        resolver: ContentResolver,
        warmups: WarmupManager,
        publisher: Arc<dyn Publisher>,
        batch_size: i64,
    ) -> Self {
        Self {
            db,
            resolver,
            warmups,
            publisher,
            batch_size,
        }
    }

    /// One runner invocation: process due scheduled posts, then due
    /// periodic posts. Items are handled sequentially in `scheduled_at`
    /// order, which keeps per-account publish order intact.
    pub async fn tick(&self) -> AutomationResult<TickSummary> {
        let now = Utc::now();
        let mut summary = TickSummary::default();

        let due = sqlx::query_as::<_, ScheduledPost>(
            r#"
            SELECT * FROM scheduled_post
            WHERE status = 'pending' AND scheduled_at <= ?
            ORDER BY scheduled_at
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(self.batch_size)
        .fetch_all(&self.db)
        .await?;

        for item in due {
            self.process_item(&item, &mut summary).await?;
        }

        self.process_periodic(now, &mut summary).await?;

        if summary.processed > 0 || summary.periodic > 0 {
            info!(
                "Tick: {} processed ({} published, {} failed, {} skipped), {} periodic",
                summary.processed,
                summary.published,
                summary.failed,
                summary.skipped,
                summary.periodic
            );
        }

        Ok(summary)
    }

    async fn process_item(
        &self,
        item: &ScheduledPost,
        summary: &mut TickSummary,
    ) -> AutomationResult<()> {
        // Stale item from a run that was cancelled (or vanished) since
        // scheduling: cancel it instead of publishing.
        if !self.run_is_running(&item.run_id).await? {
            let updated = sqlx::query(
                "UPDATE scheduled_post SET status = 'cancelled' WHERE id = ? AND status = 'pending'",
            )
            .bind(&item.id)
            .execute(&self.db)
            .await?;

            if updated.rows_affected() > 0 {
                summary.processed += 1;
            }
            summary.skipped += 1;
            return Ok(());
        }

        // Claim the item; losing the guard means another tick has it
        let claimed = sqlx::query(
            r#"
            UPDATE scheduled_post
            SET status = 'processing', attempts = attempts + 1, processing_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(Utc::now())
        .bind(&item.id)
        .execute(&self.db)
        .await?;

        if claimed.rows_affected() == 0 {
            summary.skipped += 1;
            return Ok(());
        }

        let outcome = self.resolve_and_publish(item).await;

        match outcome {
            Ok(receipt_id) => {
                self.finalize(item, PostStatus::Success, None).await?;
                summary.published += 1;
                summary.processed += 1;
                tracing::debug!("Published scheduled post {} as {}", item.id, receipt_id);
            }
            Err(e) => {
                warn!("Scheduled post {} failed: {}", item.id, e);
                self.finalize(item, PostStatus::Failed, Some(e.to_string()))
                    .await?;
                summary.failed += 1;
                summary.processed += 1;
            }
        }

        Ok(())
    }

    /// Resolve content and publish one claimed item. Per-item failures come
    /// back as errors; they never abort the tick.
    async fn resolve_and_publish(&self, item: &ScheduledPost) -> AutomationResult<String> {
        let account = self.account(&item.account_id).await?;
        let spec = ContentSpec::from_json(&item.content_spec)?;
        let content = self.resolver.resolve(&spec, &account.owner_id).await?;

        self.publish(&account, content, item.post_type, &item.id)
            .await
    }

    async fn publish(
        &self,
        account: &Account,
        content: ResolvedContent,
        post_type: crate::db::models::PostType,
        idempotency_key: &str,
    ) -> AutomationResult<String> {
        let receipt = self
            .publisher
            .publish(PublishRequest {
                credential: account.credential.clone(),
                text: content.text,
                image_urls: content.image_urls,
                post_type,
                idempotency_key: idempotency_key.to_string(),
            })
            .await
            .map_err(|e| AutomationError::Publish(e.to_string()))?;

        Ok(receipt.post_id)
    }

    /// Record the item's terminal status and, while the run is still
    /// running, check day progress. A run stopped while the publish was in
    /// flight keeps its terminal status: the outcome is recorded on the
    /// item, but the run is not advanced or resurrected.
    async fn finalize(
        &self,
        item: &ScheduledPost,
        status: PostStatus,
        error: Option<String>,
    ) -> AutomationResult<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_post
            SET status = ?, error = ?, executed_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(status)
        .bind(&error)
        .bind(Utc::now())
        .bind(&item.id)
        .execute(&self.db)
        .await?;

        if self.run_is_running(&item.run_id).await? {
            progress::check_day_progress(&self.db, &self.warmups, &item.run_id).await?;
        }

        Ok(())
    }

    /// Publish due periodic posts. The claim is a compare-and-set on
    /// `times_posted`, so overlapping ticks publish each interval once.
    async fn process_periodic(
        &self,
        now: DateTime<Utc>,
        summary: &mut TickSummary,
    ) -> AutomationResult<()> {
        let active = sqlx::query_as::<_, PeriodicPost>(
            "SELECT * FROM periodic_post WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;

        for periodic in active {
            let due = match periodic.last_posted_at {
                None => true,
                Some(last) => last + Duration::minutes(periodic.interval_minutes) <= now,
            };
            if !due {
                continue;
            }

            let claimed = sqlx::query(
                r#"
                UPDATE periodic_post
                SET last_posted_at = ?, times_posted = times_posted + 1
                WHERE id = ? AND active = 1 AND times_posted = ?
                "#,
            )
            .bind(now)
            .bind(&periodic.id)
            .bind(periodic.times_posted)
            .execute(&self.db)
            .await?;

            if claimed.rows_affected() == 0 {
                summary.skipped += 1;
                continue;
            }

            match self.publish_periodic(&periodic).await {
                Ok(receipt_id) => {
                    sqlx::query("UPDATE periodic_post SET last_error = NULL WHERE id = ?")
                        .bind(&periodic.id)
                        .execute(&self.db)
                        .await?;
                    summary.periodic += 1;
                    tracing::debug!("Published periodic post {} as {}", periodic.id, receipt_id);
                }
                Err(e) => {
                    warn!("Periodic post {} failed: {}", periodic.id, e);
                    sqlx::query("UPDATE periodic_post SET last_error = ? WHERE id = ?")
                        .bind(e.to_string())
                        .bind(&periodic.id)
                        .execute(&self.db)
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn publish_periodic(&self, periodic: &PeriodicPost) -> AutomationResult<String> {
        let account = self.account(&periodic.account_id).await?;
        let spec = ContentSpec::from_json(&periodic.content_spec)?;
        let content = self.resolver.resolve(&spec, &account.owner_id).await?;

        // One key per interval slot so a crashed rerun can be deduplicated
        let key = format!("{}:{}", periodic.id, periodic.times_posted + 1);
        self.publish(&account, content, periodic.post_type, &key)
            .await
    }

    async fn run_is_running(&self, run_id: &str) -> AutomationResult<bool> {
        let run = sqlx::query_as::<_, Run>("SELECT * FROM run WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(matches!(
            run,
            Some(Run {
                status: RunStatus::Running,
                ..
            })
        ))
    }

    async fn account(&self, account_id: &str) -> AutomationResult<Account> {
        sqlx::query_as::<_, Account>("SELECT * FROM account WHERE id = ?")
            .bind(account_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("account {}", account_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::testutil::{make_due, scheduled_posts, seed_account, seed_periodic, seed_sequence};
    use crate::publish::testing::MockPublisher;
    use crate::warmup::WarmupManager;

    struct Fixture {
        pool: SqlitePool,
        warmups: WarmupManager,
        publisher: Arc<MockPublisher>,
        runner: ExecutionRunner,
    }

    async fn fixture() -> Fixture {
        let pool = db::test_pool().await;
        let warmups = WarmupManager::new(pool.clone());
        let publisher = Arc::new(MockPublisher::new());
        let runner = ExecutionRunner::new(
            pool.clone(),
            ContentResolver::new(pool.clone()),
            warmups.clone(),
            publisher.clone(),
            50,
        );
        Fixture {
            pool,
            warmups,
            publisher,
            runner,
        }
    }

    #[tokio::test]
    async fn test_tick_publishes_due_posts() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_sequence(&f.pool, "seq-1", &[(false, 2)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();
        make_due(&f.pool, &run.id).await;

        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.published, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(f.publisher.call_count(), 2);

        let posts = scheduled_posts(&f.pool, &run.id).await;
        assert!(posts.iter().all(|p| p.status == PostStatus::Success));
        assert!(posts.iter().all(|p| p.status.is_terminal()));
        assert!(posts.iter().all(|p| p.executed_at.is_some()));
        assert!(posts.iter().all(|p| p.attempts == 1));

        // Publish carried credential and idempotency key
        let calls = f.publisher.calls.lock().unwrap();
        assert_eq!(calls[0].credential, "cred");
        assert_eq!(calls[0].idempotency_key, posts[0].id);
    }

    #[tokio::test]
    async fn test_tick_ignores_future_posts() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_sequence(&f.pool, "seq-1", &[(false, 1)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();

        sqlx::query("UPDATE scheduled_post SET scheduled_at = '2099-01-01T00:00:00Z' WHERE run_id = ?")
            .bind(&run.id)
            .execute(&f.pool)
            .await
            .unwrap();

        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(f.publisher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_marks_failed_and_continues() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_sequence(&f.pool, "seq-1", &[(false, 2)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();
        make_due(&f.pool, &run.id).await;

        f.publisher.push_outcome(Err("rate limited"));
        f.publisher.push_outcome(Ok("post-2"));

        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.published, 1);

        let posts = scheduled_posts(&f.pool, &run.id).await;
        let failed: Vec<_> = posts.iter().filter(|p| p.status == PostStatus::Failed).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error.as_deref().unwrap().contains("rate limited"));

        // No automatic retry: a later tick leaves the failed item alone
        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn test_content_error_is_per_item() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_sequence(&f.pool, "seq-1", &[(false, 1)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();

        // Point the item at an empty random pool
        sqlx::query(
            r#"UPDATE scheduled_post SET content_spec = '{"text":{"kind":"random"}}' WHERE run_id = ?"#,
        )
        .bind(&run.id)
        .execute(&f.pool)
        .await
        .unwrap();
        make_due(&f.pool, &run.id).await;

        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(f.publisher.call_count(), 0);

        let posts = scheduled_posts(&f.pool, &run.id).await;
        assert_eq!(posts[0].status, PostStatus::Failed);
        assert!(posts[0].error.as_deref().unwrap().contains("No content available"));
    }

    #[tokio::test]
    async fn test_stale_item_from_cancelled_run_is_cancelled() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_sequence(&f.pool, "seq-1", &[(false, 1)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();
        make_due(&f.pool, &run.id).await;

        // Simulate a stale pending row surviving a cancellation
        sqlx::query("UPDATE run SET status = 'cancelled' WHERE id = ?")
            .bind(&run.id)
            .execute(&f.pool)
            .await
            .unwrap();

        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(f.publisher.call_count(), 0);

        let posts = scheduled_posts(&f.pool, &run.id).await;
        assert_eq!(posts[0].status, PostStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_claimed_item_is_skipped_by_second_claim() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_sequence(&f.pool, "seq-1", &[(false, 1)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();
        make_due(&f.pool, &run.id).await;

        // Another tick already moved the item to processing
        let posts = scheduled_posts(&f.pool, &run.id).await;
        sqlx::query("UPDATE scheduled_post SET status = 'processing' WHERE id = ?")
            .bind(&posts[0].id)
            .execute(&f.pool)
            .await
            .unwrap();

        // The conditional claim loses without error
        let claimed = sqlx::query(
            "UPDATE scheduled_post SET status = 'processing', attempts = attempts + 1 WHERE id = ? AND status = 'pending'",
        )
        .bind(&posts[0].id)
        .execute(&f.pool)
        .await
        .unwrap();
        assert_eq!(claimed.rows_affected(), 0);

        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(f.publisher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_completes_through_runner() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_periodic(&f.pool, "per-1", "acct-1", true).await;
        seed_sequence(&f.pool, "seq-1", &[(false, 1)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();
        make_due(&f.pool, &run.id).await;

        f.runner.tick().await.unwrap();

        // Last day's only post succeeded: run completed, account warmed,
        // paused periodic post active again
        let run = f.warmups.get_run(&run.id).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);

        let account = f.warmups.get_account("acct-1").await.unwrap();
        assert_eq!(
            account.warming_status,
            crate::db::models::WarmingStatus::Warmed
        );
        assert!(account.active_run_id.is_none());

        let periodic = sqlx::query_as::<_, PeriodicPost>(
            "SELECT * FROM periodic_post WHERE id = 'per-1'",
        )
        .fetch_one(&f.pool)
        .await
        .unwrap();
        assert!(periodic.active);
    }

    #[tokio::test]
    async fn test_multi_day_run_advances_day_by_day() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_sequence(&f.pool, "seq-1", &[(false, 1), (true, 0), (false, 1)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();

        // Make only day 1 due
        sqlx::query(
            "UPDATE scheduled_post SET scheduled_at = '2000-01-01T00:00:00Z' WHERE run_id = ? AND day_index = 1",
        )
        .bind(&run.id)
        .execute(&f.pool)
        .await
        .unwrap();

        f.runner.tick().await.unwrap();
        let mid = f.warmups.get_run(&run.id).await.unwrap();
        assert_eq!(mid.status, RunStatus::Running);
        assert_eq!(mid.current_day, 3); // day 2 is rest

        make_due(&f.pool, &run.id).await;
        f.runner.tick().await.unwrap();

        let done = f.warmups.get_run(&run.id).await.unwrap();
        assert_eq!(done.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_periodic_due_and_interval() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_periodic(&f.pool, "per-1", "acct-1", true).await;

        // Never posted: due immediately
        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.periodic, 1);

        // Just posted: not due again inside the interval
        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.periodic, 0);

        let periodic = sqlx::query_as::<_, PeriodicPost>(
            "SELECT * FROM periodic_post WHERE id = 'per-1'",
        )
        .fetch_one(&f.pool)
        .await
        .unwrap();
        assert_eq!(periodic.times_posted, 1);
        assert!(periodic.last_posted_at.is_some());

        // Interval elapsed: due again
        sqlx::query("UPDATE periodic_post SET last_posted_at = '2000-01-01T00:00:00Z' WHERE id = 'per-1'")
            .execute(&f.pool)
            .await
            .unwrap();
        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.periodic, 1);
    }

    #[tokio::test]
    async fn test_paused_periodic_not_published() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_periodic(&f.pool, "per-1", "acct-1", true).await;
        seed_sequence(&f.pool, "seq-1", &[(false, 1)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();

        // Keep the warmup's own schedule out of the way
        sqlx::query("UPDATE scheduled_post SET scheduled_at = '2099-01-01T00:00:00Z' WHERE run_id = ?")
            .bind(&run.id)
            .execute(&f.pool)
            .await
            .unwrap();

        // Warmup paused the periodic post, so the tick publishes nothing
        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.periodic, 0);
        assert_eq!(f.publisher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_periodic_failure_recorded() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_periodic(&f.pool, "per-1", "acct-1", true).await;

        f.publisher.push_outcome(Err("boom"));
        let summary = f.runner.tick().await.unwrap();
        assert_eq!(summary.periodic, 0);

        let periodic = sqlx::query_as::<_, PeriodicPost>(
            "SELECT * FROM periodic_post WHERE id = 'per-1'",
        )
        .fetch_one(&f.pool)
        .await
        .unwrap();
        assert!(periodic.last_error.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_batch_limit_respected() {
        let f = fixture().await;
        seed_account(&f.pool, "acct-1").await;
        seed_sequence(&f.pool, "seq-1", &[(false, 5)]).await;
        let run = f.warmups.enroll("acct-1", "seq-1").await.unwrap();
        make_due(&f.pool, &run.id).await;

        let small = ExecutionRunner::new(
            f.pool.clone(),
            ContentResolver::new(f.pool.clone()),
            f.warmups.clone(),
            f.publisher.clone(),
            2,
        );

        let summary = small.tick().await.unwrap();
        assert_eq!(summary.processed, 2);

        // Remaining items surface on later ticks
        let summary = small.tick().await.unwrap();
        assert_eq!(summary.processed, 2);
        let summary = small.tick().await.unwrap();
        assert_eq!(summary.processed, 1);
    }
}

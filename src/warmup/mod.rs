/// Warmup runs and automation conflict management
///
/// An account has at most one driving automation at a time: either its
/// periodic posts or a warmup run. Enrollment snapshots and deactivates the
/// periodic posts; completion and cancellation restore them.

pub mod planner;
pub mod progress;

use crate::db::models::{Account, PausedAutomation, PeriodicPost, Run, RunStatus};
use crate::error::{AutomationError, AutomationResult};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;
use uuid::Uuid;

/// Manages run lifecycle and the mutual exclusion between automation types
#[derive(Clone)]
pub struct WarmupManager {
    db: SqlitePool,
}

impl WarmupManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Enroll an account into a sequence.
    ///
    /// Creates the run, pauses the account's active periodic posts and
    /// materializes the full schedule, all in one transaction. Any failure
    /// rolls the whole enrollment back.
    pub async fn enroll(&self, account_id: &str, sequence_id: &str) -> AutomationResult<Run> {
        let account = self.get_account(account_id).await?;

        // A stale active-run reference (run already terminal) does not block
        // re-enrollment; a live one does.
        if let Some(run_id) = &account.active_run_id {
            let existing = self.find_run(run_id).await?;
            match existing {
                Some(run) if run.status == RunStatus::Running => {
                    return Err(AutomationError::AccountAlreadyWarming);
                }
                _ => {
                    sqlx::query(
                        "UPDATE account SET active_run_id = NULL WHERE id = ? AND active_run_id = ?",
                    )
                    .bind(account_id)
                    .bind(run_id)
                    .execute(&self.db)
                    .await?;
                }
            }
        }

        let template = planner::load_template(&self.db, sequence_id).await?;
        if template.sequence.status != "active" {
            return Err(AutomationError::Validation(format!(
                "sequence {} is not active",
                sequence_id
            )));
        }

        let now = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let plan = planner::build_plan(
            &template,
            &run_id,
            account_id,
            now,
            &mut rand::thread_rng(),
        )?;

        // A run only ever progresses when one of its own scheduled posts
        // turns terminal. An empty plan would leave the run running and the
        // account's automations paused with nothing to finish it.
        if plan.is_empty() {
            return Err(AutomationError::Validation(format!(
                "sequence {} produces no scheduled posts",
                sequence_id
            )));
        }

        let mut tx = self.db.begin().await?;

        // Claim the account first; losing this guard means a concurrent
        // enrollment got there before us.
        let claimed = sqlx::query(
            r#"
            UPDATE account
            SET warming_status = 'warming', active_run_id = ?
            WHERE id = ? AND active_run_id IS NULL
            "#,
        )
        .bind(&run_id)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            return Err(AutomationError::AccountAlreadyWarming);
        }

        sqlx::query(
            r#"
            INSERT INTO run (id, account_id, sequence_id, status, current_day, started_at)
            VALUES (?, ?, ?, 'running', 1, ?)
            "#,
        )
        .bind(&run_id)
        .bind(account_id)
        .bind(sequence_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Snapshot every active periodic post so it can be restored later
        let active_periodic = sqlx::query_as::<_, PeriodicPost>(
            "SELECT * FROM periodic_post WHERE account_id = ? AND active = 1",
        )
        .bind(account_id)
        .fetch_all(&mut *tx)
        .await?;

        for periodic in &active_periodic {
            sqlx::query(
                r#"
                INSERT INTO paused_automation (id, run_id, account_id, periodic_post_id, paused_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&run_id)
            .bind(account_id)
            .bind(&periodic.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE periodic_post SET active = 0 WHERE account_id = ? AND active = 1")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        planner::insert_plan(&mut tx, &plan).await?;

        tx.commit().await?;

        info!(
            "Enrolled account {} into sequence {}: run {}, {} scheduled posts, {} automations paused",
            account_id,
            sequence_id,
            run_id,
            plan.len(),
            active_periodic.len()
        );

        self.get_run(&run_id).await
    }

    /// Cancel a run early.
    ///
    /// Pending scheduled posts are cancelled, the account goes back to
    /// `not_warmed` and every paused automation is unconditionally restored.
    pub async fn stop(&self, run_id: &str) -> AutomationResult<Run> {
        let run = self
            .find_run(run_id)
            .await?
            .ok_or_else(|| AutomationError::RunNotFound(run_id.to_string()))?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            "UPDATE run SET status = 'cancelled', completed_at = ? WHERE id = ? AND status = 'running'",
        )
        .bind(now)
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AutomationError::NotRunning(run_id.to_string()));
        }

        let cancelled = sqlx::query(
            "UPDATE scheduled_post SET status = 'cancelled' WHERE run_id = ? AND status = 'pending'",
        )
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE account SET warming_status = 'not_warmed', active_run_id = NULL WHERE id = ?",
        )
        .bind(&run.account_id)
        .execute(&mut *tx)
        .await?;

        let restored = Self::restore_paused(&mut tx, run_id).await?;

        tx.commit().await?;

        info!(
            "Stopped run {}: {} pending posts cancelled, {} automations restored",
            run_id,
            cancelled.rows_affected(),
            restored
        );

        self.get_run(run_id).await
    }

    /// Finalize a run whose schedule is exhausted.
    ///
    /// Invoked by day advancement; returns false when another invocation
    /// already completed (or cancelled) the run.
    pub async fn complete(&self, run_id: &str) -> AutomationResult<bool> {
        let run = self
            .find_run(run_id)
            .await?
            .ok_or_else(|| AutomationError::RunNotFound(run_id.to_string()))?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            "UPDATE run SET status = 'completed', completed_at = ? WHERE id = ? AND status = 'running'",
        )
        .bind(now)
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Someone else got here first (double tick, or a concurrent stop)
            return Ok(false);
        }

        sqlx::query(
            "UPDATE account SET warming_status = 'warmed', active_run_id = NULL WHERE id = ?",
        )
        .bind(&run.account_id)
        .execute(&mut *tx)
        .await?;

        let restored = Self::restore_paused(&mut tx, run_id).await?;

        tx.commit().await?;

        info!(
            "Completed run {}: account {} warmed, {} automations restored",
            run_id, run.account_id, restored
        );

        Ok(true)
    }

    /// Reactivate the automations snapshotted at enrollment and consume the
    /// records. Shared by completion and cancellation.
    async fn restore_paused(
        tx: &mut Transaction<'_, Sqlite>,
        run_id: &str,
    ) -> AutomationResult<u64> {
        let restored = sqlx::query(
            r#"
            UPDATE periodic_post SET active = 1
            WHERE id IN (SELECT periodic_post_id FROM paused_automation WHERE run_id = ?)
            "#,
        )
        .bind(run_id)
        .execute(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM paused_automation WHERE run_id = ?")
            .bind(run_id)
            .execute(&mut **tx)
            .await?;

        Ok(restored.rows_affected())
    }

    pub async fn get_run(&self, run_id: &str) -> AutomationResult<Run> {
        self.find_run(run_id)
            .await?
            .ok_or_else(|| AutomationError::RunNotFound(run_id.to_string()))
    }

    pub async fn find_run(&self, run_id: &str) -> AutomationResult<Option<Run>> {
        let run = sqlx::query_as::<_, Run>("SELECT * FROM run WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(run)
    }

    pub async fn get_account(&self, account_id: &str) -> AutomationResult<Account> {
        sqlx::query_as::<_, Account>("SELECT * FROM account WHERE id = ?")
            .bind(account_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AutomationError::NotFound(format!("account {}", account_id)))
    }

    pub async fn paused_automations(&self, run_id: &str) -> AutomationResult<Vec<PausedAutomation>> {
        let rows = sqlx::query_as::<_, PausedAutomation>(
            "SELECT * FROM paused_automation WHERE run_id = ?",
        )
        .bind(run_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

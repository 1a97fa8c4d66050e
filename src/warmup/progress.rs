/// Run/day state machine
///
/// Invoked by the execution runner after each item reaches a terminal
/// status. A day is done when every scheduled post persisted for it is
/// terminal (success, failed or cancelled all count); the run then moves
/// to the next day that actually has posts, or completes when none remain.
/// Every transition is a conditional update so duplicate invocations from
/// overlapping ticks advance at most once.
use crate::db::models::{Run, RunStatus};
use crate::error::AutomationResult;
use crate::warmup::WarmupManager;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Outcome of a progress check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayAdvance {
    /// Current day still has open posts
    NotDone,
    /// Run moved to this day index
    Advanced(i64),
    /// Schedule exhausted, run completed
    Completed,
    /// Another invocation already moved the run (or it is no longer running)
    AlreadyHandled,
}

/// Check the run's current day and advance or complete as needed.
///
/// Loops so that a single terminal item can carry the run across day
/// indices that hold no scheduled posts.
pub async fn check_day_progress(
    db: &SqlitePool,
    warmups: &WarmupManager,
    run_id: &str,
) -> AutomationResult<DayAdvance> {
    let mut outcome = DayAdvance::NotDone;

    loop {
        let run = match warmups.find_run(run_id).await? {
            Some(run) => run,
            None => return Ok(DayAdvance::AlreadyHandled),
        };

        if run.status != RunStatus::Running {
            return Ok(DayAdvance::AlreadyHandled);
        }

        if !day_is_done(db, &run).await? {
            return Ok(outcome);
        }

        let next_day: Option<i64> = sqlx::query_scalar(
            "SELECT MIN(day_index) FROM scheduled_post WHERE run_id = ? AND day_index > ?",
        )
        .bind(run_id)
        .bind(run.current_day)
        .fetch_one(db)
        .await?;

        match next_day {
            Some(next) => {
                let updated = sqlx::query(
                    "UPDATE run SET current_day = ? WHERE id = ? AND status = 'running' AND current_day = ?",
                )
                .bind(next)
                .bind(run_id)
                .bind(run.current_day)
                .execute(db)
                .await?;

                if updated.rows_affected() == 0 {
                    return Ok(DayAdvance::AlreadyHandled);
                }

                info!("Run {} advanced to day {}", run_id, next);
                outcome = DayAdvance::Advanced(next);
                // The next day may already be terminal too; re-evaluate
            }
            None => {
                return if warmups.complete(run_id).await? {
                    Ok(DayAdvance::Completed)
                } else {
                    Ok(DayAdvance::AlreadyHandled)
                };
            }
        }
    }
}

/// A day with no persisted posts (rest day, or enrollment landed past it)
/// counts as done.
async fn day_is_done(db: &SqlitePool, run: &Run) -> AutomationResult<bool> {
    let (total, terminal): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(status IN ('success', 'failed', 'cancelled')), 0)
        FROM scheduled_post
        WHERE run_id = ? AND day_index = ?
        "#,
    )
    .bind(&run.id)
    .bind(run.current_day)
    .fetch_one(db)
    .await?;

    debug!(
        "Run {} day {}: {}/{} terminal",
        run.id, run.current_day, terminal, total
    );

    Ok(terminal >= total)
}

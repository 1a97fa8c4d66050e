/// Background task implementations
use crate::{context::AppContext, error::AutomationResult, warmup::progress};
use chrono::{Duration, Utc};
use sqlx::Row;

/// Fail scheduled posts stuck in `processing` past the configured TTL.
///
/// A runner that crashed between claiming an item and writing its outcome
/// leaves the row in `processing` forever, which also freezes the owning
/// run's day accounting. The sweep marks such items failed (the publish is
/// NOT retried; the idempotency key makes a rerun safe server-side) and
/// re-checks day progress for the affected runs.
pub async fn sweep_stale_processing(ctx: &AppContext) -> AutomationResult<u64> {
    let cutoff = Utc::now() - Duration::seconds(ctx.config.runner.processing_ttl_secs as i64);

    let stale = sqlx::query(
        "SELECT id, run_id FROM scheduled_post WHERE status = 'processing' AND processing_at <= ?",
    )
    .bind(cutoff)
    .fetch_all(&ctx.db)
    .await?;

    let mut swept = 0;
    let mut run_ids: Vec<String> = Vec::new();

    for row in stale {
        let id: String = row.try_get("id")?;
        let run_id: String = row.try_get("run_id")?;

        let updated = sqlx::query(
            r#"
            UPDATE scheduled_post
            SET status = 'failed', error = 'processing timed out', executed_at = ?
            WHERE id = ? AND status = 'processing'
            "#,
        )
        .bind(Utc::now())
        .bind(&id)
        .execute(&ctx.db)
        .await?;

        if updated.rows_affected() > 0 {
            tracing::warn!("Scheduled post {} timed out in processing", id);
            swept += 1;
            if !run_ids.contains(&run_id) {
                run_ids.push(run_id);
            }
        }
    }

    // Timed-out items are terminal; their runs may now be able to advance
    for run_id in run_ids {
        progress::check_day_progress(&ctx.db, &ctx.warmups, &run_id).await?;
    }

    Ok(swept)
}

/// Health check - verify the store is reachable
pub async fn health_check(ctx: &AppContext) -> AutomationResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;

    Ok(())
}

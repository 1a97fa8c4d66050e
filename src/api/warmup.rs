/// Warmup run endpoints: enrollment, cancellation, inspection
use crate::context::AppContext;
use crate::db::models::Run;
use crate::error::AutomationResult;
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/warmup/enroll", post(enroll))
        .route("/api/warmup/runs/:id", get(get_run))
        .route("/api/warmup/runs/:id/stop", post(stop_run))
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub account_id: String,
    pub sequence_id: String,
}

/// Per-day progress counters for a run
#[derive(Debug, Serialize, FromRow)]
pub struct DayProgress {
    pub day_index: i64,
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub success: i64,
    pub failed: i64,
    pub cancelled: i64,
}

#[derive(Debug, Serialize)]
pub struct RunView {
    #[serde(flatten)]
    pub run: Run,
    pub days: Vec<DayProgress>,
}

/// Enroll an account into a sequence
async fn enroll(
    State(ctx): State<AppContext>,
    Json(request): Json<EnrollRequest>,
) -> AutomationResult<Json<Run>> {
    let run = ctx
        .warmups
        .enroll(&request.account_id, &request.sequence_id)
        .await?;
    Ok(Json(run))
}

/// Stop a run early
async fn stop_run(
    State(ctx): State<AppContext>,
    Path(run_id): Path<String>,
) -> AutomationResult<Json<Run>> {
    let run = ctx.warmups.stop(&run_id).await?;
    Ok(Json(run))
}

/// Inspect a run and its per-day progress
async fn get_run(
    State(ctx): State<AppContext>,
    Path(run_id): Path<String>,
) -> AutomationResult<Json<RunView>> {
    let run = ctx.warmups.get_run(&run_id).await?;

    let days = sqlx::query_as::<_, DayProgress>(
        r#"
        SELECT
            day_index,
            COUNT(*) AS total,
            COALESCE(SUM(status = 'pending'), 0) AS pending,
            COALESCE(SUM(status = 'processing'), 0) AS processing,
            COALESCE(SUM(status = 'success'), 0) AS success,
            COALESCE(SUM(status = 'failed'), 0) AS failed,
            COALESCE(SUM(status = 'cancelled'), 0) AS cancelled
        FROM scheduled_post
        WHERE run_id = ?
        GROUP BY day_index
        ORDER BY day_index
        "#,
    )
    .bind(&run_id)
    .fetch_all(&ctx.db)
    .await?;

    Ok(Json(RunView { run, days }))
}

/// Runner trigger endpoint
///
/// External schedulers (cron, platform timers) can drive execution by
/// hitting this endpoint; it is the same entry point the in-process
/// interval loop uses, and safe to combine with it.
use crate::context::AppContext;
use crate::error::AutomationResult;
use crate::runner::TickSummary;
use axum::{extract::State, response::Json, routing::post, Router};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/runner/tick", post(tick))
}

/// Run one execution pass over due work
async fn tick(State(ctx): State<AppContext>) -> AutomationResult<Json<TickSummary>> {
    let summary = ctx.runner.tick().await?;
    Ok(Json(summary))
}

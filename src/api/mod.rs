/// API routes and handlers
pub mod runner;
pub mod warmup;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(warmup::routes())
        .merge(runner::routes())
}

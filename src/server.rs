/// HTTP server setup and routing
use crate::{
    context::AppContext,
    error::{AutomationError, AutomationResult},
    jobs,
};
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_check))
        .merge(crate::api::routes())
        .with_state(ctx)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// Health check handler
async fn health_check(
    State(ctx): State<AppContext>,
) -> AutomationResult<Json<serde_json::Value>> {
    jobs::tasks::health_check(&ctx).await?;

    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> AutomationResult<()> {
    let addr = format!(
        "{}:{}",
        ctx.config.service.hostname, ctx.config.service.port
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AutomationError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Listening on http://{}", addr);

    let router = build_router(ctx);
    axum::serve(listener, router)
        .await
        .map_err(|e| AutomationError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

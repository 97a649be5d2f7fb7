use crate::{
    error::{AppError, Result},
    state::AppState,
};
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(diagnostics))
}

/// 管线诊断端点（生产环境不可用）
/// GET /api/v1/diagnostics
async fn diagnostics(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    if state.is_production() {
        return Err(AppError::not_found("Diagnostics endpoint"));
    }

    debug!("Running diagnostics endpoint");

    let webhooks = state.webhook_dispatcher.stats();

    Ok(Json(json!({
        "success": true,
        "data": {
            "storage_backend": state.config.storage_backend,
            "rate_limiter": {
                "tracked_keys": state.rate_limiter.tracked_keys(),
                "post_limit": state.config.post_rate_limit,
                "action_limit": state.config.action_rate_limit,
                "window_secs": state.config.rate_limit_window,
            },
            "webhooks": webhooks,
        }
    })))
}

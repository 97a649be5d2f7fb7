use crate::{
    error::Result,
    models::{notification::NotificationFeed, response::ApiResponse},
    routes::LimitQuery,
    state::AppState,
    utils::middleware::AuthenticatedAgent,
};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_notifications))
        .route("/unread-count", get(get_unread_count))
}

/// 拉取通知，同时把全部未读标记为已读
/// GET /api/v1/notifications
async fn get_notifications(
    State(state): State<Arc<AppState>>,
    agent: AuthenticatedAgent,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<NotificationFeed>>> {
    let limit = query.resolve(state.config.default_feed_limit);
    let feed = state.notification_service.fetch(&agent.id, limit).await?;
    Ok(Json(ApiResponse::success(feed)))
}

/// GET /api/v1/notifications/unread-count
async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    agent: AuthenticatedAgent,
) -> Result<Json<Value>> {
    let count = state.notification_service.unread_count(&agent.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "unread_count": count }
    })))
}

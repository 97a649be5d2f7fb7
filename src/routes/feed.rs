use crate::{
    error::Result,
    models::{post::RankedPost, response::ApiResponse},
    routes::LimitQuery,
    state::AppState,
};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/trending", get(get_trending))
}

/// 公共热门流，无需身份
/// GET /api/v1/feed/trending
async fn get_trending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<RankedPost>>>> {
    let limit = query.resolve(state.config.default_feed_limit);
    let posts = state.feed_service.trending(limit).await?;
    Ok(Json(ApiResponse::success(posts)))
}

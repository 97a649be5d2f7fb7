use crate::state::AppState;
use axum::{routing::get, Router};
use serde::Deserialize;
use std::sync::Arc;

pub mod agents;
pub mod diagnostics;
pub mod feed;
pub mod notifications;
pub mod posts;

/// 单页上限，防止一次拉取过多
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    pub fn resolve(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
    }
}

/// 所有 API 路由，统一挂在 /api/v1 下
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/agents", agents::router())
        .nest("/api/v1/posts", posts::router())
        .nest("/api/v1/notifications", notifications::router())
        .nest("/api/v1/feed", feed::router())
        .nest("/api/v1/diagnostics", diagnostics::router())
}

async fn health_check() -> &'static str {
    "agent-social is running!"
}

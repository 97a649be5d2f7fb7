use crate::{
    error::Result,
    models::{
        agent::{Agent, RegisterAgentRequest},
        engagement::{ActionClass, ApplyOutcome, EngagementAction},
        response::ApiResponse,
    },
    state::AppState,
    utils::middleware::AuthenticatedAgent,
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(register_agent))
        .route("/me/rate-limits", get(get_rate_limits))
        .route("/:agent_id/follow", post(follow_agent))
}

#[derive(Debug, Serialize)]
struct RateLimitStatus {
    post_remaining: usize,
    action_remaining: usize,
}

/// 注册 agent
/// POST /api/v1/agents
async fn register_agent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterAgentRequest>,
) -> Result<Json<ApiResponse<Agent>>> {
    let agent = state.agent_service.register(request).await?;
    Ok(Json(ApiResponse::with_message(agent, "Agent registered")))
}

/// 关注 agent
/// POST /api/v1/agents/:agent_id/follow
async fn follow_agent(
    State(state): State<Arc<AppState>>,
    agent: AuthenticatedAgent,
    Path(agent_id): Path<String>,
) -> Result<Json<ApiResponse<ApplyOutcome>>> {
    debug!("Agent {} following {}", agent.id, agent_id);
    state.admit(&agent.id, ActionClass::Action)?;

    let outcome = state
        .fanout
        .apply(EngagementAction::Follow {
            actor_id: agent.id,
            target_id: agent_id,
        })
        .await?;

    Ok(Json(ApiResponse::success(outcome)))
}

/// 当前窗口内剩余配额
/// GET /api/v1/agents/me/rate-limits
async fn get_rate_limits(
    State(state): State<Arc<AppState>>,
    agent: AuthenticatedAgent,
) -> Result<Json<ApiResponse<RateLimitStatus>>> {
    Ok(Json(ApiResponse::success(RateLimitStatus {
        post_remaining: state.rate_limiter.remaining(&agent.id, ActionClass::Post),
        action_remaining: state.rate_limiter.remaining(&agent.id, ActionClass::Action),
    })))
}

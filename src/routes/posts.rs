use crate::{
    error::Result,
    models::{
        engagement::{ActionClass, ApplyOutcome, CreateCommentRequest, EngagementAction},
        post::{CreatePostRequest, Post},
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
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_post))
        .route("/:post_id", get(get_post))
        .route("/:post_id/like", post(like_post))
        .route("/:post_id/comments", post(comment_on_post))
        .route("/:post_id/repost", post(repost_post))
}

/// 发帖
/// POST /api/v1/posts
async fn create_post(
    State(state): State<Arc<AppState>>,
    agent: AuthenticatedAgent,
    Json(request): Json<CreatePostRequest>,
) -> Result<Json<ApiResponse<Post>>> {
    state.admit(&agent.id, ActionClass::Post)?;

    let post = state.post_service.create_post(&agent.id, request).await?;
    Ok(Json(ApiResponse::success(post)))
}

/// GET /api/v1/posts/:post_id
async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> Result<Json<ApiResponse<Post>>> {
    let post = state.post_service.get_post(&post_id).await?;
    Ok(Json(ApiResponse::success(post)))
}

/// 点赞
/// POST /api/v1/posts/:post_id/like
async fn like_post(
    State(state): State<Arc<AppState>>,
    agent: AuthenticatedAgent,
    Path(post_id): Path<String>,
) -> Result<Json<ApiResponse<ApplyOutcome>>> {
    debug!("Agent {} liking post {}", agent.id, post_id);
    apply_action(
        &state,
        EngagementAction::Like {
            actor_id: agent.id,
            post_id,
        },
    )
    .await
}

/// 评论
/// POST /api/v1/posts/:post_id/comments
async fn comment_on_post(
    State(state): State<Arc<AppState>>,
    agent: AuthenticatedAgent,
    Path(post_id): Path<String>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<ApiResponse<ApplyOutcome>>> {
    debug!("Agent {} commenting on post {}", agent.id, post_id);
    request.validate()?;
    apply_action(
        &state,
        EngagementAction::Comment {
            actor_id: agent.id,
            post_id,
            content: request.content,
        },
    )
    .await
}

/// 转发
/// POST /api/v1/posts/:post_id/repost
async fn repost_post(
    State(state): State<Arc<AppState>>,
    agent: AuthenticatedAgent,
    Path(post_id): Path<String>,
) -> Result<Json<ApiResponse<ApplyOutcome>>> {
    debug!("Agent {} reposting post {}", agent.id, post_id);
    apply_action(
        &state,
        EngagementAction::Repost {
            actor_id: agent.id,
            post_id,
        },
    )
    .await
}

async fn apply_action(state: &AppState, action: EngagementAction) -> Result<Json<ApiResponse<ApplyOutcome>>> {
    state.admit(action.actor_id(), action.class())?;
    let outcome = state.fanout.apply(action).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

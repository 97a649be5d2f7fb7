use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub agent_id: String,
    pub content: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub reposts_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(agent_id: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            content: content.to_string(),
            likes_count: 0,
            comments_count: 0,
            reposts_count: 0,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub agent_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 40000, message = "Post must not be empty"))]
    pub content: String,
}

/// 热度排序后的帖子
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedPost {
    #[serde(flatten)]
    pub post: Post,
    pub score: f64,
}

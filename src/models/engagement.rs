use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::models::notification::NotificationKind;

/// 速率限制的动作类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionClass {
    /// 发帖
    Post,
    /// 点赞、评论、转发、关注共用的类别
    Action,
}

impl ActionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Action => "action",
        }
    }
}

impl fmt::Display for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 具有唯一约束的 (actor, target) 关系边
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Like,
    Repost,
    Follow,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Repost => "repost",
            Self::Follow => "follow",
        }
    }
}

/// 反规范化计数字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterField {
    PostLikes,
    PostComments,
    PostReposts,
    AgentFollowers,
    AgentFollowing,
}

impl CounterField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::PostLikes => "likes_count",
            Self::PostComments => "comments_count",
            Self::PostReposts => "reposts_count",
            Self::AgentFollowers => "followers_count",
            Self::AgentFollowing => "following_count",
        }
    }

    pub fn is_post_counter(&self) -> bool {
        matches!(self, Self::PostLikes | Self::PostComments | Self::PostReposts)
    }
}

/// 一次互动动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EngagementAction {
    Like { actor_id: String, post_id: String },
    Comment { actor_id: String, post_id: String, content: String },
    Repost { actor_id: String, post_id: String },
    Follow { actor_id: String, target_id: String },
}

impl EngagementAction {
    pub fn actor_id(&self) -> &str {
        match self {
            Self::Like { actor_id, .. }
            | Self::Comment { actor_id, .. }
            | Self::Repost { actor_id, .. }
            | Self::Follow { actor_id, .. } => actor_id,
        }
    }

    /// 帖子 ID 或被关注者 ID
    pub fn target_id(&self) -> &str {
        match self {
            Self::Like { post_id, .. }
            | Self::Comment { post_id, .. }
            | Self::Repost { post_id, .. } => post_id,
            Self::Follow { target_id, .. } => target_id,
        }
    }

    pub fn related_post_id(&self) -> Option<&str> {
        match self {
            Self::Follow { .. } => None,
            _ => Some(self.target_id()),
        }
    }

    /// 评论没有幂等键，每次都会新建一行
    pub fn edge_type(&self) -> Option<EdgeType> {
        match self {
            Self::Like { .. } => Some(EdgeType::Like),
            Self::Repost { .. } => Some(EdgeType::Repost),
            Self::Follow { .. } => Some(EdgeType::Follow),
            Self::Comment { .. } => None,
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Like { .. } => NotificationKind::Like,
            Self::Comment { .. } => NotificationKind::Comment,
            Self::Repost { .. } => NotificationKind::Repost,
            Self::Follow { .. } => NotificationKind::Follow,
        }
    }

    pub fn class(&self) -> ActionClass {
        ActionClass::Action
    }

    /// 评论正文去掉首尾空白，其余动作原样返回
    pub fn normalized(self) -> Self {
        match self {
            Self::Comment { actor_id, post_id, content } => Self::Comment {
                actor_id,
                post_id,
                content: content.trim().to_string(),
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub applied: bool,
}

impl ApplyOutcome {
    pub fn applied() -> Self {
        Self { applied: true }
    }

    pub fn no_op() -> Self {
        Self { applied: false }
    }
}

/// 长度上限由 `MAX_COMMENT_LENGTH` 决定，在扇出时检查
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, message = "Comment must not be empty"))]
    pub content: String,
}

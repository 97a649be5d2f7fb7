use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub from_agent_id: String,
    pub related_post_id: Option<String>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationRequest {
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub from_agent_id: String,
    pub related_post_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Repost,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Repost => "repost",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "repost" => Ok(Self::Repost),
            "follow" => Ok(Self::Follow),
            other => Err(format!("unknown notification kind: {}", other)),
        }
    }
}

/// 通知列表响应；`newly_read` 为本次拉取批量标记为已读的条数，
/// `unreturned` 为其中没有出现在本页的条数（超出 limit 或拉取期间新到达）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub newly_read: u64,
    pub unreturned: u64,
}

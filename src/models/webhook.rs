use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::notification::NotificationKind;

/// 待投递的 webhook 任务，只存在于内存队列中
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookJob {
    pub target_url: String,
    pub event_kind: NotificationKind,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
}

impl WebhookJob {
    pub fn new(target_url: impl Into<String>, event_kind: NotificationKind, payload: serde_json::Value) -> Self {
        Self {
            target_url: target_url.into(),
            event_kind,
            payload,
            enqueued_at: Utc::now(),
        }
    }

    /// 线上请求体 `{event, payload}`
    pub fn envelope(&self) -> WebhookEnvelope<'_> {
        WebhookEnvelope {
            event: self.event_kind,
            payload: &self.payload,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookEnvelope<'a> {
    pub event: NotificationKind,
    pub payload: &'a serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookStats {
    pub queued: usize,
    pub delivered: u64,
    pub failed: u64,
    pub dropped: u64,
}

use crate::{
    config::Config,
    error::Result,
    models::notification::*,
    services::store::EngagementStore,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn EngagementStore>,
    message_max_length: usize,
}

impl NotificationService {
    pub fn new(store: Arc<dyn EngagementStore>, config: &Config) -> Self {
        Self {
            store,
            message_max_length: config.notification_message_max_length,
        }
    }

    /// 写入一条未读通知，消息按固定长度截断
    pub async fn create_notification(&self, request: CreateNotificationRequest) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: request.recipient_id,
            kind: request.kind,
            from_agent_id: request.from_agent_id,
            related_post_id: request.related_post_id,
            message: truncate_message(&request.message, self.message_max_length),
            read: false,
            created_at: Utc::now(),
        };

        self.store.insert_notification(&notification).await?;
        debug!(
            "Created {} notification {} for {}",
            notification.kind, notification.id, notification.recipient_id
        );
        Ok(notification)
    }

    /// 拉取通知列表，随后把该接收者所有未读通知一次性标记为已读。
    /// 返回的通知保留拉取前的已读状态。
    ///
    /// 标记是整批的：超出 `limit` 的未读通知，以及两次调用之间新到达的通知，
    /// 也会被标记为已读但不在本页返回，数量记在 `unreturned` 中。
    pub async fn fetch(&self, agent_id: &str, limit: usize) -> Result<NotificationFeed> {
        let notifications = self.store.list_notifications(agent_id, limit).await?;
        let newly_read = self.store.mark_all_notifications_read(agent_id).await?;

        let returned_unread = notifications.iter().filter(|n| !n.read).count() as u64;
        let unreturned = newly_read.saturating_sub(returned_unread);

        if newly_read > 0 {
            info!("Marked {} notifications read for {}", newly_read, agent_id);
        }
        if unreturned > 0 {
            debug!("{} notifications for {} were marked read beyond the page", unreturned, agent_id);
        }

        Ok(NotificationFeed {
            notifications,
            newly_read,
            unreturned,
        })
    }

    pub async fn unread_count(&self, agent_id: &str) -> Result<u64> {
        self.store.count_unread_notifications(agent_id).await
    }
}

/// 按字符截断，超长时以 "..." 结尾且总长不超过 max_chars
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    const ELLIPSIS: &str = "...";
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = message.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated.chars().take(max_chars).collect()
}

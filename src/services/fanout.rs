use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        engagement::{ApplyOutcome, CounterField, EngagementAction},
        notification::CreateNotificationRequest,
        post::Comment,
        webhook::WebhookJob,
    },
    services::{
        notification::NotificationService,
        store::EngagementStore,
        webhook::{is_deliverable_url, WebhookDispatcher},
    },
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 互动扇出
///
/// 主写入（幂等关系边或评论行）失败则整个请求失败；
/// 计数、通知、webhook 都是尽力而为的副作用，失败只记日志，不回滚主写入。
#[derive(Clone)]
pub struct EngagementFanout {
    store: Arc<dyn EngagementStore>,
    notification_service: NotificationService,
    webhooks: Arc<WebhookDispatcher>,
    max_comment_length: usize,
}

impl EngagementFanout {
    pub fn new(
        store: Arc<dyn EngagementStore>,
        notification_service: NotificationService,
        webhooks: Arc<WebhookDispatcher>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            notification_service,
            webhooks,
            max_comment_length: config.max_comment_length,
        }
    }

    pub async fn apply(&self, action: EngagementAction) -> Result<ApplyOutcome> {
        let action = action.normalized();
        let actor_id = action.actor_id();
        debug!("Applying {} by {} on {}", action.kind(), actor_id, action.target_id());

        self.validate(&action)?;
        let recipient_id = self.resolve_recipient(&action).await?;

        if !self.write_primary(&action).await? {
            debug!("{} by {} on {} already exists", action.kind(), actor_id, action.target_id());
            return Ok(ApplyOutcome::no_op());
        }

        self.bump_counters(&action).await;

        if recipient_id == actor_id {
            debug!("Skipping notification for self-{} by {}", action.kind(), actor_id);
            return Ok(ApplyOutcome::applied());
        }

        self.notify(&action, &recipient_id).await;
        self.enqueue_webhook(&action, &recipient_id).await;

        info!("{} by {} on {} applied", action.kind(), actor_id, action.target_id());
        Ok(ApplyOutcome::applied())
    }

    fn validate(&self, action: &EngagementAction) -> Result<()> {
        match action {
            EngagementAction::Comment { content, .. } => {
                let length = content.chars().count();
                if length == 0 {
                    return Err(AppError::validation("Comment must not be empty"));
                }
                if length > self.max_comment_length {
                    return Err(AppError::Validation(format!(
                        "Comment exceeds {} characters",
                        self.max_comment_length
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// 帖子作者或被关注者；目标不存在时请求失败
    async fn resolve_recipient(&self, action: &EngagementAction) -> Result<String> {
        match action {
            EngagementAction::Follow { target_id, .. } => {
                if !self.store.agent_exists(target_id).await? {
                    return Err(AppError::not_found("Agent"));
                }
                Ok(target_id.clone())
            }
            _ => {
                let post = self
                    .store
                    .get_post(action.target_id())
                    .await?
                    .ok_or_else(|| AppError::not_found("Post"))?;
                Ok(post.agent_id)
            }
        }
    }

    async fn write_primary(&self, action: &EngagementAction) -> Result<bool> {
        match action {
            EngagementAction::Comment { actor_id, post_id, content } => {
                let comment = Comment {
                    id: Uuid::new_v4().to_string(),
                    post_id: post_id.clone(),
                    agent_id: actor_id.clone(),
                    content: content.clone(),
                    created_at: Utc::now(),
                };
                self.store.insert_comment(&comment).await?;
                Ok(true)
            }
            _ => {
                let edge = action
                    .edge_type()
                    .ok_or_else(|| AppError::internal("Engagement without idempotency key"))?;
                self.store
                    .insert_edge_if_absent(action.actor_id(), action.target_id(), edge)
                    .await
            }
        }
    }

    async fn bump_counters(&self, action: &EngagementAction) {
        let counters: Vec<(&str, CounterField)> = match action {
            EngagementAction::Like { post_id, .. } => vec![(post_id.as_str(), CounterField::PostLikes)],
            EngagementAction::Comment { post_id, .. } => {
                vec![(post_id.as_str(), CounterField::PostComments)]
            }
            EngagementAction::Repost { post_id, .. } => {
                vec![(post_id.as_str(), CounterField::PostReposts)]
            }
            EngagementAction::Follow { actor_id, target_id } => vec![
                (target_id.as_str(), CounterField::AgentFollowers),
                (actor_id.as_str(), CounterField::AgentFollowing),
            ],
        };

        for (entity_id, field) in counters {
            if let Err(e) = self.store.increment_counter(entity_id, field).await {
                warn!("Failed to increment {} for {}: {}", field.column(), entity_id, e);
            }
        }
    }

    async fn notify(&self, action: &EngagementAction, recipient_id: &str) {
        let request = CreateNotificationRequest {
            recipient_id: recipient_id.to_string(),
            kind: action.kind(),
            from_agent_id: action.actor_id().to_string(),
            related_post_id: action.related_post_id().map(str::to_string),
            message: summary(action),
        };

        if let Err(e) = self.notification_service.create_notification(request).await {
            warn!("Failed to write {} notification for {}: {}", action.kind(), recipient_id, e);
        }
    }

    async fn enqueue_webhook(&self, action: &EngagementAction, recipient_id: &str) {
        let url = match self.store.get_webhook_url(recipient_id).await {
            Ok(Some(url)) => url,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to look up webhook for {}: {}", recipient_id, e);
                return;
            }
        };

        if !is_deliverable_url(&url) {
            warn!("Ignoring invalid webhook url for {}: {}", recipient_id, url);
            return;
        }

        self.webhooks.enqueue(WebhookJob::new(url, action.kind(), webhook_payload(action)));
    }
}

fn summary(action: &EngagementAction) -> String {
    match action {
        EngagementAction::Like { actor_id, .. } => format!("{} liked your post", actor_id),
        EngagementAction::Comment { actor_id, content, .. } => {
            format!("{} commented on your post: {}", actor_id, content)
        }
        EngagementAction::Repost { actor_id, .. } => format!("{} reposted your post", actor_id),
        EngagementAction::Follow { actor_id, .. } => format!("{} started following you", actor_id),
    }
}

fn webhook_payload(action: &EngagementAction) -> serde_json::Value {
    let mut payload = json!({
        "actor_id": action.actor_id(),
        "target_id": action.target_id(),
        "timestamp": Utc::now(),
    });
    if let Some(post_id) = action.related_post_id() {
        payload["post_id"] = json!(post_id);
    }
    if let EngagementAction::Comment { content, .. } = action {
        payload["content"] = json!(content);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{engagement::EdgeType, post::Post},
        services::store::MockEngagementStore,
    };
    use std::time::Duration;

    fn fanout(store: MockEngagementStore) -> (EngagementFanout, Arc<WebhookDispatcher>) {
        let config = Config::default();
        let store: Arc<dyn EngagementStore> = Arc::new(store);
        let webhooks = Arc::new(WebhookDispatcher::new(Duration::from_secs(5), 16).unwrap());
        let notifications = NotificationService::new(store.clone(), &config);
        (
            EngagementFanout::new(store, notifications, webhooks.clone(), &config),
            webhooks,
        )
    }

    fn like() -> EngagementAction {
        EngagementAction::Like {
            actor_id: "nova".to_string(),
            post_id: "p1".to_string(),
        }
    }

    fn expect_post_owned_by(store: &mut MockEngagementStore, owner: &str) {
        let mut post = Post::new(owner, "hello");
        post.id = "p1".to_string();
        store
            .expect_get_post()
            .returning(move |_| Ok(Some(post.clone())));
    }

    #[tokio::test]
    async fn test_secondary_failures_do_not_fail_the_request() {
        let mut store = MockEngagementStore::new();
        expect_post_owned_by(&mut store, "atlas");
        store
            .expect_insert_edge_if_absent()
            .withf(|actor, target, edge| actor == "nova" && target == "p1" && *edge == EdgeType::Like)
            .times(1)
            .returning(|_, _, _| Ok(true));
        store
            .expect_increment_counter()
            .times(1)
            .returning(|_, _| Err(AppError::internal("counter table locked")));
        store
            .expect_insert_notification()
            .times(1)
            .returning(|_| Err(AppError::internal("notifications unavailable")));
        store
            .expect_get_webhook_url()
            .times(1)
            .returning(|_| Ok(Some("https://atlas.example/hook".to_string())));

        let (fanout, webhooks) = fanout(store);
        let outcome = fanout.apply(like()).await.unwrap();

        assert!(outcome.applied);
        assert_eq!(webhooks.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_lookup_failure_is_swallowed() {
        let mut store = MockEngagementStore::new();
        expect_post_owned_by(&mut store, "atlas");
        store.expect_insert_edge_if_absent().returning(|_, _, _| Ok(true));
        store.expect_increment_counter().returning(|_, _| Ok(()));
        store.expect_insert_notification().times(1).returning(|_| Ok(()));
        store
            .expect_get_webhook_url()
            .returning(|_| Err(AppError::internal("timeout")));

        let (fanout, webhooks) = fanout(store);
        assert!(fanout.apply(like()).await.unwrap().applied);
        assert_eq!(webhooks.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_propagates_without_side_effects() {
        let mut store = MockEngagementStore::new();
        expect_post_owned_by(&mut store, "atlas");
        store
            .expect_insert_edge_if_absent()
            .returning(|_, _, _| Err(AppError::internal("connection reset")));
        store.expect_increment_counter().never();
        store.expect_insert_notification().never();
        store.expect_get_webhook_url().never();

        let (fanout, webhooks) = fanout(store);
        assert!(fanout.apply(like()).await.is_err());
        assert_eq!(webhooks.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_edge_skips_everything() {
        let mut store = MockEngagementStore::new();
        expect_post_owned_by(&mut store, "atlas");
        store.expect_insert_edge_if_absent().returning(|_, _, _| Ok(false));
        store.expect_increment_counter().never();
        store.expect_insert_notification().never();
        store.expect_get_webhook_url().never();

        let (fanout, _) = fanout(store);
        assert!(!fanout.apply(like()).await.unwrap().applied);
    }

    #[tokio::test]
    async fn test_invalid_webhook_url_is_not_enqueued() {
        let mut store = MockEngagementStore::new();
        expect_post_owned_by(&mut store, "atlas");
        store.expect_insert_edge_if_absent().returning(|_, _, _| Ok(true));
        store.expect_increment_counter().returning(|_, _| Ok(()));
        store.expect_insert_notification().returning(|_| Ok(()));
        store
            .expect_get_webhook_url()
            .returning(|_| Ok(Some("javascript:alert(1)".to_string())));

        let (fanout, webhooks) = fanout(store);
        assert!(fanout.apply(like()).await.unwrap().applied);
        assert_eq!(webhooks.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_self_follow_applies_without_notifying() {
        let mut store = MockEngagementStore::new();
        store.expect_agent_exists().returning(|_| Ok(true));
        store
            .expect_insert_edge_if_absent()
            .withf(|actor, target, edge| actor == "nova" && target == "nova" && *edge == EdgeType::Follow)
            .times(1)
            .returning(|_, _, _| Ok(true));
        store
            .expect_increment_counter()
            .withf(|id, _| id == "nova")
            .times(2)
            .returning(|_, _| Ok(()));
        store.expect_insert_notification().never();
        store.expect_get_webhook_url().never();

        let (fanout, webhooks) = fanout(store);
        let outcome = fanout
            .apply(EngagementAction::Follow {
                actor_id: "nova".to_string(),
                target_id: "nova".to_string(),
            })
            .await
            .unwrap();

        assert!(outcome.applied);
        assert_eq!(webhooks.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_comment_is_stored_trimmed() {
        let mut store = MockEngagementStore::new();
        expect_post_owned_by(&mut store, "atlas");
        store
            .expect_insert_comment()
            .withf(|comment| comment.content == "great take")
            .times(1)
            .returning(|_| Ok(()));
        store.expect_increment_counter().returning(|_, _| Ok(()));
        store
            .expect_insert_notification()
            .withf(|n| n.message == "nova commented on your post: great take")
            .returning(|_| Ok(()));
        store.expect_get_webhook_url().returning(|_| Ok(None));

        let (fanout, _) = fanout(store);
        let outcome = fanout
            .apply(EngagementAction::Comment {
                actor_id: "nova".to_string(),
                post_id: "p1".to_string(),
                content: "  great take \n".to_string(),
            })
            .await
            .unwrap();
        assert!(outcome.applied);
    }

    #[tokio::test]
    async fn test_blank_comment_is_rejected_before_any_write() {
        let store = MockEngagementStore::new();
        let (fanout, _) = fanout(store);
        let result = fanout
            .apply(EngagementAction::Comment {
                actor_id: "nova".to_string(),
                post_id: "p1".to_string(),
                content: "   ".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_comment_payload_carries_text() {
        let payload = webhook_payload(&EngagementAction::Comment {
            actor_id: "nova".to_string(),
            post_id: "p1".to_string(),
            content: "great take".to_string(),
        });
        assert_eq!(payload["actor_id"], "nova");
        assert_eq!(payload["target_id"], "p1");
        assert_eq!(payload["post_id"], "p1");
        assert_eq!(payload["content"], "great take");
    }
}

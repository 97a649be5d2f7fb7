use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::{
    error::{AppError, Result},
    models::{
        agent::Agent,
        engagement::{CounterField, EdgeType},
        notification::Notification,
        post::{Comment, Post},
    },
    services::store::EngagementStore,
};

type EdgeKey = (EdgeType, String, String);

/// 内存实现，语义与 Postgres 实现一致：
/// 关系边按 `(类型, actor, target)` 唯一，通知随接收者删除级联清理。
#[derive(Default)]
pub struct InMemoryStore {
    agents: DashMap<String, Agent>,
    posts: DashMap<String, Post>,
    edges: DashMap<EdgeKey, DateTime<Utc>>,
    comments: DashMap<String, Comment>,
    notifications: DashMap<String, Vec<Notification>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_agent(&self, agent: Agent) {
        self.agents.insert(agent.id.clone(), agent);
    }

    pub fn get_agent(&self, agent_id: &str) -> Option<Agent> {
        self.agents.get(agent_id).map(|a| a.value().clone())
    }

    /// 删除账号，并级联删除其收到的通知
    pub fn remove_agent(&self, agent_id: &str) -> Option<Agent> {
        self.notifications.remove(agent_id);
        self.agents.remove(agent_id).map(|(_, agent)| agent)
    }

    pub fn notifications_for(&self, agent_id: &str) -> Vec<Notification> {
        self.notifications
            .get(agent_id)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    fn ensure_edge_target(&self, actor_id: &str, target_id: &str, edge: EdgeType) -> Result<()> {
        if !self.agents.contains_key(actor_id) {
            return Err(AppError::not_found("Agent"));
        }
        let target_exists = match edge {
            EdgeType::Like | EdgeType::Repost => self.posts.contains_key(target_id),
            EdgeType::Follow => self.agents.contains_key(target_id),
        };
        if !target_exists {
            return Err(AppError::NotFound(format!("{} target {} not found", edge.as_str(), target_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl EngagementStore for InMemoryStore {
    async fn insert_edge_if_absent(&self, actor_id: &str, target_id: &str, edge: EdgeType) -> Result<bool> {
        self.ensure_edge_target(actor_id, target_id, edge)?;

        let key = (edge, actor_id.to_string(), target_id.to_string());
        let created = match self.edges.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                true
            }
        };
        debug!("{} edge {} -> {} created: {}", edge.as_str(), actor_id, target_id, created);
        Ok(created)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        if !self.posts.contains_key(&comment.post_id) {
            return Err(AppError::not_found("Post"));
        }
        self.comments.insert(comment.id.clone(), comment.clone());
        Ok(())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        if !self.agents.contains_key(&notification.recipient_id) {
            return Err(AppError::not_found("Recipient"));
        }
        self.notifications
            .entry(notification.recipient_id.clone())
            .or_default()
            .push(notification.clone());
        Ok(())
    }

    async fn increment_counter(&self, entity_id: &str, field: CounterField) -> Result<()> {
        if field.is_post_counter() {
            let mut post = self
                .posts
                .get_mut(entity_id)
                .ok_or_else(|| AppError::not_found("Post"))?;
            match field {
                CounterField::PostLikes => post.likes_count += 1,
                CounterField::PostComments => post.comments_count += 1,
                _ => post.reposts_count += 1,
            }
        } else {
            let mut agent = self
                .agents
                .get_mut(entity_id)
                .ok_or_else(|| AppError::not_found("Agent"))?;
            match field {
                CounterField::AgentFollowers => agent.followers_count += 1,
                _ => agent.following_count += 1,
            }
        }
        Ok(())
    }

    async fn get_webhook_url(&self, agent_id: &str) -> Result<Option<String>> {
        Ok(self.agents.get(agent_id).and_then(|a| a.webhook_url.clone()))
    }

    async fn mark_all_notifications_read(&self, agent_id: &str) -> Result<u64> {
        let mut changed = 0;
        if let Some(mut list) = self.notifications.get_mut(agent_id) {
            for notification in list.iter_mut().filter(|n| !n.read) {
                notification.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn list_notifications(&self, agent_id: &str, limit: usize) -> Result<Vec<Notification>> {
        let mut list = self.notifications_for(agent_id);
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(limit);
        Ok(list)
    }

    async fn count_unread_notifications(&self, agent_id: &str) -> Result<u64> {
        Ok(self
            .notifications
            .get(agent_id)
            .map(|list| list.iter().filter(|n| !n.read).count() as u64)
            .unwrap_or(0))
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        Ok(self.posts.get(post_id).map(|p| p.value().clone()))
    }

    async fn agent_exists(&self, agent_id: &str) -> Result<bool> {
        Ok(self.agents.contains_key(agent_id))
    }

    async fn register_agent(&self, agent: &Agent) -> Result<bool> {
        match self.agents.entry(agent.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(agent.clone());
                debug!("Registered agent {}", agent.id);
                Ok(true)
            }
        }
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        if !self.agents.contains_key(&post.agent_id) {
            return Err(AppError::not_found("Agent"));
        }
        self.posts.insert(post.id.clone(), post.clone());
        Ok(())
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.posts.iter().map(|p| p.value().clone()).collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit);
        Ok(posts)
    }
}

use async_trait::async_trait;

use crate::{
    error::Result,
    models::{
        agent::Agent,
        engagement::{CounterField, EdgeType},
        notification::Notification,
        post::{Comment, Post},
    },
};

/// 互动管线依赖的持久化契约
///
/// 幂等性由实现方的唯一约束保证（`(actor, target)` 关系边），
/// 调用方不做进程内加锁。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// 关系边不存在时插入，返回是否真正新建
    async fn insert_edge_if_absent(&self, actor_id: &str, target_id: &str, edge: EdgeType) -> Result<bool>;

    async fn insert_comment(&self, comment: &Comment) -> Result<()>;

    async fn insert_notification(&self, notification: &Notification) -> Result<()>;

    async fn increment_counter(&self, entity_id: &str, field: CounterField) -> Result<()>;

    async fn get_webhook_url(&self, agent_id: &str) -> Result<Option<String>>;

    /// 批量标记已读，返回本次状态发生变化的条数
    async fn mark_all_notifications_read(&self, agent_id: &str) -> Result<u64>;

    /// 按创建时间倒序
    async fn list_notifications(&self, agent_id: &str, limit: usize) -> Result<Vec<Notification>>;

    async fn count_unread_notifications(&self, agent_id: &str) -> Result<u64>;

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>>;

    async fn agent_exists(&self, agent_id: &str) -> Result<bool>;

    /// 已存在同 id 的账号时不覆盖，返回 false
    async fn register_agent(&self, agent: &Agent) -> Result<bool>;

    async fn insert_post(&self, post: &Post) -> Result<()>;

    /// 最近发布的帖子，作为热度排序的候选集
    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>>;
}

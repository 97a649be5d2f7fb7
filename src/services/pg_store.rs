use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Row};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        agent::Agent,
        engagement::{CounterField, EdgeType},
        notification::{Notification, NotificationKind},
        post::{Comment, Post},
    },
    services::{store::EngagementStore, Database},
};

/// Postgres 实现，幂等性依赖各关系表上的 UNIQUE 约束
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// (表名, actor 列, target 列)
fn edge_table(edge: EdgeType) -> (&'static str, &'static str, &'static str) {
    match edge {
        EdgeType::Like => ("likes", "agent_id", "post_id"),
        EdgeType::Repost => ("reposts", "agent_id", "post_id"),
        EdgeType::Follow => ("follows", "follower_id", "following_id"),
    }
}

fn post_from_row(row: &PgRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        content: row.try_get("content")?,
        likes_count: row.try_get("likes_count")?,
        comments_count: row.try_get("comments_count")?,
        reposts_count: row.try_get("reposts_count")?,
        created_at: row.try_get("created_at")?,
    })
}

fn notification_from_row(row: &PgRow) -> Result<Notification> {
    let kind: String = row.try_get("kind")?;
    Ok(Notification {
        id: row.try_get("id")?,
        recipient_id: row.try_get("recipient_id")?,
        kind: kind.parse::<NotificationKind>().map_err(AppError::Internal)?,
        from_agent_id: row.try_get("from_agent_id")?,
        related_post_id: row.try_get("related_post_id")?,
        message: row.try_get("message")?,
        read: row.try_get("read")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl EngagementStore for PgStore {
    async fn insert_edge_if_absent(&self, actor_id: &str, target_id: &str, edge: EdgeType) -> Result<bool> {
        let (table, actor_col, target_col) = edge_table(edge);
        let sql = format!(
            "INSERT INTO {table} (id, {actor_col}, {target_col}, created_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ({actor_col}, {target_col}) DO NOTHING"
        );

        let result = sqlx::query(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(actor_id)
            .bind(target_id)
            .bind(Utc::now())
            .execute(self.db.pool())
            .await?;

        let created = result.rows_affected() == 1;
        debug!("{} edge {} -> {} created: {}", edge.as_str(), actor_id, target_id, created);
        Ok(created)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        sqlx::query(
            "INSERT INTO comments (id, post_id, agent_id, content, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&comment.id)
        .bind(&comment.post_id)
        .bind(&comment.agent_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO notifications
                    (id, recipient_id, kind, from_agent_id, related_post_id, message, read, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&notification.id)
        .bind(&notification.recipient_id)
        .bind(notification.kind.as_str())
        .bind(&notification.from_agent_id)
        .bind(&notification.related_post_id)
        .bind(&notification.message)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn increment_counter(&self, entity_id: &str, field: CounterField) -> Result<()> {
        let table = if field.is_post_counter() { "posts" } else { "agents" };
        let sql = format!(
            "UPDATE {table} SET {col} = {col} + 1 WHERE id = $1",
            col = field.column()
        );

        let result = sqlx::query(&sql).bind(entity_id).execute(self.db.pool()).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", table, entity_id)));
        }
        Ok(())
    }

    async fn get_webhook_url(&self, agent_id: &str) -> Result<Option<String>> {
        let url: Option<Option<String>> =
            sqlx::query_scalar("SELECT webhook_url FROM agents WHERE id = $1")
                .bind(agent_id)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(url.flatten())
    }

    async fn mark_all_notifications_read(&self, agent_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(agent_id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_notifications(&self, agent_id: &str, limit: usize) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
                SELECT id, recipient_id, kind, from_agent_id, related_post_id, message, read, created_at
                FROM notifications
                WHERE recipient_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            "#,
        )
        .bind(agent_id)
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn count_unread_notifications(&self, agent_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(agent_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
                SELECT id, agent_id, content, likes_count, comments_count, reposts_count, created_at
                FROM posts WHERE id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn agent_exists(&self, agent_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM agents WHERE id = $1)")
            .bind(agent_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }

    async fn register_agent(&self, agent: &Agent) -> Result<bool> {
        let result = sqlx::query(
            r#"
                INSERT INTO agents (id, name, webhook_url, followers_count, following_count, created_at)
                VALUES ($1, $2, $3, 0, 0, $4)
                ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(&agent.webhook_url)
        .bind(agent.created_at)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO posts (id, agent_id, content, likes_count, comments_count, reposts_count, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&post.id)
        .bind(&post.agent_id)
        .bind(&post.content)
        .bind(post.likes_count)
        .bind(post.comments_count)
        .bind(post.reposts_count)
        .bind(post.created_at)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
                SELECT id, agent_id, content, likes_count, comments_count, reposts_count, created_at
                FROM posts
                ORDER BY created_at DESC
                LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(post_from_row).collect()
    }
}

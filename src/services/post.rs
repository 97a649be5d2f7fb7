use crate::{
    config::Config,
    error::{AppError, Result},
    models::post::{CreatePostRequest, Post},
    services::store::EngagementStore,
};
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn EngagementStore>,
    max_post_length: usize,
}

impl PostService {
    pub fn new(store: Arc<dyn EngagementStore>, config: &Config) -> Self {
        Self {
            store,
            max_post_length: config.max_post_length,
        }
    }

    pub async fn create_post(&self, agent_id: &str, request: CreatePostRequest) -> Result<Post> {
        debug!("Creating post for agent: {}", agent_id);

        request.validate()?;
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::validation("Post must not be empty"));
        }
        if content.chars().count() > self.max_post_length {
            return Err(AppError::Validation(format!(
                "Post exceeds {} characters",
                self.max_post_length
            )));
        }

        let post = Post::new(agent_id, content);
        self.store.insert_post(&post).await?;

        info!("Agent {} published post {}", agent_id, post.id);
        Ok(post)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::agent::Agent, services::memory_store::InMemoryStore};

    fn service() -> PostService {
        let store = Arc::new(InMemoryStore::new());
        store.insert_agent(Agent::new("nova", "Nova", None));
        PostService::new(store, &Config::default())
    }

    #[tokio::test]
    async fn test_create_and_fetch_post() {
        let service = service();
        let post = service
            .create_post("nova", CreatePostRequest { content: "  hello agents  ".to_string() })
            .await
            .unwrap();

        assert_eq!(post.content, "hello agents");
        assert_eq!(post.likes_count, 0);
        assert_eq!(service.get_post(&post.id).await.unwrap(), post);
    }

    #[tokio::test]
    async fn test_blank_post_is_rejected() {
        let service = service();
        let result = service
            .create_post("nova", CreatePostRequest { content: "   ".to_string() })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

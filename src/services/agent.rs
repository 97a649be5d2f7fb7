use crate::{
    error::{AppError, Result},
    models::agent::{Agent, RegisterAgentRequest},
    services::{store::EngagementStore, webhook::is_deliverable_url},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// 账号注册，只负责让互动管线有可引用的 agent
#[derive(Clone)]
pub struct AgentService {
    store: Arc<dyn EngagementStore>,
}

impl AgentService {
    pub fn new(store: Arc<dyn EngagementStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, request: RegisterAgentRequest) -> Result<Agent> {
        request.validate()?;

        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Agent name must not be empty"));
        }

        // validator 的 url 规则接受任意 scheme，回调只投递 http(s)
        if let Some(url) = request.webhook_url.as_deref() {
            if !is_deliverable_url(url) {
                return Err(AppError::validation("Webhook URL must be http or https"));
            }
        }

        let id = Uuid::new_v4().to_string();
        let agent = Agent::new(&id, name, request.webhook_url.as_deref());
        if !self.store.register_agent(&agent).await? {
            return Err(AppError::Conflict(format!("Agent {} already exists", agent.id)));
        }

        info!("Registered agent {} ({})", agent.name, agent.id);
        Ok(agent)
    }
}

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub webhook_url: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: &str, name: &str, webhook_url: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            webhook_url: webhook_url.map(str::to_string),
            followers_count: 0,
            following_count: 0,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterAgentRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(url)]
    pub webhook_url: Option<String>,
}

pub mod agent;
pub mod database;
pub mod fanout;
pub mod feed;
pub mod memory_store;
pub mod notification;
pub mod pg_store;
pub mod post;
pub mod rate_limiter;
pub mod store;
pub mod trending;
pub mod webhook;

// 重新导出常用类型
pub use agent::AgentService;
pub use database::Database;
pub use fanout::EngagementFanout;
pub use feed::FeedService;
pub use memory_store::InMemoryStore;
pub use notification::NotificationService;
pub use pg_store::PgStore;
pub use post::PostService;
pub use rate_limiter::RateLimiter;
pub use store::EngagementStore;
pub use trending::TrendingScorer;
pub use webhook::WebhookDispatcher;

use std::sync::Arc;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::engagement::ActionClass,
    services::{
        AgentService, EngagementFanout, EngagementStore, FeedService, NotificationService, PostService,
        RateLimiter, WebhookDispatcher,
    },
    utils::middleware::{new_ingress_limiter, IngressLimiter},
};

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 持久化后端（Postgres 或内存）
    pub store: Arc<dyn EngagementStore>,

    /// 按 agent 的滑动窗口限流
    pub rate_limiter: Arc<RateLimiter>,

    /// 按 IP 的入口限流
    pub ingress_limiter: Arc<IngressLimiter>,

    /// Webhook 投递队列
    pub webhook_dispatcher: Arc<WebhookDispatcher>,

    pub agent_service: AgentService,

    /// 互动扇出服务
    pub fanout: EngagementFanout,

    /// 通知服务
    pub notification_service: NotificationService,

    pub post_service: PostService,

    /// 热门流
    pub feed_service: FeedService,
}

impl AppState {
    /// 按配置组装所有服务，后台任务由调用方启动
    pub fn build(config: Config, store: Arc<dyn EngagementStore>) -> Result<Self> {
        let rate_limiter = Arc::new(RateLimiter::from_config(&config));
        let ingress_limiter = Arc::new(new_ingress_limiter(config.ingress_rate_limit));
        let webhook_dispatcher = Arc::new(WebhookDispatcher::from_config(&config)?);

        let notification_service = NotificationService::new(store.clone(), &config);
        let fanout = EngagementFanout::new(
            store.clone(),
            notification_service.clone(),
            webhook_dispatcher.clone(),
            &config,
        );

        Ok(Self {
            agent_service: AgentService::new(store.clone()),
            post_service: PostService::new(store.clone(), &config),
            feed_service: FeedService::new(store.clone(), &config),
            notification_service,
            fanout,
            webhook_dispatcher,
            ingress_limiter,
            rate_limiter,
            store,
            config,
        })
    }

    /// 在任何写入之前调用；超限时整个请求被拒绝，不产生副作用
    pub fn admit(&self, agent_id: &str, class: ActionClass) -> Result<()> {
        if self.rate_limiter.try_admit(agent_id, class) {
            Ok(())
        } else {
            Err(AppError::RateLimitExceeded)
        }
    }

    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }
}

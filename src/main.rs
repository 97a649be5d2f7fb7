use std::{net::SocketAddr, sync::Arc};
use tokio::time::interval;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_social::{
    build_app,
    config::Config,
    services::{Database, EngagementStore, InMemoryStore, PgStore},
    state::AppState,
    utils::middleware::sweep_ingress_limiter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志，生产环境输出 JSON
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| "agent_social=debug,tower_http=debug".into()),
    );
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting agent-social service...");

    let store = init_store(&config).await?;
    let app_state = Arc::new(AppState::build(config.clone(), store)?);

    // 启动后台任务
    start_background_tasks(app_state.clone());

    let app = build_app(app_state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

async fn init_store(config: &Config) -> anyhow::Result<Arc<dyn EngagementStore>> {
    if !config.uses_postgres() {
        info!("Using in-memory storage backend");
        return Ok(Arc::new(InMemoryStore::new()));
    }

    let db = Database::new(config).await?;
    db.verify_connection().await?;
    db.run_migrations().await?;
    info!("Database connection established successfully");

    Ok(Arc::new(PgStore::new(db)))
}

fn start_background_tasks(app_state: Arc<AppState>) {
    info!("Starting background tasks...");

    let sweep_every = app_state.config.rate_limit_sweep_interval();
    app_state.rate_limiter.clone().start_sweeper(sweep_every);

    // 入口限流的 IP 表同样需要定期清理
    let ingress_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(sweep_every);
        loop {
            interval.tick().await;
            let remaining = sweep_ingress_limiter(&ingress_state.ingress_limiter);
            debug!("Ingress limiter tracking {} clients", remaining);
        }
    });

    app_state
        .webhook_dispatcher
        .clone()
        .start(app_state.config.webhook_drain_interval());

    info!("Background tasks started successfully");
}

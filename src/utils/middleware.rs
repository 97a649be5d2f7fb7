use crate::{error::AppError, state::AppState};
use axum::{
    async_trait,
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};
use tracing::{debug, info, warn};

/// 标识调用方 agent 的请求头
pub const AGENT_ID_HEADER: &str = "x-agent-id";

pub type IngressLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// 按 IP 计的粗粒度入口限流，和按 agent 的业务限流相互独立
pub fn new_ingress_limiter(requests_per_minute: u32) -> IngressLimiter {
    let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
    RateLimiter::dashmap(Quota::per_minute(per_minute))
}

/// 清除已回到满配额的 IP，返回剩余键数
pub fn sweep_ingress_limiter(limiter: &IngressLimiter) -> usize {
    limiter.retain_recent();
    limiter.shrink_to_fit();
    limiter.len()
}

/// 速率限制中间件
pub async fn rate_limit_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next<Body>,
) -> Result<Response, AppError> {
    let client_ip = if app_state.config.trust_proxy_headers {
        get_client_ip(&request)
    } else {
        peer_ip(&request)
    };

    match app_state.ingress_limiter.check_key(&client_ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            warn!("Ingress rate limit exceeded for IP: {}", client_ip);
            Err(AppError::RateLimitExceeded)
        }
    }
}

/// 请求日志中间件
pub async fn request_logging_middleware(
    request: Request<Body>,
    next: Next<Body>,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request);

    let start_time = std::time::Instant::now();
    debug!("Incoming request: {} {} from {}", method, uri, client_ip);

    let response = next.run(request).await;

    info!(
        "Request completed: {} {} {} - {}ms",
        method,
        uri,
        response.status().as_u16(),
        start_time.elapsed().as_millis()
    );

    response
}

/// 获取客户端 IP 地址，优先使用代理头（仅用于日志或可信代理场景）
fn get_client_ip(request: &Request<Body>) -> String {
    let headers = request.headers();

    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return ip.trim().to_string();
    }

    if let Some(ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        return ip.to_string();
    }

    peer_ip(request)
}

/// TCP 连接的对端地址，客户端无法伪造
fn peer_ip(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 已识别的调用方 agent
///
/// 身份来自 `X-Agent-Id` 请求头，且必须是已注册的 agent。
#[derive(Debug, Clone)]
pub struct AuthenticatedAgent {
    pub id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedAgent {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(AGENT_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::unauthorized("Missing X-Agent-Id header"))?
            .to_string();

        if !state.store.agent_exists(&id).await? {
            debug!("Rejecting unknown agent id {}", id);
            return Err(AppError::unauthorized("Unknown agent"));
        }

        Ok(AuthenticatedAgent { id })
    }
}

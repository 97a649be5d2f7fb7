use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::Result,
    models::webhook::{WebhookJob, WebhookStats},
};

/// 标识事件类型的请求头
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// 只接受 http/https 回调地址
pub fn is_deliverable_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Webhook 投递器
///
/// 尽力而为、至多一次：每个任务只尝试一次，无论成功、网络错误还是超时都直接丢弃。
/// 队列有容量上限，满时丢弃最旧的任务。
pub struct WebhookDispatcher {
    queue: Mutex<VecDeque<WebhookJob>>,
    capacity: usize,
    client: reqwest::Client,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl WebhookDispatcher {
    pub fn new(timeout: Duration, capacity: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("agent-social-webhooks/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            client,
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.webhook_timeout(), config.webhook_queue_capacity)
    }

    /// 入队，O(1)，不阻塞调用方
    pub fn enqueue(&self, job: WebhookJob) {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            if let Some(oldest) = queue.pop_front() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Webhook queue full ({}), dropping oldest {} job for {}",
                    self.capacity, oldest.event_kind, oldest.target_url
                );
            }
        }
        queue.push_back(job);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn pending(&self) -> Vec<WebhookJob> {
        self.queue.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> WebhookStats {
        WebhookStats {
            queued: self.queue_len(),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// 依次投递触发时已在队列中的全部任务，返回尝试次数
    pub async fn drain_once(&self) -> usize {
        let pending = self.queue_len();
        let mut attempted = 0;

        for _ in 0..pending {
            let next = self.queue.lock().pop_front();
            let job = match next {
                Some(job) => job,
                None => break,
            };
            self.deliver(&job).await;
            attempted += 1;
        }

        if attempted > 0 {
            debug!("Webhook drain attempted {} deliveries", attempted);
        }
        attempted
    }

    async fn deliver(&self, job: &WebhookJob) -> bool {
        let result = self
            .client
            .post(&job.target_url)
            .header(EVENT_HEADER, job.event_kind.as_str())
            .json(&job.envelope())
            .send()
            .await;

        match result {
            Ok(response) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                let status = response.status();
                if status.is_success() {
                    debug!("Delivered {} webhook to {} ({})", job.event_kind, job.target_url, status);
                } else {
                    warn!("Webhook {} to {} answered {}", job.event_kind, job.target_url, status);
                }
                true
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                if e.is_timeout() {
                    warn!("Webhook {} to {} timed out", job.event_kind, job.target_url);
                } else {
                    warn!("Webhook {} to {} failed: {}", job.event_kind, job.target_url, e);
                }
                false
            }
        }
    }

    /// 启动固定间隔的投递循环，进程退出前不会停止
    pub fn start(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        info!("Starting webhook dispatcher (interval {:?}, capacity {})", every, self.capacity);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.drain_once().await;
            }
        })
    }
}

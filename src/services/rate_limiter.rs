use dashmap::DashMap;
use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info};

use crate::{config::Config, models::engagement::ActionClass};

/// 限流窗口键：(actor, 动作类别)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateWindowKey {
    pub actor_id: String,
    pub class: ActionClass,
}

impl RateWindowKey {
    pub fn new(actor_id: &str, class: ActionClass) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            class,
        }
    }
}

/// 按 actor 的滑动窗口限流器
///
/// 每个键保存窗口内每次放行的时间戳。检查时先惰性裁剪过期时间戳，
/// 达到上限则拒绝且不修改状态。定期清扫只影响内存占用，不影响正确性。
pub struct RateLimiter {
    windows: DashMap<RateWindowKey, VecDeque<Instant>>,
    window: Duration,
    post_limit: usize,
    action_limit: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, post_limit: usize, action_limit: usize) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            post_limit,
            action_limit,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_window(),
            config.post_rate_limit,
            config.action_rate_limit,
        )
    }

    pub fn limit_for(&self, class: ActionClass) -> usize {
        match class {
            ActionClass::Post => self.post_limit,
            ActionClass::Action => self.action_limit,
        }
    }

    /// 按类别上限检查并记录一次调用
    pub fn try_admit(&self, actor_id: &str, class: ActionClass) -> bool {
        let key = RateWindowKey::new(actor_id, class);
        self.admit_at(&key, self.limit_for(class), Instant::now())
    }

    /// 指定上限的通用入口
    pub fn admit(&self, key: &RateWindowKey, limit: usize) -> bool {
        self.admit_at(key, limit, Instant::now())
    }

    pub fn admit_at(&self, key: &RateWindowKey, limit: usize, now: Instant) -> bool {
        if let Some(mut entry) = self.windows.get_mut(key) {
            prune(&mut entry, now, self.window);
            if entry.len() >= limit {
                debug!("Rate limited {} ({}): {}/{}", key.actor_id, key.class, entry.len(), limit);
                return false;
            }
            entry.push_back(now);
            return true;
        }

        if limit == 0 {
            return false;
        }

        // 首次出现的键；entry() 保证并发首次写入只建一个窗口
        let mut entry = self.windows.entry(key.clone()).or_default();
        prune(&mut entry, now, self.window);
        if entry.len() >= limit {
            return false;
        }
        entry.push_back(now);
        true
    }

    /// 当前窗口内剩余配额
    pub fn remaining(&self, actor_id: &str, class: ActionClass) -> usize {
        self.remaining_at(actor_id, class, Instant::now())
    }

    pub fn remaining_at(&self, actor_id: &str, class: ActionClass, now: Instant) -> usize {
        let limit = self.limit_for(class);
        let key = RateWindowKey::new(actor_id, class);
        let used = self
            .windows
            .get(&key)
            .map(|entry| entry.iter().filter(|t| in_window(**t, now, self.window)).count())
            .unwrap_or(0);
        limit.saturating_sub(used)
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// 清除窗口已经完全过期的键，返回移除数量
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, entry| {
            prune(entry, now, self.window);
            !entry.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// 启动后台清扫任务
    pub fn start_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    info!("Rate limiter sweep removed {} idle keys", removed);
                }
            }
        })
    }
}

fn in_window(timestamp: Instant, now: Instant, window: Duration) -> bool {
    now.saturating_duration_since(timestamp) < window
}

fn prune(entry: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = entry.front() {
        if in_window(*oldest, now, window) {
            break;
        }
        entry.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(60), 5, 30)
    }

    #[test]
    fn test_sixth_post_in_window_is_rejected() {
        let limiter = limiter();
        for _ in 0..5 {
            assert!(limiter.try_admit("nova", ActionClass::Post));
        }
        assert!(!limiter.try_admit("nova", ActionClass::Post));
        assert_eq!(limiter.remaining("nova", ActionClass::Post), 0);
    }

    #[test]
    fn test_thirty_first_action_in_window_is_rejected() {
        let limiter = limiter();
        for _ in 0..30 {
            assert!(limiter.try_admit("nova", ActionClass::Action));
        }
        assert!(!limiter.try_admit("nova", ActionClass::Action));
    }

    #[test]
    fn test_classes_and_actors_are_independent() {
        let limiter = limiter();
        for _ in 0..5 {
            assert!(limiter.try_admit("nova", ActionClass::Post));
        }
        assert!(!limiter.try_admit("nova", ActionClass::Post));
        assert!(limiter.try_admit("nova", ActionClass::Action));
        assert!(limiter.try_admit("atlas", ActionClass::Post));
    }

    #[test]
    fn test_window_slides_instead_of_resetting() {
        let limiter = limiter();
        let key = RateWindowKey::new("nova", ActionClass::Post);
        let start = Instant::now();

        // 两次在 t=0，三次在 t=30s
        assert!(limiter.admit_at(&key, 5, start));
        assert!(limiter.admit_at(&key, 5, start));
        for _ in 0..3 {
            assert!(limiter.admit_at(&key, 5, start + Duration::from_secs(30)));
        }
        assert!(!limiter.admit_at(&key, 5, start + Duration::from_secs(59)));

        // t=60s 时最早的两次滑出窗口，正好空出两个位置
        let later = start + Duration::from_secs(60);
        assert!(limiter.admit_at(&key, 5, later));
        assert!(limiter.admit_at(&key, 5, later));
        assert!(!limiter.admit_at(&key, 5, later));
    }

    #[test]
    fn test_rejection_does_not_consume_quota() {
        let limiter = limiter();
        let key = RateWindowKey::new("nova", ActionClass::Post);
        let start = Instant::now();

        for _ in 0..5 {
            assert!(limiter.admit_at(&key, 5, start));
        }
        for second in 1..50 {
            assert!(!limiter.admit_at(&key, 5, start + Duration::from_secs(second)));
        }
        assert!(limiter.admit_at(&key, 5, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_sweep_removes_only_idle_keys() {
        let limiter = limiter();
        let start = Instant::now();
        limiter.admit_at(&RateWindowKey::new("idle", ActionClass::Action), 30, start);
        limiter.admit_at(
            &RateWindowKey::new("busy", ActionClass::Action),
            30,
            start + Duration::from_secs(45),
        );
        assert_eq!(limiter.tracked_keys(), 2);

        let removed = limiter.sweep_at(start + Duration::from_secs(61));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(
            limiter.remaining_at("busy", ActionClass::Action, start + Duration::from_secs(61)),
            29
        );
    }
}

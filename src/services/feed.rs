use crate::{
    config::Config,
    error::Result,
    models::post::RankedPost,
    services::{store::EngagementStore, trending::TrendingScorer},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// 公共热门流：每次读取时按当前计数重新计算分数，候选集有上限
#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn EngagementStore>,
    candidate_limit: usize,
}

impl FeedService {
    pub fn new(store: Arc<dyn EngagementStore>, config: &Config) -> Self {
        Self {
            store,
            candidate_limit: config.trending_candidate_limit,
        }
    }

    pub async fn trending(&self, limit: usize) -> Result<Vec<RankedPost>> {
        let candidates = self.store.recent_posts(self.candidate_limit).await?;
        debug!("Ranking {} trending candidates", candidates.len());

        let mut ranked = TrendingScorer::rank(candidates, Utc::now());
        ranked.truncate(limit);
        Ok(ranked)
    }
}

use chrono::{DateTime, Utc};

use crate::models::post::{Post, RankedPost};

const COMMENT_WEIGHT: f64 = 2.0;
const REPOST_WEIGHT: f64 = 3.0;
const AGE_EXPONENT: f64 = 1.5;

/// 热度排序
///
/// score = (likes + 2·comments + 3·reposts + 1) / max(age_hours, 1)^1.5
///
/// 纯函数，无状态；相同输入得到相同顺序。
pub struct TrendingScorer;

impl TrendingScorer {
    pub fn score(likes: i64, comments: i64, reposts: i64, age_hours: f64) -> f64 {
        let engagement = likes.max(0) as f64
            + COMMENT_WEIGHT * comments.max(0) as f64
            + REPOST_WEIGHT * reposts.max(0) as f64
            + 1.0;
        engagement / age_hours.max(1.0).powf(AGE_EXPONENT)
    }

    pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        (now - created_at).num_milliseconds() as f64 / 3_600_000.0
    }

    pub fn score_post(post: &Post, now: DateTime<Utc>) -> f64 {
        Self::score(
            post.likes_count,
            post.comments_count,
            post.reposts_count,
            Self::age_hours(post.created_at, now),
        )
    }

    /// 按分数降序，同分时较新的帖子在前
    pub fn rank(posts: Vec<Post>, now: DateTime<Utc>) -> Vec<RankedPost> {
        let mut ranked: Vec<RankedPost> = posts
            .into_iter()
            .map(|post| {
                let score = Self::score_post(&post, now);
                RankedPost { post, score }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.post.created_at.cmp(&a.post.created_at))
        });
        ranked
    }
}
